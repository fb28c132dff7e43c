use crate::libs::chip::Chip;

/// Number of distinct valid embeddings of `probe` into `dep`.
///
/// Forward counting DP over deposition positions. `m[r]` holds the number of
/// ways to synthesize the first `r + 1` probe bases using the steps seen so
/// far; the active row frontier advances one row at a time, so a probe whose
/// prefix cannot be placed yet costs nothing for the unreachable rows.
///
/// Counts saturate at `u64::MAX` instead of wrapping; probes with very few
/// embeddings (the interesting ones, pivot candidates) are always exact.
pub fn count_embeddings(probe: &[u8], dep: &[u8], m: &mut Vec<u64>) -> u64 {
    m.clear();
    m.resize(probe.len(), 0);

    let mut last_row = 0;
    for &d in dep {
        let mut top: u64 = 1;
        for r in 0..=last_row {
            if probe[r] == d {
                let tmp = m[r];
                m[r] = m[r].saturating_add(top);
                top = tmp;
            } else {
                top = m[r];
            }
        }
        if m[last_row] > 0 && last_row < probe.len() - 1 {
            last_row += 1;
        }
    }

    m[probe.len() - 1]
}

/// Counts embeddings of whole probes (or probe pairs) of a chip.
///
/// Owns its scratch buffers; create one and feed it many probe IDs. Pivot
/// selection sorts probes by this count and anchors the placement on the
/// probes with the fewest choices.
pub struct EmbeddingCounter {
    probe_1: Vec<u8>,
    probe_2: Vec<u8>,
    m: Vec<u64>,
}

impl EmbeddingCounter {
    pub fn new() -> Self {
        EmbeddingCounter {
            probe_1: Vec::new(),
            probe_2: Vec::new(),
            m: Vec::new(),
        }
    }

    /// Number of embeddings of probe `id`. On paired chips the two combined
    /// PM/MM orderings are counted and summed (saturating).
    pub fn count(&mut self, chip: &Chip, id: usize) -> u64 {
        if chip.is_paired() {
            chip.decode_pair(id, &mut self.probe_1, &mut self.probe_2);
            let n1 = count_embeddings(&self.probe_1, chip.dep_seq(), &mut self.m);
            let n2 = count_embeddings(&self.probe_2, chip.dep_seq(), &mut self.m);
            n1.saturating_add(n2)
        } else {
            chip.decode(id, &mut self.probe_1);
            count_embeddings(&self.probe_1, chip.dep_seq(), &mut self.m)
        }
    }
}

impl Default for EmbeddingCounter {
    fn default() -> Self {
        Self::new()
    }
}
