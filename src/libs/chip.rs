use crate::libs::bits::BitVec;
use anyhow::{anyhow, bail, Result};
use rand::Rng;
use std::io::{BufRead, Write};

/// The deposition sequence Affymetrix uses for its 25-mer chips: TGCA
/// repeated over 74 synthesis steps.
pub const AFFY_DEP_SEQ: &str =
    "TGCATGCATGCATGCATGCATGCATGCATGCATGCATGCATGCATGCATGCATGCATGCATGCATGCATGCATG";

/// Length of Affymetrix probes.
pub const AFFY_PROBE_LEN: usize = 25;

/// Probe arrangement on the chip.
///
/// `Single` chips carry one probe per spot. `PmPair` chips carry
/// perfect-match/mismatch pairs on vertically adjacent spots: the PM probe
/// gets an even ID, its MM partner the next (odd) ID, and the two probes
/// differ in exactly one base (the middle base, where the MM carries the
/// Watson-Crick complement).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Single,
    PmPair,
}

/// A rectangular window of spots, both bounds inclusive.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    pub first_row: usize,
    pub last_row: usize,
    pub first_col: usize,
    pub last_col: usize,
}

/// Watson-Crick complement of a base.
///
/// Callers must pass one of A, C, G, T; anything else is a corrupted chip.
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        _ => panic!("invalid base '{}'", base as char),
    }
}

/// Smallest period `c <= len/2` of the sequence, or 0 if it has none.
pub fn cycle_length(seq: &[u8]) -> usize {
    for c in 1..=(seq.len() / 2) {
        if (0..seq.len() - c).all(|i| seq[i] == seq[i + c]) {
            return c;
        }
    }
    0
}

/// A chip: the deposition sequence, the spot grid and the per-probe
/// embeddings.
///
/// Embeddings are bit vectors over deposition steps; bit `p` set means step
/// `p` incorporates a base into the probe. The set bits of a valid embedding
/// spell the probe sequence as a subsequence of the deposition sequence, so
/// the probe itself is never stored: [`Chip::decode`] reads it back out.
#[derive(Debug, Clone, PartialEq)]
pub struct Chip {
    pub num_rows: usize,
    pub num_cols: usize,
    pub num_probes: usize,
    pub probe_len: usize,
    pub embed_len: usize,
    pub topology: Topology,
    dep_seq: Vec<u8>,
    cycle: usize,
    /// `spots[r][c]` holds the probe ID placed there, if any.
    pub spots: Vec<Vec<Option<u32>>>,
    pub fixed: Vec<Vec<bool>>,
    /// One embedding per probe ID.
    pub embed: Vec<BitVec>,
    /// On paired chips, bit set for PM probes.
    pm_probe: BitVec,
}

impl Chip {
    pub fn new(
        num_rows: usize,
        num_cols: usize,
        num_probes: usize,
        probe_len: usize,
        dep_seq: &str,
        topology: Topology,
    ) -> Result<Chip> {
        let dep_seq = dep_seq.as_bytes().to_vec();
        if num_rows == 0 || num_cols == 0 {
            bail!("chip must have at least one row and one column");
        }
        if dep_seq.is_empty() {
            bail!("empty deposition sequence");
        }
        if let Some(&ch) = dep_seq.iter().find(|&&b| !b"ACGT".contains(&b)) {
            bail!("invalid base '{}' in deposition sequence", ch as char);
        }
        if probe_len == 0 || probe_len > dep_seq.len() {
            bail!(
                "probe length {} out of range for a {}-step deposition sequence",
                probe_len,
                dep_seq.len()
            );
        }
        if topology == Topology::PmPair {
            if num_probes % 2 != 0 {
                bail!("paired chips need an even number of probes");
            }
            if probe_len < 3 {
                bail!("paired probes need at least 3 bases");
            }
        }

        let embed_len = dep_seq.len();
        let cycle = cycle_length(&dep_seq);

        Ok(Chip {
            num_rows,
            num_cols,
            num_probes,
            probe_len,
            embed_len,
            topology,
            dep_seq,
            cycle,
            spots: vec![vec![None; num_cols]; num_rows],
            fixed: vec![vec![false; num_cols]; num_rows],
            embed: vec![BitVec::with_len(embed_len); num_probes],
            pm_probe: BitVec::with_len(num_probes),
        })
    }

    pub fn dep_seq(&self) -> &[u8] {
        &self.dep_seq
    }

    /// Cycle length of the deposition sequence, 0 if non-cyclic.
    pub fn cycle(&self) -> usize {
        self.cycle
    }

    pub fn region(&self) -> Region {
        Region {
            first_row: 0,
            last_row: self.num_rows - 1,
            first_col: 0,
            last_col: self.num_cols - 1,
        }
    }

    #[inline]
    pub fn spot(&self, row: usize, col: usize) -> Option<usize> {
        self.spots[row][col].map(|id| id as usize)
    }

    pub fn is_paired(&self) -> bool {
        self.topology == Topology::PmPair
    }

    pub fn is_pm(&self, id: usize) -> bool {
        self.pm_probe.get(id)
    }

    /// PM member of the pair `id` belongs to.
    pub fn pm_id(&self, id: usize) -> usize {
        if self.is_pm(id) {
            id
        } else {
            id - 1
        }
    }

    /// The other member of the pair `id` belongs to.
    pub fn partner(&self, id: usize) -> usize {
        if self.is_pm(id) {
            id + 1
        } else {
            id - 1
        }
    }

    /// Middle base of paired probes, as a 1-based base number. The combined
    /// PM+MM sequence diverges at this row and the next.
    pub fn middle_base(&self) -> usize {
        self.probe_len / 2
    }

    /// Reads the probe sequence off the embedding's productive steps.
    pub fn decode(&self, id: usize, probe: &mut Vec<u8>) {
        probe.clear();
        let emb = &self.embed[id];
        for pos in 0..self.embed_len {
            if emb.get(pos) {
                probe.push(self.dep_seq[pos]);
            }
        }
    }

    /// Builds the two candidate combined PM+MM sequences of a pair, one per
    /// ordering of the divergent middle bases. Both have `probe_len + 1`
    /// characters. `probe_1` carries the PM middle base first, `probe_2` the
    /// complement first.
    ///
    /// Only the PM embedding is walked: the MM base is the complement by
    /// definition, and its actual productive step does not matter here.
    pub fn decode_pair(&self, id: usize, probe_1: &mut Vec<u8>, probe_2: &mut Vec<u8>) {
        let pm = self.pm_id(id);
        let mid = self.middle_base();
        probe_1.clear();
        probe_2.clear();

        let emb = &self.embed[pm];
        let mut i = 0;
        for pos in 0..self.embed_len {
            if !emb.get(pos) {
                continue;
            }
            let base = self.dep_seq[pos];
            if i != mid - 1 {
                probe_1.push(base);
                probe_2.push(base);
            } else {
                let comp = complement(base);
                probe_1.push(base);
                probe_2.push(comp);
                probe_1.push(comp);
                probe_2.push(base);
            }
            i += 1;
        }
    }

    /// Stores an embedding given as a string of bases and spaces (one
    /// character per deposition step, space = masked). `probe` is the
    /// expected probe sequence, or "-" to skip that check.
    pub fn encode_embedding(&mut self, id: usize, probe: &str, embedding: &str) -> Result<()> {
        if embedding.len() != self.embed_len {
            bail!(
                "embedding has {} steps, expected {}",
                embedding.len(),
                self.embed_len
            );
        }

        self.embed[id].zero();
        let mut decoded = Vec::with_capacity(self.probe_len);

        for (pos, ch) in embedding.bytes().enumerate() {
            if ch == b' ' {
                continue;
            }
            if ch != self.dep_seq[pos] {
                bail!(
                    "unexpected base '{}' at step {} (deposition sequence has '{}')",
                    ch as char,
                    pos,
                    self.dep_seq[pos] as char
                );
            }
            self.embed[id].set(pos);
            decoded.push(ch);
        }

        if decoded.len() != self.probe_len {
            bail!(
                "embedding has {} productive steps, expected {}",
                decoded.len(),
                self.probe_len
            );
        }
        if probe != "-" && probe.as_bytes() != decoded.as_slice() {
            bail!("embedding does not spell the probe sequence");
        }

        Ok(())
    }

    /// Checks that a PM/MM pair of embeddings agree on every base except the
    /// middle one, where they must carry complementary bases.
    pub fn validate_pair(&self, pm: usize, mm: usize) -> Result<()> {
        if self.embed[pm].xor_count(&self.embed[mm]) != 2 {
            bail!("PM and MM embeddings differ in more than the middle step");
        }

        let mut p1 = Vec::new();
        let mut p2 = Vec::new();
        self.decode(pm, &mut p1);
        self.decode(mm, &mut p2);
        if p1.len() != self.probe_len || p2.len() != self.probe_len {
            bail!("probe length mismatch within a pair");
        }

        let mid = self.middle_base() - 1;
        for (i, (&a, &b)) in p1.iter().zip(&p2).enumerate() {
            if i == mid {
                if complement(a) != b {
                    bail!("middle bases of a pair are not complementary");
                }
            } else if a != b {
                bail!("pair sequences differ outside the middle base");
            }
        }

        Ok(())
    }

    /// Fills the grid with randomly embedded probes. Spots are taken in
    /// column-major order (pairs occupy two vertically adjacent spots);
    /// leftover spots stay empty.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        for row in &mut self.spots {
            row.fill(None);
        }

        match self.topology {
            Topology::Single => {
                if self.num_probes > self.num_rows * self.num_cols {
                    bail!("more probes than spots");
                }
                let mut id = 0;
                'fill: for c in 0..self.num_cols {
                    for r in 0..self.num_rows {
                        if id == self.num_probes {
                            break 'fill;
                        }
                        self.embed[id] = self.random_embedding(rng);
                        self.spots[r][c] = Some(id as u32);
                        id += 1;
                    }
                }
            }
            Topology::PmPair => {
                if self.num_probes > self.num_cols * 2 * (self.num_rows / 2) {
                    bail!("more probe pairs than spot pairs");
                }
                let mut id = 0;
                'fill_pairs: for c in 0..self.num_cols {
                    for r in (0..self.num_rows - 1).step_by(2) {
                        if id == self.num_probes {
                            break 'fill_pairs;
                        }
                        let (pm, mm) = self.random_pair_embedding(rng)?;
                        self.embed[id] = pm;
                        self.embed[id + 1] = mm;
                        self.pm_probe.set(id);
                        self.pm_probe.clear(id + 1);
                        self.spots[r][c] = Some(id as u32);
                        self.spots[r + 1][c] = Some(id as u32 + 1);
                        id += 2;
                    }
                }
            }
        }

        Ok(())
    }

    /// A uniformly random choice of `probe_len` productive steps. Any such
    /// choice is a valid embedding: the probe is whatever the chosen steps
    /// spell.
    fn random_embedding<R: Rng>(&self, rng: &mut R) -> BitVec {
        let mut emb = BitVec::with_len(self.embed_len);
        for pos in rand::seq::index::sample(rng, self.embed_len, self.probe_len).into_vec() {
            emb.set(pos);
        }
        emb
    }

    /// Random PM embedding plus a synchronized MM embedding: same steps
    /// except the middle base, which the MM synthesizes as the complement at
    /// a step of its own between the flanking productive steps.
    fn random_pair_embedding<R: Rng>(&self, rng: &mut R) -> Result<(BitVec, BitVec)> {
        let mid = self.middle_base() - 1;

        for _ in 0..1000 {
            let pm = self.random_embedding(rng);
            let pos: Vec<usize> = pm.ones().collect();

            let lo = if mid == 0 { 0 } else { pos[mid - 1] + 1 };
            let hi = pos[mid + 1];
            let mid_pos = pos[mid];
            let comp = complement(self.dep_seq[mid_pos]);

            let cand: Vec<usize> = (lo..hi)
                .filter(|&q| q != mid_pos && self.dep_seq[q] == comp)
                .collect();
            if cand.is_empty() {
                continue;
            }

            let q = cand[rng.gen_range(0..cand.len())];
            let mut mm = pm.clone();
            mm.clear(mid_pos);
            mm.set(q);
            return Ok((pm, mm));
        }

        bail!("deposition sequence cannot host a complementary middle base")
    }

    /// Reads a chip layout written by [`Chip::write_layout`]: `#` header
    /// lines with the chip geometry and the deposition sequence, then one
    /// TAB-delimited line per spot with 7 fields (x, y, group, fixed,
    /// PM/MM flag, probe, embedding).
    pub fn read_layout(input: &mut dyn BufRead) -> Result<Chip> {
        let mut rows = None;
        let mut cols = None;
        let mut probes = None;
        let mut probe_len = None;
        let mut pairs = false;
        let mut dep_seq = None;

        let mut chip: Option<Chip> = None;
        let mut seen: Vec<Vec<bool>> = Vec::new();
        let mut next_id = 0usize;
        let mut last_was_pm = false;

        for (ln, line) in input.lines().enumerate() {
            let line = line?;
            let ln = ln + 1;

            if let Some(rest) = line.strip_prefix('#') {
                for tok in rest.split_whitespace() {
                    if let Some((key, value)) = tok.split_once('=') {
                        match key {
                            "rows" => rows = Some(value.parse::<usize>()?),
                            "cols" => cols = Some(value.parse::<usize>()?),
                            "probes" => probes = Some(value.parse::<usize>()?),
                            "probe_len" => probe_len = Some(value.parse::<usize>()?),
                            "pairs" => pairs = value == "1",
                            "dep_seq" => dep_seq = Some(value.to_string()),
                            _ => {}
                        }
                    }
                }
                continue;
            }
            if line.is_empty() {
                continue;
            }

            if chip.is_none() {
                let topology = if pairs { Topology::PmPair } else { Topology::Single };
                let c = Chip::new(
                    rows.ok_or_else(|| anyhow!("missing rows= header"))?,
                    cols.ok_or_else(|| anyhow!("missing cols= header"))?,
                    probes.ok_or_else(|| anyhow!("missing probes= header"))?,
                    probe_len.ok_or_else(|| anyhow!("missing probe_len= header"))?,
                    dep_seq
                        .as_deref()
                        .ok_or_else(|| anyhow!("missing dep_seq= header"))?,
                    topology,
                )?;
                seen = vec![vec![false; c.num_cols]; c.num_rows];
                chip = Some(c);
            }
            let chip = chip.as_mut().unwrap();

            let field: Vec<&str> = line.splitn(7, '\t').collect();
            if field.len() != 7 {
                bail!("unable to parse layout at line {}", ln);
            }

            let c: usize = field[0]
                .parse()
                .map_err(|_| anyhow!("invalid spot coordinates at line {}", ln))?;
            let r: usize = field[1]
                .parse()
                .map_err(|_| anyhow!("invalid spot coordinates at line {}", ln))?;
            if r >= chip.num_rows || c >= chip.num_cols {
                bail!("spot ({}, {}) out of range at line {}", r, c, ln);
            }
            if seen[r][c] {
                bail!("spot conflict at row {}, column {}", r, c);
            }
            seen[r][c] = true;

            chip.fixed[r][c] = match field[3] {
                "Y" => true,
                "N" => false,
                _ => bail!("invalid fixed flag at line {}", ln),
            };

            if field[6] == "-" {
                continue;
            }

            if next_id >= chip.num_probes {
                bail!("found more probes in the input than expected");
            }
            let id = next_id;
            next_id += 1;
            chip.spots[r][c] = Some(id as u32);

            chip.encode_embedding(id, field[5], field[6])
                .map_err(|e| anyhow!("invalid embedding at line {} ({})", ln, e))?;

            if chip.is_paired() {
                match field[4] {
                    "P" => {
                        if last_was_pm {
                            bail!("two PM probes in a row at line {}", ln);
                        }
                        chip.pm_probe.set(id);
                        last_was_pm = true;
                    }
                    "M" => {
                        if !last_was_pm {
                            bail!("MM probe without preceding PM probe at line {}", ln);
                        }
                        if r == 0 || chip.spots[r - 1][c] != Some(id as u32 - 1) {
                            bail!(
                                "MM probe at line {} is not directly below its PM probe",
                                ln
                            );
                        }
                        if chip.fixed[r][c] != chip.fixed[r - 1][c] {
                            bail!("probe pair at line {} has differing fixed flags", ln);
                        }
                        chip.validate_pair(id - 1, id)
                            .map_err(|e| anyhow!("invalid pair at line {} ({})", ln, e))?;
                        last_was_pm = false;
                    }
                    _ => bail!("invalid probe type '{}' at line {}", field[4], ln),
                }
            }
        }

        let chip = chip.ok_or_else(|| anyhow!("empty layout file"))?;
        if next_id != chip.num_probes {
            bail!(
                "only {} of the {} probes were found",
                next_id,
                chip.num_probes
            );
        }
        if chip.is_paired() && last_was_pm {
            bail!("last PM probe has no MM partner");
        }

        Ok(chip)
    }

    /// Writes the layout in the format read by [`Chip::read_layout`]. Spots
    /// go out in column-major order so that the two members of a probe pair
    /// appear on consecutive lines.
    pub fn write_layout(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "# marl layout")?;
        writeln!(
            out,
            "# rows={} cols={} probes={} probe_len={} pairs={}",
            self.num_rows,
            self.num_cols,
            self.num_probes,
            self.probe_len,
            if self.is_paired() { 1 } else { 0 }
        )?;
        writeln!(
            out,
            "# dep_seq={}",
            std::str::from_utf8(&self.dep_seq).unwrap()
        )?;

        let mut probe = Vec::with_capacity(self.probe_len);
        for c in 0..self.num_cols {
            for r in 0..self.num_rows {
                let fix = if self.fixed[r][c] { 'Y' } else { 'N' };
                match self.spot(r, c) {
                    None => writeln!(out, "{}\t{}\tEMPTY\t{}\t-\t-\t-", c, r, fix)?,
                    Some(id) => {
                        let typ = if !self.is_paired() {
                            '-'
                        } else if self.is_pm(id) {
                            'P'
                        } else {
                            'M'
                        };
                        self.decode(id, &mut probe);

                        let mut emb = String::with_capacity(self.embed_len);
                        for pos in 0..self.embed_len {
                            if self.embed[id].get(pos) {
                                emb.push(self.dep_seq[pos] as char);
                            } else {
                                emb.push(' ');
                            }
                        }

                        writeln!(
                            out,
                            "{}\t{}\t-\t{}\t{}\t{}\t{}",
                            c,
                            r,
                            fix,
                            typ,
                            std::str::from_utf8(&probe).unwrap(),
                            emb
                        )?;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_cycle_length() {
        assert_eq!(cycle_length(b"TGCATGCA"), 4);
        assert_eq!(cycle_length(AFFY_DEP_SEQ.as_bytes()), 4);
        assert_eq!(cycle_length(b"ACGTACGG"), 0);
        assert_eq!(cycle_length(b"AAAA"), 1);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut chip = Chip::new(1, 1, 1, 4, "TGCATGCA", Topology::Single).unwrap();
        chip.encode_embedding(0, "GCAT", " GCAT   ").unwrap();

        // leftmost alignment of GCAT into TGCATGCA uses steps 1..=4
        let pos: Vec<usize> = chip.embed[0].ones().collect();
        assert_eq!(pos, vec![1, 2, 3, 4]);

        let mut probe = Vec::new();
        chip.decode(0, &mut probe);
        assert_eq!(probe, b"GCAT");
    }

    #[test]
    fn test_encode_rejects_disagreement() {
        let mut chip = Chip::new(1, 1, 1, 4, "TGCATGCA", Topology::Single).unwrap();
        // 'A' does not match the deposition sequence at step 1 ('G')
        assert!(chip.encode_embedding(0, "-", " ACAT   ").is_err());
        // too few productive steps
        assert!(chip.encode_embedding(0, "-", " GCA    ").is_err());
    }

    #[test]
    fn test_randomize_single_valid() {
        let mut chip = Chip::new(4, 4, 16, 6, AFFY_DEP_SEQ, Topology::Single).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        chip.randomize(&mut rng).unwrap();

        let mut probe = Vec::new();
        for id in 0..chip.num_probes {
            assert_eq!(chip.embed[id].count_ones(), 6);
            chip.decode(id, &mut probe);
            assert_eq!(probe.len(), 6);
        }
    }

    #[test]
    fn test_randomize_pairs_valid() {
        let mut chip = Chip::new(4, 4, 16, 9, AFFY_DEP_SEQ, Topology::PmPair).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        chip.randomize(&mut rng).unwrap();

        for id in (0..chip.num_probes).step_by(2) {
            assert!(chip.is_pm(id));
            assert!(!chip.is_pm(id + 1));
            chip.validate_pair(id, id + 1).unwrap();
        }

        // PM directly above MM in the same column
        for c in 0..chip.num_cols {
            for r in 0..chip.num_rows {
                if let Some(id) = chip.spot(r, c) {
                    if chip.is_pm(id) {
                        assert_eq!(chip.spot(r + 1, c), Some(id + 1));
                    }
                }
            }
        }
    }

    #[test]
    fn test_layout_round_trip() {
        let mut chip = Chip::new(4, 3, 10, 5, AFFY_DEP_SEQ, Topology::Single).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        chip.randomize(&mut rng).unwrap();
        chip.fixed[0][0] = true;

        let mut buf = Vec::new();
        chip.write_layout(&mut buf).unwrap();

        let read = Chip::read_layout(&mut buf.as_slice()).unwrap();
        assert_eq!(chip, read);
    }

    #[test]
    fn test_layout_round_trip_paired() {
        let mut chip = Chip::new(6, 2, 8, 9, AFFY_DEP_SEQ, Topology::PmPair).unwrap();
        let mut rng = StdRng::seed_from_u64(13);
        chip.randomize(&mut rng).unwrap();

        let mut buf = Vec::new();
        chip.write_layout(&mut buf).unwrap();

        let read = Chip::read_layout(&mut buf.as_slice()).unwrap();
        assert_eq!(chip, read);
    }
}
