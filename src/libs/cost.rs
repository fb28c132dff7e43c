use crate::libs::chip::{Chip, Region};
use crate::libs::conflict::ConflictModel;

/// Per-step conflict costs for one target probe, built from the fixed
/// embeddings of its neighbors.
///
/// `mask[p]` is the penalty the target pays for leaving step `p`
/// unproductive (some neighbor synthesizes there and the target's spot is
/// exposed); `unmask[p]` is the penalty for claiming step `p` (the target's
/// light would hit neighbors that are masked there).
///
/// The arrays are scratch: reset and refilled before every distance
/// computation, never persisted.
#[derive(Debug)]
pub struct CostArrays {
    pub mask: Vec<f64>,
    pub unmask: Vec<f64>,
}

impl CostArrays {
    pub fn new(embed_len: usize) -> Self {
        CostArrays {
            mask: vec![0.0; embed_len],
            unmask: vec![0.0; embed_len],
        }
    }

    pub fn reset(&mut self) {
        self.mask.fill(0.0);
        self.unmask.fill(0.0);
    }

    /// Adds one neighbor's contribution. Productive neighbor steps raise
    /// `mask`, unproductive ones raise `unmask` weighted by how exposed the
    /// neighbor's next base is.
    pub fn add_probe(
        &mut self,
        chip: &Chip,
        model: &ConflictModel,
        id: usize,
        mask_w: f64,
        unmask_w: f64,
    ) {
        let emb = &chip.embed[id];
        let mut base = 0;
        for pos in 0..chip.embed_len {
            if emb.get(pos) {
                self.mask[pos] += mask_w;
                base += 1;
            } else {
                self.unmask[pos] += unmask_w * model.position_weight(base, chip.probe_len);
            }
        }
    }

    /// Adds every neighbor within the model's radius of a spot, weighting
    /// each direction of the conflict by its own distance weight.
    pub fn add_spot(&mut self, chip: &Chip, model: &ConflictModel, row: usize, col: usize) {
        self.add_region(chip, model, row, col, &chip.region());
    }

    /// Like [`CostArrays::add_spot`], but only neighbors inside `region`
    /// contribute. Placement heuristics use this to look at partially
    /// filled areas of the chip.
    pub fn add_region(
        &mut self,
        chip: &Chip,
        model: &ConflictModel,
        row: usize,
        col: usize,
        region: &Region,
    ) {
        let dim = model.radius();
        let r_min = row.saturating_sub(dim).max(region.first_row);
        let r_max = (row + dim).min(region.last_row);
        let c_min = col.saturating_sub(dim).max(region.first_col);
        let c_max = (col + dim).min(region.last_col);

        for r in r_min..=r_max {
            for c in c_min..=c_max {
                if r == row && c == col {
                    continue;
                }
                let Some(id) = chip.spot(r, c) else { continue };

                let mask_w = model.distance_weight(row, col, r, c);
                let unmask_w = model.distance_weight(r, c, row, col);
                if mask_w > 0.0 || unmask_w > 0.0 {
                    self.add_probe(chip, model, id, mask_w, unmask_w);
                }
            }
        }
    }
}

/// Distance weights of one neighbor as seen from the two members of a
/// PM/MM pair.
#[derive(Debug, Default, Clone, Copy)]
pub struct PairWeights {
    pub mask_pm: f64,
    pub unmask_pm: f64,
    pub mask_mm: f64,
    pub unmask_mm: f64,
}

/// Role-split cost arrays for paired chips. The PM and MM probes of the
/// target pair sit on different rows, so the same neighbor (and the same
/// deposition step) can cost the two roles differently.
#[derive(Debug)]
pub struct PairCostArrays {
    pub mask_pm: Vec<f64>,
    pub mask_mm: Vec<f64>,
    pub unmask_pm: Vec<f64>,
    pub unmask_mm: Vec<f64>,
}

impl PairCostArrays {
    pub fn new(embed_len: usize) -> Self {
        PairCostArrays {
            mask_pm: vec![0.0; embed_len],
            mask_mm: vec![0.0; embed_len],
            unmask_pm: vec![0.0; embed_len],
            unmask_mm: vec![0.0; embed_len],
        }
    }

    pub fn reset(&mut self) {
        self.mask_pm.fill(0.0);
        self.mask_mm.fill(0.0);
        self.unmask_pm.fill(0.0);
        self.unmask_mm.fill(0.0);
    }

    /// Adds a neighboring pair's contribution regardless of location. The
    /// pair's two embeddings are merged; the two divergent middle steps
    /// count as a single base of the combined probe.
    pub fn add_pair_probe(&mut self, chip: &Chip, model: &ConflictModel, id: usize) {
        let pm = chip.pm_id(id);
        let mm = pm + 1;
        let mut base = 0;
        let mut middle_seen = false;

        for pos in 0..chip.embed_len {
            let p1 = chip.embed[pm].get(pos);
            let p2 = chip.embed[mm].get(pos);
            if p1 || p2 {
                self.mask_pm[pos] += 1.0;
                self.mask_mm[pos] += 1.0;
                if p1 && p2 {
                    base += 1;
                } else if !middle_seen {
                    base += 1;
                    middle_seen = true;
                }
            } else {
                let pw = model.position_weight(base, chip.probe_len);
                self.unmask_pm[pos] += pw;
                self.unmask_mm[pos] += pw;
            }
        }
    }

    /// Adds one neighboring probe with explicit per-role weights.
    pub fn add_single_probe(
        &mut self,
        chip: &Chip,
        model: &ConflictModel,
        id: usize,
        w: &PairWeights,
    ) {
        let emb = &chip.embed[id];
        let mut base = 0;
        for pos in 0..chip.embed_len {
            if emb.get(pos) {
                self.mask_pm[pos] += w.mask_pm;
                self.mask_mm[pos] += w.mask_mm;
                base += 1;
            } else {
                let pw = model.position_weight(base, chip.probe_len);
                self.unmask_pm[pos] += w.unmask_pm * pw;
                self.unmask_mm[pos] += w.unmask_mm * pw;
            }
        }
    }

    /// Adds every neighbor around the pair of spots that `(row, col)`
    /// belongs to. Each neighbor is weighted from the PM row and the MM row
    /// separately.
    pub fn add_spot(&mut self, chip: &Chip, model: &ConflictModel, row: usize, col: usize) {
        let Some(id) = chip.spot(row, col) else { return };
        let pm_row = if chip.is_pm(id) { row } else { row - 1 };
        let mm_row = pm_row + 1;

        let dim = model.radius();
        let region = chip.region();
        let r_min = pm_row.saturating_sub(dim).max(region.first_row);
        let r_max = (mm_row + dim).min(region.last_row);
        let c_min = col.saturating_sub(dim).max(region.first_col);
        let c_max = (col + dim).min(region.last_col);

        for r in r_min..=r_max {
            for c in c_min..=c_max {
                if c == col && (r == pm_row || r == mm_row) {
                    continue;
                }
                let Some(nid) = chip.spot(r, c) else { continue };

                let mut w = PairWeights::default();
                if r <= pm_row + dim {
                    w.mask_pm = model.distance_weight(pm_row, col, r, c);
                    w.unmask_pm = model.distance_weight(r, c, pm_row, col);
                }
                if r + dim >= mm_row {
                    w.mask_mm = model.distance_weight(mm_row, col, r, c);
                    w.unmask_mm = model.distance_weight(r, c, mm_row, col);
                }

                if w.mask_pm > 0.0 || w.unmask_pm > 0.0 || w.mask_mm > 0.0 || w.unmask_mm > 0.0 {
                    self.add_single_probe(chip, model, nid, &w);
                }
            }
        }
    }
}
