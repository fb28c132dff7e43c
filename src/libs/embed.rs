//! Optimum single-probe embedding.
//!
//! Given per-step conflict costs derived from the fixed embeddings of
//! neighboring probes, a dynamic program over (probe base, deposition step)
//! finds the cheapest valid embedding of a target probe and can rewrite the
//! stored embedding to realize it. The approach follows Kahng, Mandoiu,
//! Pevzner, Reda and Zelikovsky ("Border Length Minimization in DNA Array
//! Design", WABI 2002; "Engineering a scalable placement heuristic for DNA
//! probe arrays", RECOMB 2003).
//!
//! [`Embedder`] handles single-probe chips, [`PairEmbedder`] the PM/MM pairs
//! of Affymetrix-style chips. Both own their scratch buffers, so one engine
//! instance is cheap to call repeatedly but must not be shared across
//! threads; spawn one engine per worker instead.

use crate::libs::chip::{Chip, Region};
use crate::libs::conflict::ConflictModel;
use crate::libs::cost::{CostArrays, PairCostArrays, PairWeights};
use anyhow::{bail, Result};

/// Optimum embedding engine for single-probe chips.
///
/// The cost arrays persist between calls on purpose: accumulate a
/// neighborhood once with [`Embedder::add_probe_cost`] or
/// [`Embedder::add_spot_cost`], then query [`Embedder::min_distance`] for
/// many candidate probes against it. Consecutive queries reuse matrix rows
/// for the longest shared probe prefix.
pub struct Embedder {
    probe_len: usize,
    embed_len: usize,
    model: ConflictModel,
    costs: CostArrays,
    matrix: Vec<Vec<f64>>,
    probe: Vec<u8>,
    /// First matrix row whose contents cannot be reused from the previous
    /// call.
    start_row: usize,
    /// Per-row column window: leftmost column reachable by any valid
    /// embedding...
    start_col: Vec<usize>,
    /// ...and rightmost column from which the remaining bases can still be
    /// placed.
    last_col: Vec<usize>,
    pos_mult: Vec<f64>,
}

impl Embedder {
    pub fn new(chip: &Chip, model: ConflictModel) -> Result<Embedder> {
        if chip.is_paired() {
            bail!("single-probe embedder cannot run on a paired chip; use PairEmbedder");
        }
        let probe_len = chip.probe_len;
        let embed_len = chip.embed_len;

        let mut last_col = vec![0; probe_len + 1];
        last_col[probe_len] = embed_len;

        let pos_mult = (0..=probe_len)
            .map(|b| model.position_weight(b, probe_len))
            .collect();

        Ok(Embedder {
            probe_len,
            embed_len,
            model,
            costs: CostArrays::new(embed_len),
            matrix: vec![vec![0.0; embed_len + 1]; probe_len + 1],
            probe: vec![0; probe_len],
            start_row: 0,
            start_col: vec![0; probe_len + 1],
            last_col,
            pos_mult,
        })
    }

    pub fn model(&self) -> &ConflictModel {
        &self.model
    }

    /// Zeroes the cost arrays before a new neighborhood is accumulated.
    pub fn reset_costs(&mut self) {
        self.start_row = 0;
        self.costs.reset();
    }

    /// Adds the fixed embedding of `id` to the cost arrays, with unit
    /// weights.
    pub fn add_probe_cost(&mut self, chip: &Chip, id: usize) {
        self.start_row = 0;
        self.costs.add_probe(chip, &self.model, id, 1.0, 1.0);
    }

    /// Adds every neighbor of a spot within the model's radius.
    pub fn add_spot_cost(&mut self, chip: &Chip, row: usize, col: usize) {
        self.start_row = 0;
        self.costs.add_spot(chip, &self.model, row, col);
    }

    /// Adds the neighbors of a spot that fall inside `region`.
    pub fn add_region_cost(
        &mut self,
        chip: &Chip,
        row: usize,
        col: usize,
        region: &Region,
    ) {
        self.start_row = 0;
        self.costs.add_region(chip, &self.model, row, col, region);
    }

    /// Minimum cost any valid embedding of `id` can have against the
    /// currently accumulated costs.
    pub fn min_distance(&mut self, chip: &Chip, id: usize) -> f64 {
        self.decode_probe(chip, id);
        self.compute_matrix(chip, f64::INFINITY)
    }

    /// Like [`Embedder::min_distance`], but aborts as soon as the minimum
    /// provably exceeds `max_dist`; the returned value is then only a lower
    /// bound (and greater than `max_dist`).
    pub fn min_distance_bounded(&mut self, chip: &Chip, id: usize, max_dist: f64) -> f64 {
        self.decode_probe(chip, id);
        self.compute_matrix(chip, max_dist)
    }

    /// Minimum cost of any embedding of `id` against the fixed embeddings of
    /// `others`.
    pub fn min_distance_probe(&mut self, chip: &Chip, id: usize, others: &[usize]) -> f64 {
        self.reset_costs();
        for &o in others {
            self.add_probe_cost(chip, o);
        }
        self.min_distance(chip, id)
    }

    /// Minimum conflict any embedding of the probe on `(row, col)` can cause
    /// in its neighborhood, or 0 for an empty spot.
    pub fn min_distance_spot(&mut self, chip: &Chip, row: usize, col: usize) -> f64 {
        match chip.spot(row, col) {
            None => 0.0,
            Some(id) => {
                self.reset_costs();
                self.add_spot_cost(chip, row, col);
                self.min_distance(chip, id)
            }
        }
    }

    /// Minimum conflict `id` would cause if placed on `(row, col)`.
    pub fn min_distance_spot_probe(
        &mut self,
        chip: &Chip,
        row: usize,
        col: usize,
        id: usize,
    ) -> f64 {
        self.reset_costs();
        self.add_spot_cost(chip, row, col);
        self.min_distance(chip, id)
    }

    /// Rewrites the stored embedding of `id` to an optimal one against the
    /// currently accumulated costs and returns the achieved cost.
    pub fn reembed(&mut self, chip: &mut Chip, id: usize) -> f64 {
        self.decode_probe(chip, id);
        let d = self.compute_matrix(chip, f64::INFINITY);
        self.encode(chip, id);
        d
    }

    /// Re-embeds `id` optimally against the fixed embeddings of `others`.
    pub fn reembed_probe(&mut self, chip: &mut Chip, id: usize, others: &[usize]) -> f64 {
        self.reset_costs();
        for &o in others {
            self.add_probe_cost(chip, o);
        }
        self.reembed(chip, id)
    }

    /// Re-embeds the probe on `(row, col)` optimally against its
    /// neighborhood; returns 0 for an empty spot.
    pub fn reembed_spot(&mut self, chip: &mut Chip, row: usize, col: usize) -> f64 {
        match chip.spot(row, col) {
            None => 0.0,
            Some(id) => {
                self.reset_costs();
                self.add_spot_cost(chip, row, col);
                self.reembed(chip, id)
            }
        }
    }

    /// Decodes the probe sequence of `id` into the probe buffer, tracking
    /// which rows of the matrix stay valid from the previous call and
    /// recomputing the feasible column window of every row.
    ///
    /// A probe whose stored embedding is corrupt makes the window searches
    /// run off the deposition sequence and panic; stored embeddings are
    /// validated at the load boundary, not here.
    fn decode_probe(&mut self, chip: &Chip, id: usize) {
        let dep = chip.dep_seq();
        let emb = &chip.embed[id];
        let mut update_start_col = false;

        let mut i = 0;
        for pos in 0..self.embed_len {
            if !emb.get(pos) {
                continue;
            }
            if self.probe[i] != dep[pos] {
                self.probe[i] = dep[pos];
                update_start_col = true;
                if self.start_row > i + 1 {
                    self.start_row = i + 1;
                }
            }
            if update_start_col {
                let mut c = self.start_col[i];
                while dep[c] != self.probe[i] {
                    c += 1;
                }
                self.start_col[i + 1] = c + 1;
            }
            i += 1;
        }

        // scan right to left for the last column each row can use while the
        // remaining bases still fit
        for r in (0..self.probe_len).rev() {
            let mut c = self.last_col[r + 1] - 1;
            while dep[c] != self.probe[r] {
                c -= 1;
            }
            if self.last_col[r] < c && self.start_row > r {
                self.start_row = r;
            }
            self.last_col[r] = c;
        }
    }

    fn compute_matrix(&mut self, chip: &Chip, max_dist: f64) -> f64 {
        let dep = chip.dep_seq();

        if self.start_row == 0 {
            self.matrix[0][0] = 0.0;
            for c in 1..=self.last_col[0] {
                self.matrix[0][c] =
                    self.matrix[0][c - 1] + self.pos_mult[0] * self.costs.mask[c - 1];
            }
            self.start_row = 1;
        }

        for r in self.start_row..=self.probe_len {
            let (prev_rows, cur_rows) = self.matrix.split_at_mut(r);
            let prev = &prev_rows[r - 1];
            let cur = &mut cur_rows[0];

            let sc = self.start_col[r];
            cur[sc - 1] = f64::INFINITY;
            let mut min = f64::INFINITY;

            for c in sc..=self.last_col[r] {
                let mask = cur[c - 1] + self.pos_mult[r] * self.costs.mask[c - 1];
                let unmask = if self.probe[r - 1] == dep[c - 1] {
                    prev[c - 1] + self.costs.unmask[c - 1]
                } else {
                    f64::INFINITY
                };
                let v = mask.min(unmask);
                cur[c] = v;
                if v < min {
                    min = v;
                }
            }

            // the row minimum is a lower bound on the final cost
            if min > max_dist {
                self.start_row = r;
                return min;
            }
        }

        self.start_row = self.probe_len + 1;
        self.matrix[self.probe_len][self.embed_len]
    }

    /// Traces the matrix back from the bottom-right corner, rewriting the
    /// embedding bits. Ties go to the masked branch, which yields the
    /// left-most of all optimal embeddings; downstream passes rely on this
    /// being deterministic.
    ///
    /// The mask expression must mirror `compute_matrix` exactly so the
    /// float equality test reproduces the forward decision.
    fn encode(&self, chip: &mut Chip, id: usize) {
        let emb = &mut chip.embed[id];
        let mut r = self.probe_len;

        for pos in (0..self.embed_len).rev() {
            emb.clear(pos);
            if r == 0 {
                continue;
            }
            let mask = self.matrix[r][pos] + self.pos_mult[r] * self.costs.mask[pos];
            if self.matrix[r][pos + 1] == mask {
                continue;
            }
            emb.set(pos);
            r -= 1;
        }
    }
}

/// Optimum embedding engine for PM/MM paired chips.
///
/// The two probes of a pair are re-embedded together: the combined sequence
/// (shared bases plus the two divergent middle bases) has two possible
/// orderings along the deposition sequence, so two matrices are computed and
/// the cheaper one is traced back into both embeddings at once.
pub struct PairEmbedder {
    probe_len: usize,
    embed_len: usize,
    /// 1-based row of the first divergent base in the combined sequence.
    middle: usize,
    model: ConflictModel,
    costs: PairCostArrays,
    matrix_1: Vec<Vec<f64>>,
    matrix_2: Vec<Vec<f64>>,
    probe_1: Vec<u8>,
    probe_2: Vec<u8>,
    pos_mult: Vec<f64>,
}

impl PairEmbedder {
    pub fn new(chip: &Chip, model: ConflictModel) -> Result<PairEmbedder> {
        if !chip.is_paired() {
            bail!("pair embedder cannot run on a single-probe chip; use Embedder");
        }
        let probe_len = chip.probe_len;
        let embed_len = chip.embed_len;
        let middle = chip.middle_base();

        // the combined sequence has probe_len + 1 bases; its two middle rows
        // carry the same position weight as the one middle base they encode
        let mut pos_mult = vec![0.0; probe_len + 2];
        for (b, w) in pos_mult.iter_mut().enumerate().take(middle + 1) {
            *w = model.position_weight(b, probe_len);
        }
        pos_mult[middle + 1] = pos_mult[middle];
        for b in middle + 2..=probe_len + 1 {
            pos_mult[b] = model.position_weight(b - 1, probe_len);
        }

        Ok(PairEmbedder {
            probe_len,
            embed_len,
            middle,
            model,
            costs: PairCostArrays::new(embed_len),
            matrix_1: vec![vec![0.0; embed_len + 1]; probe_len + 2],
            matrix_2: vec![vec![0.0; embed_len + 1]; probe_len + 2],
            probe_1: Vec::with_capacity(probe_len + 1),
            probe_2: Vec::with_capacity(probe_len + 1),
            pos_mult,
        })
    }

    pub fn model(&self) -> &ConflictModel {
        &self.model
    }

    pub fn reset_costs(&mut self) {
        self.costs.reset();
    }

    /// Adds a neighboring pair's merged embedding to both roles.
    pub fn add_pair_cost(&mut self, chip: &Chip, id: usize) {
        self.costs.add_pair_probe(chip, &self.model, id);
    }

    /// Adds one neighboring probe with explicit per-role weights.
    pub fn add_probe_cost(&mut self, chip: &Chip, id: usize, weights: &PairWeights) {
        self.costs.add_single_probe(chip, &self.model, id, weights);
    }

    /// Adds every neighbor around the pair of spots `(row, col)` belongs to.
    pub fn add_spot_cost(&mut self, chip: &Chip, row: usize, col: usize) {
        self.costs.add_spot(chip, &self.model, row, col);
    }

    /// Minimum cost any synchronized embedding of the pair can have against
    /// the currently accumulated costs.
    pub fn min_distance(&mut self, chip: &Chip, id: usize) -> f64 {
        let pm = chip.pm_id(id);
        chip.decode_pair(pm, &mut self.probe_1, &mut self.probe_2);
        let d1 = self.compute_matrix(chip, true);
        let d2 = self.compute_matrix(chip, false);
        d1.min(d2)
    }

    /// Minimum cost of the pair of `id` against the fixed embeddings of the
    /// pairs in `others`.
    pub fn min_distance_pair(&mut self, chip: &Chip, id: usize, others: &[usize]) -> f64 {
        self.reset_costs();
        for &o in others {
            self.add_pair_cost(chip, o);
        }
        self.min_distance(chip, id)
    }

    /// Minimum conflict the pair on `(row, col)` can cause in its
    /// neighborhood, or 0 for an empty spot.
    pub fn min_distance_spot(&mut self, chip: &Chip, row: usize, col: usize) -> f64 {
        match chip.spot(row, col) {
            None => 0.0,
            Some(id) => {
                self.reset_costs();
                self.add_spot_cost(chip, row, col);
                self.min_distance(chip, id)
            }
        }
    }

    /// Rewrites both embeddings of the pair of `id` to the cheaper of the
    /// two combined orderings and returns the achieved cost.
    pub fn reembed(&mut self, chip: &mut Chip, id: usize) -> f64 {
        let pm = chip.pm_id(id);
        chip.decode_pair(pm, &mut self.probe_1, &mut self.probe_2);
        let d1 = self.compute_matrix(chip, true);
        let d2 = self.compute_matrix(chip, false);

        if d1 <= d2 {
            self.encode(chip, pm, pm + 1, true);
            d1
        } else {
            self.encode(chip, pm + 1, pm, false);
            d2
        }
    }

    /// Re-embeds the pair of `id` against the fixed pairs in `others`.
    pub fn reembed_pair(&mut self, chip: &mut Chip, id: usize, others: &[usize]) -> f64 {
        self.reset_costs();
        for &o in others {
            self.add_pair_cost(chip, o);
        }
        self.reembed(chip, id)
    }

    /// Re-embeds the pair on `(row, col)` against its neighborhood; returns
    /// 0 for an empty spot.
    pub fn reembed_spot(&mut self, chip: &mut Chip, row: usize, col: usize) -> f64 {
        match chip.spot(row, col) {
            None => 0.0,
            Some(id) => {
                self.reset_costs();
                self.add_spot_cost(chip, row, col);
                self.reembed(chip, id)
            }
        }
    }

    /// Fills one of the two matrices. `first` selects the PM-base-first
    /// combined ordering; in the other ordering the roles of the divergence
    /// rows swap.
    fn compute_matrix(&mut self, chip: &Chip, first: bool) -> f64 {
        let dep = chip.dep_seq();
        let (matrix, probe, mid_pm, mid_mm) = if first {
            (&mut self.matrix_1, &self.probe_1, self.middle, self.middle + 1)
        } else {
            (&mut self.matrix_2, &self.probe_2, self.middle + 1, self.middle)
        };
        let costs = &self.costs;
        let pos_mult = &self.pos_mult;

        matrix[0][0] = 0.0;
        for c in 1..=self.embed_len {
            matrix[0][c] = matrix[0][c - 1]
                + pos_mult[0] * (costs.mask_pm[c - 1] + costs.mask_mm[c - 1]);
        }

        let mut start = 1;
        for r in 1..=self.probe_len + 1 {
            let (prev_rows, cur_rows) = matrix.split_at_mut(r);
            let prev = &prev_rows[r - 1];
            let cur = &mut cur_rows[0];

            cur[start - 1] = f64::INFINITY;
            for c in start..=self.embed_len {
                let mask =
                    cur[c - 1] + pos_mult[r] * (costs.mask_pm[c - 1] + costs.mask_mm[c - 1]);

                let unmask = if probe[r - 1] == dep[c - 1] {
                    let mut u = prev[c - 1];
                    // at its own divergence row each role synthesizes while
                    // the other role is necessarily masked at this step
                    u += if r == mid_pm {
                        pos_mult[mid_mm] * costs.mask_mm[c - 1]
                    } else {
                        costs.unmask_mm[c - 1]
                    };
                    u += if r == mid_mm {
                        pos_mult[mid_pm] * costs.mask_pm[c - 1]
                    } else {
                        costs.unmask_pm[c - 1]
                    };
                    u
                } else {
                    f64::INFINITY
                };

                cur[c] = mask.min(unmask);
                if cur[c].is_infinite() {
                    start += 1;
                }
            }
            start += 1;
        }

        matrix[self.probe_len + 1][self.embed_len]
    }

    /// Traces one matrix back into the two stored embeddings. `id_1` is the
    /// probe whose middle base occupies the lower divergence row of the
    /// traced variant. At the divergence rows exactly one of the pair gets
    /// the bit; everywhere else the bits agree.
    ///
    /// The mask expression must mirror `compute_matrix` exactly.
    fn encode(&self, chip: &mut Chip, id_1: usize, id_2: usize, first: bool) {
        let matrix = if first { &self.matrix_1 } else { &self.matrix_2 };
        let costs = &self.costs;
        let mut r = self.probe_len + 1;

        for pos in (0..self.embed_len).rev() {
            chip.embed[id_1].clear(pos);
            chip.embed[id_2].clear(pos);
            if r == 0 {
                continue;
            }

            let mask = matrix[r][pos]
                + self.pos_mult[r] * (costs.mask_pm[pos] + costs.mask_mm[pos]);
            if matrix[r][pos + 1] == mask {
                continue;
            }

            if r != self.middle {
                chip.embed[id_2].set(pos);
            }
            if r != self.middle + 1 {
                chip.embed[id_1].set(pos);
            }
            r -= 1;
        }
    }
}
