use anyhow::{bail, Result};

/// How conflicts between neighboring spots are weighted.
///
/// A model combines a position-dependent weight (conflicts near the middle of
/// a probe do more damage than near its ends) and a distance-dependent weight
/// (closer spots interfere more), plus the radius of the region around a spot
/// inside which the distance weight is non-zero.
///
/// A model is a plain immutable value: build one and hand it to every engine
/// and evaluation that must agree on the weighting.
#[derive(Debug, Clone)]
pub struct ConflictModel {
    kind: Kind,
    dim: usize,
    dist: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Default,
    Simplified,
    BorderLength,
    Unbalanced,
}

const DEFAULT_DIM: usize = 3;
const THETA_NUM: f64 = 5.0;

#[rustfmt::skip]
const SIMPLIFIED_DIST: [f64; 49] = [
    0.0, 0.0,  0.0, 0.0, 0.0, 0.0,  0.0,
    0.0, 0.0,  0.0, 0.1, 0.0, 0.0,  0.0,
    0.0, 0.0,  0.5, 1.0, 0.5, 0.0,  0.0,
    0.0, 0.1,  1.0, 0.0, 1.0, 0.1,  0.0,
    0.0, 0.0,  0.5, 1.0, 0.5, 0.0,  0.0,
    0.0, 0.0,  0.0, 0.1, 0.0, 0.0,  0.0,
    0.0, 0.0,  0.0, 0.0, 0.0, 0.0,  0.0,
];

// Asymmetric on purpose; exercises code paths that symmetric weightings
// cannot reach.
#[rustfmt::skip]
const UNBALANCED_DIST: [f64; 49] = [
    0.3,    0.83,  0.3, 0.1511, 0.12,   2.1,   0.03,
    0.1,    0.125, 0.2, 0.25,   0.2,    0.325, 0.015,
    0.15,   0.27,  0.5, 3.0,    0.5,    0.225, 0.3,
    0.5111, 0.25,  2.0, 0.0,    1.3,    0.45,  0.6111,
    0.011,  0.24,  0.0, 1.5003, 0.7,    0.3,   0.3,
    0.18,   0.125, 0.2, 0.35,   0.4,    0.0,   0.03,
    0.0,    0.0,   0.1, 0.3111, 0.2,    0.02,  1.1,
];

impl ConflictModel {
    /// The standard conflict index: distance weight `1/d^2` within a 7x7
    /// region, position weight decaying exponentially from the probe's
    /// middle.
    pub fn default_index() -> Self {
        let size = 2 * DEFAULT_DIM + 1;
        let mut dist = vec![0.0; size * size];
        for r in 0..size {
            let v = DEFAULT_DIM as f64 - r as f64;
            for c in 0..size {
                let h = DEFAULT_DIM as f64 - c as f64;
                let d2 = v * v + h * h;
                dist[r * size + c] = if d2 > 0.0 { 1.0 / d2 } else { 0.0 };
            }
        }
        ConflictModel {
            kind: Kind::Default,
            dim: DEFAULT_DIM,
            dist,
        }
    }

    /// A coarser weighting: a small fixed distance table and
    /// integer-truncated position weights.
    pub fn simplified() -> Self {
        ConflictModel {
            kind: Kind::Simplified,
            dim: DEFAULT_DIM,
            dist: SIMPLIFIED_DIST.to_vec(),
        }
    }

    /// Weighting equivalent to plain border length: the four immediate
    /// neighbors count 1, everything else 0, and every base position counts
    /// the same.
    pub fn border_length() -> Self {
        #[rustfmt::skip]
        let dist = vec![
            0.0, 1.0, 0.0,
            1.0, 0.0, 1.0,
            0.0, 1.0, 0.0,
        ];
        ConflictModel {
            kind: Kind::BorderLength,
            dim: 1,
            dist,
        }
    }

    /// A deliberately skewed weighting used for testing: asymmetric distance
    /// table, position weights biased towards the start of the probe.
    pub fn unbalanced() -> Self {
        ConflictModel {
            kind: Kind::Unbalanced,
            dim: DEFAULT_DIM,
            dist: UNBALANCED_DIST.to_vec(),
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "default" => Ok(Self::default_index()),
            "simplified" => Ok(Self::simplified()),
            "border" => Ok(Self::border_length()),
            "unbalanced" => Ok(Self::unbalanced()),
            _ => bail!("unknown conflict model: {}", name),
        }
    }

    /// True when this model is the plain border-length weighting.
    pub fn is_border_length(&self) -> bool {
        self.kind == Kind::BorderLength
    }

    /// Number of rows/columns around a spot with non-zero distance weight.
    pub fn radius(&self) -> usize {
        self.dim
    }

    /// Weight of a conflict at base number `base` (0-based count of bases
    /// already synthesized) of a `probe_len`-mer.
    pub fn position_weight(&self, base: usize, probe_len: usize) -> f64 {
        match self.kind {
            Kind::BorderLength => 1.0,
            Kind::Unbalanced => (probe_len - base) as f64,
            Kind::Default => pos_weight_exp(base, probe_len),
            Kind::Simplified => pos_weight_exp(base, probe_len).trunc(),
        }
    }

    /// Distance weight of spot `(r2, c2)` in regards to spot `(r1, c1)`.
    /// Callers must ensure both offsets are within [`ConflictModel::radius`].
    #[inline]
    pub fn distance_weight(&self, r1: usize, c1: usize, r2: usize, c2: usize) -> f64 {
        let size = 2 * self.dim + 1;
        let dr = (self.dim as isize + r2 as isize - r1 as isize) as usize;
        let dc = (self.dim as isize + c2 as isize - c1 as isize) as usize;
        self.dist[dr * size + dc]
    }
}

/// `c * exp(theta * lambda)` with `theta = 5 / probe_len`,
/// `c = exp(-theta)` and `lambda` the distance-from-nearer-end rank of the
/// base. Peaks at the middle of the probe, 1.0 at either end.
fn pos_weight_exp(base: usize, probe_len: usize) -> f64 {
    let theta = THETA_NUM / probe_len as f64;
    let c = 1.0 / theta.exp();
    let lambda = if base <= probe_len - base {
        (base + 1) as f64
    } else {
        (probe_len - base + 1) as f64
    };
    c * (theta * lambda).exp()
}
