use crate::libs::chip::Chip;
use crate::libs::conflict::ConflictModel;
use rayon::prelude::*;

/// Hamming distance between the embeddings of two probes. On paired chips
/// the merged PM+MM embeddings are compared instead, so the distance is a
/// property of the pair, not of one member.
pub fn hamming_distance(chip: &Chip, id_1: usize, id_2: usize) -> usize {
    if chip.is_paired() {
        let a1 = chip.embed[chip.pm_id(id_1)].words();
        let a2 = chip.embed[chip.pm_id(id_1) + 1].words();
        let b1 = chip.embed[chip.pm_id(id_2)].words();
        let b2 = chip.embed[chip.pm_id(id_2) + 1].words();
        a1.iter()
            .zip(a2)
            .zip(b1.iter().zip(b2))
            .map(|((x1, x2), (y1, y2))| ((x1 | x2) ^ (y1 | y2)).count_ones() as usize)
            .sum()
    } else {
        chip.embed[id_1].xor_count(&chip.embed[id_2])
    }
}

/// Distance between two embeddings under the model's position weights: every
/// step where `id_2` synthesizes while `id_1` is masked is charged with the
/// weight of the base of `id_1` that the stray light would damage.
pub fn weighted_distance(chip: &Chip, model: &ConflictModel, id_1: usize, id_2: usize) -> f64 {
    let mut base = 0;
    let mut dist = 0.0;
    for pos in 0..chip.embed_len {
        if chip.embed[id_1].get(pos) {
            base += 1;
        } else if chip.embed[id_2].get(pos) {
            dist += model.position_weight(base, chip.probe_len);
        }
    }
    dist
}

/// Total border length of the chip: over all deposition steps, the number of
/// adjacent spot pairs where one probe synthesizes and the other is masked.
/// Equivalently, the sum of Hamming distances over adjacent occupied spots.
pub fn border_length(chip: &Chip) -> u64 {
    (0..chip.num_rows)
        .into_par_iter()
        .map(|r| {
            let mut sum = 0u64;
            for c in 0..chip.num_cols {
                let Some(id) = chip.spot(r, c) else { continue };
                // right neighbor
                if c + 1 < chip.num_cols {
                    if let Some(other) = chip.spot(r, c + 1) {
                        sum += chip.embed[id].xor_count(&chip.embed[other]) as u64;
                    }
                }
                // below neighbor
                if r + 1 < chip.num_rows {
                    if let Some(other) = chip.spot(r + 1, c) {
                        sum += chip.embed[id].xor_count(&chip.embed[other]) as u64;
                    }
                }
            }
            sum
        })
        .sum()
}

/// Border length of every deposition step separately.
pub fn border_length_per_step(chip: &Chip) -> Vec<u64> {
    (0..chip.embed_len)
        .into_par_iter()
        .map(|step| {
            let mut sum = 0u64;
            for r in 0..chip.num_rows {
                for c in 0..chip.num_cols {
                    let Some(id) = chip.spot(r, c) else { continue };
                    let bit = chip.embed[id].get(step);
                    if c + 1 < chip.num_cols {
                        if let Some(other) = chip.spot(r, c + 1) {
                            if bit != chip.embed[other].get(step) {
                                sum += 1;
                            }
                        }
                    }
                    if r + 1 < chip.num_rows {
                        if let Some(other) = chip.spot(r + 1, c) {
                            if bit != chip.embed[other].get(step) {
                                sum += 1;
                            }
                        }
                    }
                }
            }
            sum
        })
        .collect()
}

/// Conflict index of the probe on a spot: over its masked steps, the damage
/// neighboring productive spots inflict on its next base, weighted by base
/// position and spot distance. Zero for empty spots.
pub fn conflict_index(chip: &Chip, model: &ConflictModel, row: usize, col: usize) -> f64 {
    let Some(id) = chip.spot(row, col) else {
        return 0.0;
    };

    let dim = model.radius();
    let region = chip.region();
    let r_min = row.saturating_sub(dim).max(region.first_row);
    let r_max = (row + dim).min(region.last_row);
    let c_min = col.saturating_sub(dim).max(region.first_col);
    let c_max = (col + dim).min(region.last_col);

    let mut conf = 0.0;
    let mut base = 0;

    for step in 0..chip.embed_len {
        if chip.embed[id].get(step) {
            // synthesizing; stray light cannot damage this spot here
            base += 1;
            continue;
        }

        let posw = model.position_weight(base, chip.probe_len);
        for r in r_min..=r_max {
            for c in c_min..=c_max {
                let Some(other) = chip.spot(r, c) else { continue };
                if other == id || !chip.embed[other].get(step) {
                    continue;
                }
                conf += posw * model.distance_weight(r, c, row, col);
            }
        }
    }

    conf
}

/// Mean conflict index over all probes of the chip.
pub fn average_conflict_index(chip: &Chip, model: &ConflictModel) -> f64 {
    let total: f64 = (0..chip.num_rows)
        .into_par_iter()
        .map(|r| {
            (0..chip.num_cols)
                .map(|c| conflict_index(chip, model, r, c))
                .sum::<f64>()
        })
        .sum();
    total / chip.num_probes as f64
}

/// The chip-wide quality measure a model minimizes: total border length for
/// the border-length model, average conflict index otherwise.
pub fn quality(chip: &Chip, model: &ConflictModel) -> f64 {
    if model.is_border_length() {
        border_length(chip) as f64
    } else {
        average_conflict_index(chip, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::chip::{Topology, AFFY_DEP_SEQ};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_border_length_two_spots() {
        let mut chip = Chip::new(1, 2, 2, 4, "TGCATGCA", Topology::Single).unwrap();
        chip.encode_embedding(0, "GCAT", " GCAT   ").unwrap();
        chip.encode_embedding(1, "TGCA", "TGCA    ").unwrap();
        chip.spots[0][0] = Some(0);
        chip.spots[0][1] = Some(1);

        // embeddings 01111000 vs 11110000 differ at steps 0 and 4
        assert_eq!(border_length(&chip), 2);
        assert_eq!(hamming_distance(&chip, 0, 1), 2);

        let per_step = border_length_per_step(&chip);
        assert_eq!(per_step.iter().sum::<u64>(), 2);
        assert_eq!(per_step[0], 1);
        assert_eq!(per_step[4], 1);
    }

    #[test]
    fn test_identical_embeddings_zero_everywhere() {
        let mut chip = Chip::new(1, 2, 2, 4, "TGCATGCA", Topology::Single).unwrap();
        chip.encode_embedding(0, "GCAT", " GCAT   ").unwrap();
        chip.encode_embedding(1, "GCAT", " GCAT   ").unwrap();
        chip.spots[0][0] = Some(0);
        chip.spots[0][1] = Some(1);

        assert_eq!(border_length(&chip), 0);
        let model = ConflictModel::default_index();
        assert_relative_eq!(average_conflict_index(&chip, &model), 0.0);
        assert_relative_eq!(weighted_distance(&chip, &model, 0, 1), 0.0);
    }

    #[test]
    fn test_per_step_sums_to_total() {
        let mut chip = Chip::new(5, 5, 25, 8, AFFY_DEP_SEQ, Topology::Single).unwrap();
        let mut rng = StdRng::seed_from_u64(19);
        chip.randomize(&mut rng).unwrap();

        let total = border_length(&chip);
        let per_step = border_length_per_step(&chip);
        assert_eq!(per_step.iter().sum::<u64>(), total);
        assert!(total > 0);
    }

    #[test]
    fn test_conflict_index_empty_spot() {
        let chip = Chip::new(2, 2, 1, 4, "TGCATGCA", Topology::Single).unwrap();
        let model = ConflictModel::default_index();
        assert_relative_eq!(conflict_index(&chip, &model, 1, 1), 0.0);
    }
}
