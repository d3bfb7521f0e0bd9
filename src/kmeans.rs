use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::block::BlockVector;
use crate::codebook::Codebook;
use crate::distance::l2_distance;
use crate::parameters::TrainingParameters;
use crate::EncodingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingState {
    Seeded,
    Refining,
    Converged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Number of refinement iterations, seeding excluded.
    pub iterations: usize,
    /// Training MSE after the last iteration.
    pub mse: f64,
    /// `false` if the iteration limit was reached first.
    pub converged: bool,
    /// How many times an empty cluster got a new codeword.
    pub reseeded: usize,
}

/// LBG codebook training over a set of block vectors.
///
/// `dist2cent[i]` is the distance of `blocks[i]` to the codeword it is
/// assigned to.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub codebook: Codebook,
    pub dist2cent: Vec<f32>,
    pub state: TrainingState,
    /// MSE after seeding followed by the MSE of every refinement iteration.
    pub mse_history: Vec<f64>,
    pub reseeded: usize,
}

impl KMeans {
    pub fn run(
        blocks: &mut [BlockVector],
        block_size: usize,
        codebook_size: usize,
        parameters: &TrainingParameters,
        stop_condition: impl Fn() -> bool,
    ) -> Result<Self, EncodingError> {
        parameters.validate()?;
        if codebook_size == 0 {
            return Err(EncodingError::InvalidParameters(
                "codebook_size must be at least 1".to_string(),
            ));
        }
        if blocks.is_empty() {
            return Err(EncodingError::EmptyTrainingSet);
        }
        let dim = block_size * block_size;
        if let Some(block) = blocks.iter().find(|b| b.dim() != dim) {
            return Err(EncodingError::CodebookMismatch {
                expected: dim,
                actual: block.dim(),
            });
        }

        info!(
            blocks = blocks.len(),
            codebook_size, block_size, "Training codebook"
        );
        let mut kmeans = Self::seed(blocks, block_size, codebook_size);
        let mut previous_mse = kmeans.mse();
        kmeans.mse_history.push(previous_mse);
        debug!(mse = previous_mse, "Seeded codebook");

        for iteration in 1..=parameters.max_iterations {
            if stop_condition() {
                return Err(EncodingError::Stopped);
            }
            kmeans.state = TrainingState::Refining;
            kmeans.update_centroids(blocks);
            kmeans.update_indexes(blocks);

            let mse = kmeans.mse();
            kmeans.mse_history.push(mse);
            debug!(iteration, mse, "KMeans iteration");

            if mse == 0.0 || (previous_mse - mse).abs() / mse < parameters.eps {
                kmeans.state = TrainingState::Converged;
                break;
            }
            previous_mse = mse;
        }

        let summary = kmeans.summary();
        if summary.converged {
            info!(
                iterations = summary.iterations,
                mse = summary.mse,
                "Codebook converged"
            );
        } else {
            warn!(
                iterations = summary.iterations,
                mse = summary.mse,
                "Codebook training stopped at the iteration limit"
            );
        }
        Ok(kmeans)
    }

    /// Maximum-distance seeding.
    ///
    /// The origin counts as an extra centre while codewords are picked: the
    /// first codeword is the block with the largest norm, every next one is the
    /// block farthest from the origin and all codewords chosen so far. Blocks are
    /// labelled with their nearest chosen codeword.
    fn seed(blocks: &mut [BlockVector], block_size: usize, codebook_size: usize) -> Self {
        let mut codebook = Codebook::zeros(block_size, codebook_size);

        let origin = vec![0.0; block_size * block_size];
        let mut seed_distance: Vec<f32> = blocks
            .par_iter()
            .map(|block| l2_distance(&block.block, &origin))
            .collect();
        codebook.set(0, &blocks[farthest_block(&seed_distance)].block);

        let first = codebook.get(0);
        let mut dist2cent: Vec<f32> = blocks
            .par_iter_mut()
            .zip(seed_distance.par_iter_mut())
            .map(|(block, seed_distance)| {
                block.cluster_index = 0;
                let distance = l2_distance(&block.block, first);
                *seed_distance = seed_distance.min(distance);
                distance
            })
            .collect();

        for centroid_index in 1..codebook_size {
            let farthest = farthest_block(&seed_distance);
            codebook.set(centroid_index, &blocks[farthest].block);

            let centroid = codebook.get(centroid_index);
            blocks
                .par_iter_mut()
                .zip(dist2cent.par_iter_mut())
                .zip(seed_distance.par_iter_mut())
                .for_each(|((block, distance_to_centroid), seed_distance)| {
                    let distance = l2_distance(&block.block, centroid);
                    if distance < *distance_to_centroid {
                        *distance_to_centroid = distance;
                        block.cluster_index = centroid_index;
                    }
                    *seed_distance = seed_distance.min(distance);
                });
        }

        Self {
            codebook,
            dist2cent,
            state: TrainingState::Seeded,
            mse_history: Vec::new(),
            reseeded: 0,
        }
    }

    /// Replace every codeword with the mean of its cluster.
    fn update_centroids(&mut self, blocks: &[BlockVector]) {
        let dim = self.codebook.dim();
        let mut centroids_acc = vec![vec![0.0_f64; dim]; self.codebook.len()];
        let mut centroids_counter = vec![0usize; self.codebook.len()];
        for block in blocks {
            let centroid_data = &mut centroids_acc[block.cluster_index];
            for (c, v) in centroid_data.iter_mut().zip(block.block.iter()) {
                *c += f64::from(*v);
            }
            centroids_counter[block.cluster_index] += 1;
        }

        let mut empty_clusters = Vec::new();
        let mut mean = vec![0.0_f32; dim];
        for (centroid_index, (centroid_data, &count)) in
            centroids_acc.iter().zip(centroids_counter.iter()).enumerate()
        {
            if count == 0 {
                empty_clusters.push(centroid_index);
                continue;
            }
            for (m, c) in mean.iter_mut().zip(centroid_data.iter()) {
                *m = (*c / count as f64) as f32;
            }
            self.codebook.set(centroid_index, &mean);
        }

        for centroid_index in empty_clusters {
            self.reseed(blocks, centroid_index);
        }
    }

    /// An empty cluster takes the block that is currently farthest from its
    /// own codeword. That block's distance is zeroed so the next empty cluster
    /// picks a different one.
    fn reseed(&mut self, blocks: &[BlockVector], centroid_index: usize) {
        let farthest = farthest_block(&self.dist2cent);
        warn!(
            cluster = centroid_index,
            block = farthest,
            distance = self.dist2cent[farthest],
            "Empty cluster, re-seeding codeword"
        );
        self.codebook.set(centroid_index, &blocks[farthest].block);
        self.dist2cent[farthest] = 0.0;
        self.reseeded += 1;
    }

    /// Assign every block to its nearest codeword.
    fn update_indexes(&mut self, blocks: &mut [BlockVector]) {
        let codebook = &self.codebook;
        blocks
            .par_iter_mut()
            .zip(self.dist2cent.par_iter_mut())
            .for_each(|(block, distance_to_centroid)| {
                let (centroid_index, distance) = codebook.nearest(&block.block);
                block.cluster_index = centroid_index;
                *distance_to_centroid = distance;
            });
    }

    pub fn mse(&self) -> f64 {
        if self.dist2cent.is_empty() {
            return 0.0;
        }
        self.dist2cent
            .iter()
            .map(|&d| f64::from(d).powi(2))
            .sum::<f64>()
            / self.dist2cent.len() as f64
    }

    pub fn summary(&self) -> TrainingSummary {
        TrainingSummary {
            iterations: self.mse_history.len().saturating_sub(1),
            mse: self.mse_history.last().copied().unwrap_or_else(|| self.mse()),
            converged: self.state == TrainingState::Converged,
            reseeded: self.reseeded,
        }
    }
}

/// First index holding the largest distance.
fn farthest_block(distances: &[f32]) -> usize {
    let mut max = f32::MIN;
    let mut farthest = 0;
    for (index, &distance) in distances.iter().enumerate() {
        if distance > max {
            max = distance;
            farthest = index;
        }
    }
    farthest
}
