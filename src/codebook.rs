use serde::{Deserialize, Serialize};

use crate::distance::l2_distance;
use crate::EncodingError;

pub type Codeword = Vec<f32>;

/// Ordered set of codewords trained for one block size.
///
/// Codewords are addressed by their position; the position is the symbol a
/// decoder receives for every block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codebook {
    block_size: usize,
    codewords: Vec<Codeword>,
}

impl Codebook {
    pub fn new(block_size: usize, codewords: Vec<Codeword>) -> Result<Self, EncodingError> {
        if block_size == 0 {
            return Err(EncodingError::InvalidParameters(
                "block_size must be positive".to_string(),
            ));
        }
        if codewords.is_empty() {
            return Err(EncodingError::InvalidParameters(
                "codebook must contain at least one codeword".to_string(),
            ));
        }
        let dim = block_size * block_size;
        if let Some(codeword) = codewords.iter().find(|c| c.len() != dim) {
            return Err(EncodingError::CodebookMismatch {
                expected: dim,
                actual: codeword.len(),
            });
        }
        if codewords.iter().flatten().any(|v| !v.is_finite()) {
            return Err(EncodingError::InvalidParameters(
                "codewords must be finite".to_string(),
            ));
        }
        Ok(Self {
            block_size,
            codewords,
        })
    }

    /// All-zero codebook, the state before seeding.
    pub(crate) fn zeros(block_size: usize, codebook_size: usize) -> Self {
        Self {
            block_size,
            codewords: vec![vec![0.0; block_size * block_size]; codebook_size],
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.block_size * self.block_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codewords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codewords.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &[f32] {
        &self.codewords[index]
    }

    pub(crate) fn set(&mut self, index: usize, codeword: &[f32]) {
        self.codewords[index].copy_from_slice(codeword);
    }

    pub fn codewords(&self) -> &[Codeword] {
        &self.codewords
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.codewords.iter().map(|c| c.as_slice())
    }

    /// Index of the closest codeword and the distance to it.
    ///
    /// Codewords are scanned in ascending order and only a strictly smaller
    /// distance replaces the current best, so ties go to the lowest index.
    pub fn nearest(&self, vector: &[f32]) -> (usize, f32) {
        let mut min_distance = f32::MAX;
        let mut min_index = 0;
        for (index, codeword) in self.codewords.iter().enumerate() {
            let distance = l2_distance(vector, codeword);
            if distance < min_distance {
                min_distance = distance;
                min_index = index;
            }
        }
        (min_index, min_distance)
    }

    /// Bits needed to address one codeword with a fixed-length code.
    pub fn bits_per_block(&self) -> f64 {
        (self.codewords.len() as f64).log2()
    }
}
