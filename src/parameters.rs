use serde::{Deserialize, Serialize};

use crate::EncodingError;

pub const DEFAULT_ACCURACY: f64 = 1e-5;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const MAX_INTENSITY_BIT: u8 = 16;

/// Shape of the images and of the codebook handled by one quantizer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizerParameters {
    /// Bit depth of the samples, `1..=16`.
    pub intensity_bit: u8,
    /// Side of a square block in pixels.
    pub block_size: usize,
    /// Side of the square image in pixels. Must be a multiple of `block_size`.
    pub image_size: usize,
    /// Number of codewords to train.
    pub codebook_size: usize,
}

impl Default for QuantizerParameters {
    fn default() -> Self {
        Self {
            intensity_bit: 8,
            block_size: 4,
            image_size: 512,
            codebook_size: 256,
        }
    }
}

impl QuantizerParameters {
    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.intensity_bit == 0 || self.intensity_bit > MAX_INTENSITY_BIT {
            return Err(EncodingError::InvalidParameters(format!(
                "intensity_bit must be in 1..={MAX_INTENSITY_BIT}, got {}",
                self.intensity_bit
            )));
        }
        if self.block_size == 0 {
            return Err(EncodingError::InvalidParameters(
                "block_size must be positive".to_string(),
            ));
        }
        if self.image_size == 0 {
            return Err(EncodingError::InvalidParameters(
                "image_size must be positive".to_string(),
            ));
        }
        if self.image_size % self.block_size != 0 {
            return Err(EncodingError::InvalidParameters(format!(
                "image_size {} is not a multiple of block_size {}",
                self.image_size, self.block_size
            )));
        }
        if self.codebook_size == 0 {
            return Err(EncodingError::InvalidParameters(
                "codebook_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Length of a flattened block.
    pub fn dim(&self) -> usize {
        self.block_size * self.block_size
    }

    pub fn blocks_per_image(&self) -> usize {
        let blocks_per_row = self.image_size / self.block_size;
        blocks_per_row * blocks_per_row
    }

    pub fn max_intensity(&self) -> u64 {
        max_intensity(self.intensity_bit)
    }
}

/// Largest sample value representable with `intensity_bit` bits, saturating
/// at `u64::MAX` from 64 bits on.
pub fn max_intensity(intensity_bit: u8) -> u64 {
    1u64.checked_shl(u32::from(intensity_bit)).map_or(u64::MAX, |bound| bound - 1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParameters {
    /// Relative MSE improvement below which training is considered converged.
    pub eps: f64,
    /// Hard limit on refinement iterations.
    pub max_iterations: usize,
}

impl Default for TrainingParameters {
    fn default() -> Self {
        Self {
            eps: DEFAULT_ACCURACY,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl TrainingParameters {
    pub fn validate(&self) -> Result<(), EncodingError> {
        if !self.eps.is_finite() || self.eps <= 0.0 {
            return Err(EncodingError::InvalidParameters(format!(
                "eps must be a positive finite number, got {}",
                self.eps
            )));
        }
        if self.max_iterations == 0 {
            return Err(EncodingError::InvalidParameters(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
