use serde::{Deserialize, Serialize};

use crate::parameters::max_intensity;

/// Reconstruction error and coding cost of one quantized image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizationMetrics {
    /// Mean over blocks of the squared distance to the assigned codeword.
    pub mse: f64,
    /// Peak signal-to-noise ratio in dB, `f64::INFINITY` for a lossless result.
    pub psnr: f64,
    /// Empirical entropy of the codeword indexes, bits per block.
    pub entropy: f64,
    /// Share of blocks assigned to each codeword.
    pub codeword_frequency: Vec<f64>,
    /// Fixed-length code size, `log2(codebook_size)`.
    pub bits_per_block: f64,
    /// Raw block bits divided by `bits_per_block`.
    pub compression_ratio: f64,
}

impl QuantizationMetrics {
    /// `indexes[i]` is the codeword of block `i`, `distances[i]` its distance to it.
    pub fn compute(
        indexes: &[usize],
        distances: &[f32],
        codebook_size: usize,
        dim: usize,
        intensity_bit: u8,
    ) -> Self {
        debug_assert_eq!(indexes.len(), distances.len());
        let mse = mean_squared_error(distances);
        let codeword_frequency = codeword_frequency(indexes, codebook_size);
        let bits_per_block = (codebook_size as f64).log2();
        let raw_bits = (dim * intensity_bit as usize) as f64;
        let compression_ratio = if bits_per_block > 0.0 {
            raw_bits / bits_per_block
        } else {
            f64::INFINITY
        };
        Self {
            mse,
            psnr: psnr(mse, intensity_bit),
            entropy: entropy(&codeword_frequency),
            codeword_frequency,
            bits_per_block,
            compression_ratio,
        }
    }
}

pub fn mean_squared_error(distances: &[f32]) -> f64 {
    if distances.is_empty() {
        return 0.0;
    }
    distances.iter().map(|&d| f64::from(d).powi(2)).sum::<f64>() / distances.len() as f64
}

/// `10 * log10(peak^2 / mse)`. A zero error gives positive infinity.
pub fn psnr(mse: f64, intensity_bit: u8) -> f64 {
    if mse == 0.0 {
        return f64::INFINITY;
    }
    let peak = max_intensity(intensity_bit) as f64;
    10.0 * (peak * peak / mse).log10()
}

pub fn codeword_frequency(indexes: &[usize], codebook_size: usize) -> Vec<f64> {
    let mut frequency = vec![0.0; codebook_size];
    if indexes.is_empty() {
        return frequency;
    }
    for &index in indexes {
        frequency[index] += 1.0;
    }
    let count = indexes.len() as f64;
    frequency.iter_mut().for_each(|f| *f /= count);
    frequency
}

/// Shannon entropy in bits, unused codewords contribute nothing.
pub fn entropy(frequency: &[f64]) -> f64 {
    frequency
        .iter()
        .filter(|&&f| f > 0.0)
        .map(|&f| -f * f.log2())
        .sum()
}
