use serde::{Deserialize, Serialize};

use crate::parameters::{max_intensity, MAX_INTENSITY_BIT};
use crate::pixel_matrix::{PixelMatrix, Sample};
use crate::EncodingError;

/// One image block flattened row by row, together with the codeword it is assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockVector {
    pub block: Vec<f32>,
    pub cluster_index: usize,
}

impl BlockVector {
    pub fn new(block: Vec<f32>) -> Self {
        Self {
            block,
            cluster_index: 0,
        }
    }

    fn zeroed(dim: usize) -> Self {
        Self::new(vec![0.0; dim])
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.block.len()
    }
}

/// What the blocks of a loaded image are used for.
///
/// Training blocks of several images accumulate, quantization blocks are
/// replaced by every new image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Train,
    Quantize,
}

fn check_block_shape<T: Sample>(
    image_size: usize,
    block_size: usize,
    intensity_bit: u8,
) -> Result<(), EncodingError> {
    if block_size == 0 || image_size % block_size != 0 {
        return Err(EncodingError::InvalidParameters(format!(
            "image_size {image_size} is not a multiple of block_size {block_size}"
        )));
    }
    if intensity_bit == 0
        || intensity_bit > MAX_INTENSITY_BIT
        || u32::from(intensity_bit) > T::bits_count()
    {
        return Err(EncodingError::InvalidParameters(format!(
            "intensity_bit {intensity_bit} does not fit a {}-bit sample",
            T::bits_count()
        )));
    }
    Ok(())
}

/// Split `image` into `block_size x block_size` blocks.
///
/// Blocks are ordered from left to right and top to bottom over the block grid,
/// and so are the pixels inside every block.
pub fn partition<T: Sample>(
    image: &PixelMatrix<T>,
    block_size: usize,
    intensity_bit: u8,
) -> Result<Vec<BlockVector>, EncodingError> {
    let image_size = image.size();
    check_block_shape::<T>(image_size, block_size, intensity_bit)?;
    let max = max_intensity(intensity_bit);

    let blocks_per_row = image_size / block_size;
    let mut blocks = vec![
        BlockVector::zeroed(block_size * block_size);
        blocks_per_row * blocks_per_row
    ];
    for i in 0..image_size {
        for (j, &sample) in image.row(i).iter().enumerate() {
            let value = sample.to_u64().unwrap_or(u64::MAX);
            if value > max {
                return Err(EncodingError::IntensityOutOfRange { value, max });
            }
            let block = &mut blocks[(i / block_size) * blocks_per_row + j / block_size];
            block.block[(i % block_size) * block_size + j % block_size] = sample.as_();
        }
    }
    Ok(blocks)
}

/// Inverse of [`partition`]. Values are rounded to the nearest integer and
/// clamped into the intensity range.
pub fn assemble<T: Sample>(
    blocks: &[BlockVector],
    block_size: usize,
    image_size: usize,
    intensity_bit: u8,
) -> Result<PixelMatrix<T>, EncodingError> {
    check_block_shape::<T>(image_size, block_size, intensity_bit)?;
    let blocks_per_row = image_size / block_size;
    if blocks.len() != blocks_per_row * blocks_per_row {
        return Err(EncodingError::InvalidParameters(format!(
            "a {image_size}x{image_size} image needs {} blocks, got {}",
            blocks_per_row * blocks_per_row,
            blocks.len()
        )));
    }
    let dim = block_size * block_size;
    if let Some(block) = blocks.iter().find(|b| b.dim() != dim) {
        return Err(EncodingError::CodebookMismatch {
            expected: dim,
            actual: block.dim(),
        });
    }

    let max = max_intensity(intensity_bit) as f32;
    let mut image = PixelMatrix::zeros(image_size);
    for i in 0..image_size {
        for j in 0..image_size {
            let value = blocks[(i / block_size) * blocks_per_row + j / block_size].block
                [(i % block_size) * block_size + j % block_size];
            let sample = num_traits::cast::<f32, T>(value.round().clamp(0.0, max)).ok_or_else(|| {
                EncodingError::InvalidParameters(format!("block value {value} is not a pixel"))
            })?;
            image.set(i, j, sample);
        }
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_order() {
        // 4x4 image, every sample equals its row-major position
        let image = PixelMatrix::new(4, (0..16u8).collect()).unwrap();
        let blocks = partition(&image, 2, 8).unwrap();

        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].block, vec![0.0, 1.0, 4.0, 5.0]);
        assert_eq!(blocks[1].block, vec![2.0, 3.0, 6.0, 7.0]);
        assert_eq!(blocks[2].block, vec![8.0, 9.0, 12.0, 13.0]);
        assert_eq!(blocks[3].block, vec![10.0, 11.0, 14.0, 15.0]);
        assert!(blocks.iter().all(|b| b.cluster_index == 0));
    }

    #[test]
    fn test_partition_rejects_bad_shapes() {
        let image = PixelMatrix::<u8>::zeros(6);
        assert!(partition(&image, 4, 8).is_err());
        assert!(partition(&image, 0, 8).is_err());
        assert!(partition(&image, 3, 9).is_err());
    }

    #[test]
    fn test_intensity_bit_must_fit_sample() {
        assert!(check_block_shape::<u8>(4, 2, 8).is_ok());
        assert!(check_block_shape::<u16>(4, 2, 16).is_ok());
        assert!(matches!(
            check_block_shape::<u8>(4, 2, 9),
            Err(EncodingError::InvalidParameters(_))
        ));
        assert!(check_block_shape::<u16>(4, 2, 17).is_err());
        assert!(check_block_shape::<u16>(4, 2, 0).is_err());
    }

    #[test]
    fn test_partition_rejects_out_of_range_samples() {
        let image = PixelMatrix::new(2, vec![0u16, 1, 2, 300]).unwrap();
        assert_eq!(
            partition(&image, 2, 8),
            Err(EncodingError::IntensityOutOfRange {
                value: 300,
                max: 255
            })
        );
        assert!(partition(&image, 2, 9).is_ok());
    }

    #[test]
    fn test_assemble_rounds_and_clamps() {
        let blocks = vec![BlockVector::new(vec![-3.0, 0.4, 254.6, 1000.0])];
        let image: PixelMatrix<u8> = assemble(&blocks, 2, 2, 8).unwrap();
        assert_eq!(image.as_slice(), &[0, 0, 255, 255]);

        assert!(assemble::<u8>(&blocks, 2, 4, 8).is_err());
    }
}
