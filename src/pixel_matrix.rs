use num_traits::{AsPrimitive, PrimInt, Unsigned};

use crate::EncodingError;

/// Unsigned integer type a pixel sample can be stored in.
pub trait Sample: PrimInt + Unsigned + AsPrimitive<f32> + Send + Sync {
    fn bits_count() -> u32 {
        Self::zero().count_zeros()
    }
}

impl<T: PrimInt + Unsigned + AsPrimitive<f32> + Send + Sync> Sample for T {}

/// Square grid of intensity samples stored row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelMatrix<T: Sample = u8> {
    size: usize,
    data: Vec<T>,
}

impl<T: Sample> PixelMatrix<T> {
    pub fn new(size: usize, data: Vec<T>) -> Result<Self, EncodingError> {
        if data.len() != size * size {
            return Err(EncodingError::InvalidParameters(format!(
                "a {size}x{size} image needs {} samples, got {}",
                size * size,
                data.len()
            )));
        }
        Ok(Self { size, data })
    }

    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            data: vec![T::zero(); size * size],
        }
    }

    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self, EncodingError> {
        let size = rows.len();
        let mut data = Vec::with_capacity(size * size);
        for row in rows {
            if row.len() != size {
                return Err(EncodingError::InvalidParameters(format!(
                    "image must be square, got a row of {} samples in a {size}-row image",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self { size, data })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.size + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.data[row * self.size + col] = value;
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.size..(row + 1) * self.size]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Largest sample in the image, zero for an empty image.
    pub fn max_sample(&self) -> T {
        self.data.iter().copied().max().unwrap_or_else(T::zero)
    }
}

impl PixelMatrix<u8> {
    /// Decode raw 8-bit samples, one byte per pixel, row by row.
    pub fn from_raw_bytes(size: usize, bytes: &[u8]) -> Result<Self, EncodingError> {
        if bytes.len() < size * size {
            return Err(EncodingError::InvalidParameters(format!(
                "raw image is truncated: {} of {} bytes",
                bytes.len(),
                size * size
            )));
        }
        Self::new(size, bytes[..size * size].to_vec())
    }
}

#[cfg(feature = "image")]
mod image_conversions {
    use image::{ImageBuffer, Luma, Primitive};

    use super::{PixelMatrix, Sample};
    use crate::EncodingError;

    impl<T: Sample + Primitive> TryFrom<&ImageBuffer<Luma<T>, Vec<T>>> for PixelMatrix<T> {
        type Error = EncodingError;

        fn try_from(image: &ImageBuffer<Luma<T>, Vec<T>>) -> Result<Self, Self::Error> {
            let (width, height) = image.dimensions();
            if width != height {
                return Err(EncodingError::InvalidParameters(format!(
                    "image must be square, got {width}x{height}"
                )));
            }
            PixelMatrix::new(width as usize, image.as_raw().clone())
        }
    }

    impl<T: Sample + Primitive> From<&PixelMatrix<T>> for ImageBuffer<Luma<T>, Vec<T>> {
        fn from(matrix: &PixelMatrix<T>) -> Self {
            let size = matrix.size() as u32;
            ImageBuffer::from_fn(size, size, |x, y| Luma([matrix.get(y as usize, x as usize)]))
        }
    }
}
