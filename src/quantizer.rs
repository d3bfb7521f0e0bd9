use rayon::prelude::*;
use tracing::debug;

use crate::block::{assemble, partition, BlockVector, Purpose};
use crate::codebook::Codebook;
use crate::kmeans::{KMeans, TrainingSummary};
use crate::metrics::QuantizationMetrics;
use crate::parameters::{QuantizerParameters, TrainingParameters};
use crate::pixel_matrix::{PixelMatrix, Sample};
use crate::EncodingError;

/// Blocks of an image after every block was replaced by its nearest codeword.
#[derive(Debug, Clone)]
pub struct QuantizedImage {
    blocks: Vec<BlockVector>,
    distances: Vec<f32>,
    metrics: QuantizationMetrics,
    block_size: usize,
    image_size: usize,
    intensity_bit: u8,
}

impl QuantizedImage {
    pub fn blocks(&self) -> &[BlockVector] {
        &self.blocks
    }

    /// Codeword index of every block, the symbols a decoder would receive.
    pub fn indexes(&self) -> Vec<usize> {
        self.blocks.iter().map(|b| b.cluster_index).collect()
    }

    /// Distance of every original block to the codeword that replaced it.
    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    pub fn metrics(&self) -> &QuantizationMetrics {
        &self.metrics
    }

    /// Decoded image built from the codewords.
    pub fn reconstruct<T: Sample>(&self) -> Result<PixelMatrix<T>, EncodingError> {
        assemble(
            &self.blocks,
            self.block_size,
            self.image_size,
            self.intensity_bit,
        )
    }
}

/// Replace every block with its nearest codeword. Returns the distances of the
/// original blocks to their codewords.
fn quantize_blocks(blocks: &mut [BlockVector], codebook: &Codebook) -> Vec<f32> {
    blocks
        .par_iter_mut()
        .map(|block| {
            let (centroid_index, distance) = codebook.nearest(&block.block);
            block.cluster_index = centroid_index;
            block.block.copy_from_slice(codebook.get(centroid_index));
            distance
        })
        .collect()
}

fn build_quantized_image(
    blocks: Vec<BlockVector>,
    distances: Vec<f32>,
    codebook: &Codebook,
    image_size: usize,
    intensity_bit: u8,
) -> QuantizedImage {
    let indexes: Vec<usize> = blocks.iter().map(|b| b.cluster_index).collect();
    let metrics = QuantizationMetrics::compute(
        &indexes,
        &distances,
        codebook.len(),
        codebook.dim(),
        intensity_bit,
    );
    debug!(
        blocks = blocks.len(),
        mse = metrics.mse,
        psnr = metrics.psnr,
        entropy = metrics.entropy,
        "Quantized image"
    );
    QuantizedImage {
        blocks,
        distances,
        metrics,
        block_size: codebook.block_size(),
        image_size,
        intensity_bit,
    }
}

/// Train a codebook on the blocks of all `images`.
pub fn train<T: Sample>(
    images: &[PixelMatrix<T>],
    parameters: &QuantizerParameters,
    training: &TrainingParameters,
) -> Result<Codebook, EncodingError> {
    let mut quantizer = VectorQuantizer::new(parameters.clone())?;
    for image in images {
        quantizer.load_image(image, Purpose::Train)?;
    }
    quantizer.train(training, || false)?;
    quantizer.into_codebook()
}

/// Quantize `image` with a trained codebook and measure the result.
pub fn quantize<T: Sample>(
    image: &PixelMatrix<T>,
    codebook: &Codebook,
    intensity_bit: u8,
) -> Result<QuantizedImage, EncodingError> {
    let mut blocks = partition(image, codebook.block_size(), intensity_bit)?;
    let distances = quantize_blocks(&mut blocks, codebook);
    Ok(build_quantized_image(
        blocks,
        distances,
        codebook,
        image.size(),
        intensity_bit,
    ))
}

/// Training and quantization session for images of one fixed shape.
///
/// Training blocks accumulate over every image loaded with [`Purpose::Train`]
/// until [`VectorQuantizer::clear_training_blocks`] is called.
#[derive(Debug, Clone)]
pub struct VectorQuantizer {
    parameters: QuantizerParameters,
    training_blocks: Vec<BlockVector>,
    quantize_blocks: Vec<BlockVector>,
    dist2cent: Vec<f32>,
    codebook: Option<Codebook>,
    summary: Option<TrainingSummary>,
}

impl VectorQuantizer {
    pub fn new(parameters: QuantizerParameters) -> Result<Self, EncodingError> {
        parameters.validate()?;
        Ok(Self {
            parameters,
            training_blocks: Vec::new(),
            quantize_blocks: Vec::new(),
            dist2cent: Vec::new(),
            codebook: None,
            summary: None,
        })
    }

    /// Session that quantizes with an already trained codebook.
    pub fn with_codebook(
        parameters: QuantizerParameters,
        codebook: Codebook,
    ) -> Result<Self, EncodingError> {
        let mut quantizer = Self::new(parameters)?;
        if codebook.block_size() != quantizer.parameters.block_size {
            return Err(EncodingError::CodebookMismatch {
                expected: quantizer.parameters.dim(),
                actual: codebook.dim(),
            });
        }
        if codebook.len() != quantizer.parameters.codebook_size {
            return Err(EncodingError::InvalidParameters(format!(
                "expected {} codewords, got {}",
                quantizer.parameters.codebook_size,
                codebook.len()
            )));
        }
        quantizer.codebook = Some(codebook);
        Ok(quantizer)
    }

    pub fn parameters(&self) -> &QuantizerParameters {
        &self.parameters
    }

    pub fn load_image<T: Sample>(
        &mut self,
        image: &PixelMatrix<T>,
        purpose: Purpose,
    ) -> Result<(), EncodingError> {
        if image.size() != self.parameters.image_size {
            return Err(EncodingError::ImageSizeMismatch {
                expected: self.parameters.image_size,
                actual: image.size(),
            });
        }
        let blocks = partition(
            image,
            self.parameters.block_size,
            self.parameters.intensity_bit,
        )?;
        match purpose {
            Purpose::Train => self.training_blocks.extend(blocks),
            Purpose::Quantize => self.quantize_blocks = blocks,
        }
        Ok(())
    }

    pub fn training_blocks(&self) -> &[BlockVector] {
        &self.training_blocks
    }

    pub fn quantize_blocks(&self) -> &[BlockVector] {
        &self.quantize_blocks
    }

    /// Distance of every training block to its codeword after the last training.
    pub fn distances_to_centroids(&self) -> &[f32] {
        &self.dist2cent
    }

    pub fn clear_training_blocks(&mut self) {
        self.training_blocks.clear();
        self.dist2cent.clear();
    }

    /// Train the codebook on every loaded training block, starting over from
    /// seeding. `stop_condition` is polled once per iteration.
    ///
    /// On error the session keeps the block labels, distances and codebook of
    /// the previous training.
    pub fn train(
        &mut self,
        training: &TrainingParameters,
        stop_condition: impl Fn() -> bool,
    ) -> Result<&TrainingSummary, EncodingError> {
        let mut blocks = self.training_blocks.clone();
        let kmeans = KMeans::run(
            &mut blocks,
            self.parameters.block_size,
            self.parameters.codebook_size,
            training,
            stop_condition,
        )?;
        self.training_blocks = blocks;
        let summary = kmeans.summary();
        self.dist2cent = kmeans.dist2cent;
        self.codebook = Some(kmeans.codebook);
        Ok(self.summary.insert(summary))
    }

    pub fn summary(&self) -> Option<&TrainingSummary> {
        self.summary.as_ref()
    }

    pub fn codebook(&self) -> Option<&Codebook> {
        self.codebook.as_ref()
    }

    pub fn into_codebook(self) -> Result<Codebook, EncodingError> {
        self.codebook.ok_or(EncodingError::NotTrained)
    }

    /// Quantize `image`, replacing the blocks of the previously quantized one.
    pub fn quantize<T: Sample>(
        &mut self,
        image: &PixelMatrix<T>,
    ) -> Result<QuantizedImage, EncodingError> {
        if self.codebook.is_none() {
            return Err(EncodingError::NotTrained);
        }
        self.load_image(image, Purpose::Quantize)?;
        let codebook = self.codebook.as_ref().ok_or(EncodingError::NotTrained)?;
        let distances = quantize_blocks(&mut self.quantize_blocks, codebook);
        Ok(build_quantized_image(
            self.quantize_blocks.clone(),
            distances,
            codebook,
            self.parameters.image_size,
            self.parameters.intensity_bit,
        ))
    }
}
