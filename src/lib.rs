pub mod block;
pub mod codebook;
pub mod distance;
pub mod kmeans;
pub mod metrics;
pub mod parameters;
pub mod pixel_matrix;
pub mod quantizer;

pub use block::{BlockVector, Purpose};
pub use codebook::Codebook;
pub use kmeans::{TrainingState, TrainingSummary};
pub use metrics::QuantizationMetrics;
pub use parameters::{QuantizerParameters, TrainingParameters};
pub use pixel_matrix::PixelMatrix;
pub use quantizer::{quantize, train, QuantizedImage, VectorQuantizer};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodingError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Image size mismatch: expected {expected}x{expected}, got {actual}")]
    ImageSizeMismatch { expected: usize, actual: usize },
    #[error("Sample value {value} exceeds the intensity range 0..={max}")]
    IntensityOutOfRange { value: u64, max: u64 },
    #[error("Codebook mismatch: expected codewords of length {expected}, got {actual}")]
    CodebookMismatch { expected: usize, actual: usize },
    #[error("No training blocks were loaded")]
    EmptyTrainingSet,
    #[error("Codebook is not trained yet")]
    NotTrained,
    #[error("Encoding was stopped")]
    Stopped,
}
