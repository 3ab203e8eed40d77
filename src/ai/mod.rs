//! External model collaborators: layout analysis and image generation

pub mod generation;
pub mod http_client;
pub mod layout;
pub mod vision;

pub use generation::{
    GeneratedImage, GenerationError, GenerationRequest, HttpGeneratorConfig, HttpImageGenerator,
    ImageGenerator,
};
pub use layout::{
    analyze_with_fallback, AnalyzerError, LayoutAnalyzer, LayoutConstraints, VisionAnalyzerConfig,
    VisionLayoutAnalyzer,
};
pub use vision::{decode_upload, DecodedImage, ImageError};
