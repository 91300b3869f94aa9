//! Image embedding: the extractor seam and its CLIP-backed implementation.

use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use crate::types::{ExtractionError, FeatureVector};

/// Embedding dimension for CLIP ViT-B/32.
pub const EMBEDDING_DIM: usize = 512;

/// Side length of the thumbnail used by the fallback descriptor.
const FALLBACK_GRID: u32 = 8;

/// Embedding dimension of the fallback descriptor (RGB per grid cell).
pub const FALLBACK_DIM: usize = (FALLBACK_GRID * FALLBACK_GRID * 3) as usize;

/// Default model directory.
const MODEL_DIR: &str = ".fewshot-vision/models";

/// Default model filename.
const MODEL_FILENAME: &str = "clip-vit-base-patch32-visual.onnx";

/// Images are resized to this square before embedding.
pub const INPUT_SIZE: u32 = 224;
#[allow(clippy::excessive_precision)]
const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
#[allow(clippy::excessive_precision)]
const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

/// Maps an image to a fixed-length feature vector.
///
/// Implementations must be deterministic for a given image.
pub trait FeatureExtractor {
    fn extract(&mut self, image: &DynamicImage) -> Result<FeatureVector, ExtractionError>;

    /// Length of every vector this extractor returns.
    fn dimension(&self) -> usize;
}

/// Generates CLIP image embeddings, or pixel descriptors when no model is available.
pub struct EmbeddingEngine {
    session: Option<Session>,
}

impl EmbeddingEngine {
    /// Create a new embedding engine.
    ///
    /// If `model_path` is provided, loads the model from that path.
    /// Otherwise, looks in `~/.fewshot-vision/models/`.
    /// If no model is found, the engine runs in fallback mode and embeds a
    /// downsampled thumbnail of the image instead.
    pub fn new(model_path: Option<&str>) -> Result<Self, ExtractionError> {
        let path = if let Some(p) = model_path {
            std::path::PathBuf::from(p)
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            std::path::PathBuf::from(home)
                .join(MODEL_DIR)
                .join(MODEL_FILENAME)
        };

        if !path.exists() {
            tracing::warn!(
                "CLIP model not found at {}. Running in fallback mode (pixel descriptors). \
                 Download a CLIP ONNX model for semantic features.",
                path.display()
            );
            return Ok(Self::fallback());
        }

        tracing::info!("Loading CLIP model from {}", path.display());

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(&path))
            .map_err(|e| ExtractionError::Model(format!("Failed to load ONNX model: {e}")))?;

        tracing::info!("CLIP model loaded successfully");
        Ok(Self {
            session: Some(session),
        })
    }

    /// Engine that never loads a model.
    pub fn fallback() -> Self {
        Self { session: None }
    }

    /// Check if the engine has a loaded model.
    pub fn has_model(&self) -> bool {
        self.session.is_some()
    }

    fn embed_clip(session: &mut Session, img: &DynamicImage) -> Result<Vec<f32>, ExtractionError> {
        let resized =
            img.resize_exact(INPUT_SIZE, INPUT_SIZE, image::imageops::FilterType::Lanczos3);
        let rgb = resized.to_rgb8();

        // NCHW [1, 3, 224, 224]
        let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize));

        for y in 0..INPUT_SIZE {
            for x in 0..INPUT_SIZE {
                let pixel = rgb.get_pixel(x, y);
                for c in 0..3usize {
                    let val = pixel[c] as f32 / 255.0;
                    tensor[[0, c, y as usize, x as usize]] = (val - CLIP_MEAN[c]) / CLIP_STD[c];
                }
            }
        }

        let input_tensor = Tensor::from_array(tensor)
            .map_err(|e| ExtractionError::Model(format!("Failed to create input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ExtractionError::Model(format!("ONNX inference failed: {e}")))?;

        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ExtractionError::Model(format!("Failed to extract output: {e}")))?;

        Ok(data.to_vec())
    }
}

impl FeatureExtractor for EmbeddingEngine {
    fn extract(&mut self, image: &DynamicImage) -> Result<FeatureVector, ExtractionError> {
        let raw = match &mut self.session {
            Some(session) => Self::embed_clip(session, image)?,
            None => pixel_descriptor(image),
        };

        if raw.is_empty() {
            return Err(ExtractionError::EmptyOutput);
        }

        Ok(FeatureVector::normalized(raw))
    }

    fn dimension(&self) -> usize {
        if self.has_model() {
            EMBEDDING_DIM
        } else {
            FALLBACK_DIM
        }
    }
}

/// Colors of an 8x8 thumbnail, scaled to `[0, 1]`.
///
/// Crude, but deterministic and enough to separate visually distinct inputs.
pub fn pixel_descriptor(img: &DynamicImage) -> Vec<f32> {
    let thumb = img
        .resize_exact(FALLBACK_GRID, FALLBACK_GRID, image::imageops::FilterType::Triangle)
        .to_rgb8();

    thumb
        .pixels()
        .flat_map(|p| p.0)
        .map(|v| v as f32 / 255.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([r, g, b])))
    }

    #[test]
    fn test_fallback_mode() {
        let mut engine = EmbeddingEngine::new(Some("/nonexistent/model.onnx")).unwrap();
        assert!(!engine.has_model());
        assert_eq!(engine.dimension(), FALLBACK_DIM);

        let v = engine.extract(&solid(200, 10, 10)).unwrap();
        assert_eq!(v.len(), FALLBACK_DIM);
        let norm: f32 = v.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let mut engine = EmbeddingEngine::fallback();
        let img = solid(10, 120, 240);
        assert_eq!(engine.extract(&img).unwrap(), engine.extract(&img).unwrap());
    }

    #[test]
    fn test_fallback_separates_colors() {
        let mut engine = EmbeddingEngine::fallback();
        let red = engine.extract(&solid(255, 0, 0)).unwrap();
        let blue = engine.extract(&solid(0, 0, 255)).unwrap();
        let sim = crate::similarity::cosine_similarity(red.as_slice(), blue.as_slice());
        assert!(sim.abs() < 1e-4);
    }

    #[test]
    fn test_black_image_yields_zero_vector() {
        let mut engine = EmbeddingEngine::fallback();
        let v = engine.extract(&solid(0, 0, 0)).unwrap();
        assert!(v.as_slice().iter().all(|&x| x == 0.0));
    }
}
