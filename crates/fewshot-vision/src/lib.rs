//! Few-shot vision: define categories, train a nearest-neighbor classifier
//! from a handful of examples, and correct it on the fly.

pub mod capture;
pub mod config;
pub mod embedding;
pub mod knn;
pub mod registry;
pub mod session;
pub mod similarity;
pub mod templates;
pub mod training;
pub mod types;

pub use capture::{is_supported_format, list_files, load_image};
pub use config::SessionConfig;
pub use embedding::{EmbeddingEngine, FeatureExtractor, EMBEDDING_DIM, FALLBACK_DIM};
pub use knn::{ExemplarMatcher, KnnClassifier};
pub use registry::CategoryRegistry;
pub use session::Session;
pub use similarity::cosine_similarity;
pub use templates::{builtin_templates, find_template, CategoryTemplate};
pub use types::*;
