//! Core data types for categories, exemplars, predictions, and errors.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Stable identity of an example image, issued by the registry at add time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Definition of a category before it holds any examples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub id: String,
    pub display_name: String,
    /// Decorative symbol shown next to the name.
    #[serde(default)]
    pub emblem: String,
}

impl CategorySpec {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        emblem: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            emblem: emblem.into(),
        }
    }
}

/// An image assigned to a category.
#[derive(Debug, Clone)]
pub struct ExampleImage {
    pub id: ImageId,
    pub image: DynamicImage,
}

/// A user-defined class with its ordered example images.
#[derive(Debug, Clone)]
pub struct Category {
    pub id: String,
    pub display_name: String,
    pub emblem: String,
    pub examples: Vec<ExampleImage>,
}

impl Category {
    pub fn from_spec(spec: CategorySpec) -> Self {
        Self {
            id: spec.id,
            display_name: spec.display_name,
            emblem: spec.emblem,
            examples: Vec::new(),
        }
    }

    /// Number of example images.
    pub fn example_count(&self) -> usize {
        self.examples.len()
    }

    /// Position of an example in upload order.
    pub fn position_of(&self, image_id: ImageId) -> Option<usize> {
        self.examples.iter().position(|e| e.id == image_id)
    }
}

/// Fixed-length embedding of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Build an L2-normalized vector. Zero vectors are kept as-is.
    pub fn normalized(values: Vec<f32>) -> Self {
        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            Self(values.iter().map(|x| x / norm).collect())
        } else {
            Self(values)
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Majority label among the nearest exemplars, with per-label vote fractions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborVote {
    pub label: String,
    pub confidences: BTreeMap<String, f32>,
}

impl NeighborVote {
    /// Vote fraction of the winning label.
    pub fn confidence(&self) -> f32 {
        self.confidences.get(&self.label).copied().unwrap_or(0.0)
    }
}

/// Outcome of classifying one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// `None` when the winning label no longer names a category.
    pub predicted_category_id: Option<String>,
    pub confidence: f32,
    pub confidences: BTreeMap<String, f32>,
}

impl Prediction {
    pub fn is_unknown(&self) -> bool {
        self.predicted_category_id.is_none()
    }
}

/// Lifecycle of the classifier within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    Untrained,
    Training,
    Trained,
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrainingState::Untrained => "untrained",
            TrainingState::Training => "training",
            TrainingState::Trained => "trained",
        };
        f.write_str(s)
    }
}

/// Progress update emitted once per processed training image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingProgress {
    pub processed: usize,
    pub total: usize,
    pub category_id: String,
}

impl TrainingProgress {
    /// Completed share in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        self.processed as f32 / self.total as f32
    }

    /// Completed share in `[0, 100]`.
    pub fn percent(&self) -> f32 {
        self.fraction() * 100.0
    }
}

/// Result of a successful training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub exemplars_added: usize,
    pub categories: usize,
    pub elapsed: Duration,
}

/// Result of committing a correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub category_id: String,
    pub image_id: ImageId,
    pub exemplars_added: usize,
}

/// A category that has fewer examples than training requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub category_id: String,
    pub have: usize,
    pub need: usize,
}

/// Why the registry is or is not ready to train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub category_count: usize,
    pub min_categories: usize,
    pub shortfalls: Vec<Shortfall>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.category_count >= self.min_categories && self.shortfalls.is_empty()
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ready() {
            return f.write_str("ready to train");
        }
        let mut reasons = Vec::new();
        if self.category_count < self.min_categories {
            reasons.push(format!(
                "need at least {} categories (have {})",
                self.min_categories, self.category_count
            ));
        }
        for s in &self.shortfalls {
            reasons.push(format!("{} has {} of {} examples", s.category_id, s.have, s.need));
        }
        f.write_str(&reasons.join("; "))
    }
}

/// A file skipped during a bulk upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Outcome of adding many example files at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkAddReport {
    pub added: Vec<ImageId>,
    pub skipped: Vec<SkippedFile>,
}

/// Failure of the embedding extractor.
#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Extractor produced an empty feature vector")]
    EmptyOutput,
}

/// Failure of the exemplar matcher.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatcherError {
    #[error("No exemplars have been added")]
    Empty,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Neighbor count must be at least 1")]
    InvalidK,

    #[error("Query vector has zero magnitude")]
    ZeroQuery,
}

/// Failure of either external collaborator.
#[derive(thiserror::Error, Debug)]
pub enum ComponentError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Matcher(#[from] MatcherError),
}

/// Errors returned by session operations.
#[derive(thiserror::Error, Debug)]
pub enum FewShotError {
    #[error("Duplicate category: {0}")]
    DuplicateCategory(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Invalid category id: {0:?}")]
    InvalidCategoryId(String),

    #[error("Index {index} out of range for category {category_id} ({len} examples)")]
    IndexOutOfRange {
        category_id: String,
        index: usize,
        len: usize,
    },

    #[error("Example {image_id} not found in category {category_id}")]
    ExampleNotFound { category_id: String, image_id: ImageId },

    #[error("Not ready to train: {0}")]
    NotReady(String),

    #[error("Classifier has not been trained")]
    NotTrained,

    #[error("Classifier is already trained; reset the session to train again")]
    AlreadyTrained,

    #[error("No classified image is pending feedback")]
    NoPendingTest,

    #[error("Training failed on {category_id} {image_id}: {source}")]
    TrainingFailed {
        category_id: String,
        image_id: ImageId,
        #[source]
        source: ComponentError,
    },

    #[error("Classification failed: {0}")]
    ClassificationFailed(#[source] ComponentError),

    #[error("Correction failed: {0}")]
    CorrectionFailed(#[source] MatcherError),

    #[error("Embedding engine unavailable: {0}")]
    EngineUnavailable(#[source] ExtractionError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type FewShotResult<T> = Result<T, FewShotError>;
