//! The classification session: registry, exemplars, training state, and the
//! feedback loop around the most recent prediction.
//!
//! A session moves `Untrained -> Training -> Trained` and stays trained until
//! [`Session::reset`]. After training, new exemplars only enter through
//! [`Session::correct`], which accretes onto the matcher without retraining.

use std::path::Path;

use image::DynamicImage;

use crate::capture::{is_supported_format, load_image};
use crate::config::SessionConfig;
use crate::embedding::{EmbeddingEngine, FeatureExtractor};
use crate::knn::{ExemplarMatcher, KnnClassifier};
use crate::registry::CategoryRegistry;
use crate::templates::CategoryTemplate;
use crate::training::run_training;
use crate::types::{
    BulkAddReport, Category, CategorySpec, Correction, ExampleImage, FeatureVector, FewShotError,
    FewShotResult, ImageId, Prediction, Readiness, SkippedFile, TrainingProgress, TrainingState,
    TrainingSummary,
};

/// The last classified image, held until it is corrected or replaced.
struct PendingTest {
    image: DynamicImage,
    vector: FeatureVector,
    prediction: Prediction,
}

/// A few-shot classification session.
pub struct Session<E = EmbeddingEngine, M = KnnClassifier> {
    config: SessionConfig,
    registry: CategoryRegistry,
    extractor: E,
    matcher: M,
    state: TrainingState,
    pending: Option<PendingTest>,
}

impl Session<EmbeddingEngine, KnnClassifier> {
    /// Session backed by the CLIP engine (or its fallback) and a kNN matcher.
    pub fn open(config: SessionConfig) -> FewShotResult<Self> {
        let model_path = config
            .model_path
            .as_ref()
            .map(|p| p.display().to_string());
        let engine =
            EmbeddingEngine::new(model_path.as_deref()).map_err(FewShotError::EngineUnavailable)?;
        Self::new(engine, KnnClassifier::new(), config)
    }
}

impl<E, M> Session<E, M>
where
    E: FeatureExtractor,
    M: ExemplarMatcher,
{
    /// Empty, untrained session.
    pub fn new(extractor: E, mut matcher: M, config: SessionConfig) -> FewShotResult<Self> {
        config.validate()?;
        matcher.clear();
        let registry =
            CategoryRegistry::new(config.min_examples_per_category, config.min_categories);

        tracing::info!(
            "Session created (k={}, correction weight={}, feature dim={})",
            config.neighbors,
            config.correction_weight,
            extractor.dimension()
        );

        Ok(Self {
            config,
            registry,
            extractor,
            matcher,
            state: TrainingState::Untrained,
            pending: None,
        })
    }

    /// Untrained session pre-populated with a template's categories.
    pub fn with_template(
        extractor: E,
        matcher: M,
        config: SessionConfig,
        template: &CategoryTemplate,
    ) -> FewShotResult<Self> {
        let mut session = Self::new(extractor, matcher, config)?;
        session.define_categories(template.specs())?;
        tracing::info!("Session initialized from template {}", template.name);
        Ok(session)
    }

    /// Drop every category, exemplar, and pending test; back to `Untrained`.
    pub fn reset(&mut self) {
        self.registry = CategoryRegistry::new(
            self.config.min_examples_per_category,
            self.config.min_categories,
        );
        self.matcher.clear();
        self.state = TrainingState::Untrained;
        self.pending = None;
        tracing::info!("Session reset");
    }

    /// Reset, then define the template's categories.
    pub fn reset_with_template(&mut self, template: &CategoryTemplate) -> FewShotResult<()> {
        self.reset();
        self.define_categories(template.specs())?;
        tracing::info!("Session initialized from template {}", template.name);
        Ok(())
    }

    pub fn define_categories(&mut self, specs: Vec<CategorySpec>) -> FewShotResult<()> {
        self.registry.define_categories(specs)
    }

    /// Remove a category and its examples.
    ///
    /// Its exemplars stay in the matcher; predictions that land on them are
    /// reported as unknown.
    pub fn remove_category(&mut self, category_id: &str) -> FewShotResult<Category> {
        let removed = self.registry.remove_category(category_id)?;
        let orphaned = self.matcher.exemplar_count_for(category_id);
        tracing::info!(
            "Removed category {category_id} ({} examples, {orphaned} orphaned exemplars)",
            removed.example_count()
        );
        Ok(removed)
    }

    pub fn add_example(
        &mut self,
        category_id: &str,
        image: DynamicImage,
    ) -> FewShotResult<ImageId> {
        let id = self.registry.add_example(category_id, image)?;
        tracing::debug!("Added example {id} to {category_id}");
        Ok(id)
    }

    /// Load and add many files. Files that are not images, or fail to decode,
    /// are skipped and reported instead of aborting the batch.
    pub fn add_examples_from_files<I, P>(
        &mut self,
        category_id: &str,
        paths: I,
    ) -> FewShotResult<BulkAddReport>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        if !self.registry.contains(category_id) {
            return Err(FewShotError::UnknownCategory(category_id.to_string()));
        }

        let mut report = BulkAddReport::default();
        for path in paths {
            let path = path.as_ref();
            if !is_supported_format(path) {
                tracing::warn!("Skipping {}: not an image file", path.display());
                report.skipped.push(SkippedFile {
                    path: path.display().to_string(),
                    reason: "not an image file".to_string(),
                });
                continue;
            }

            match load_image(path) {
                Ok(image) => report.added.push(self.registry.add_example(category_id, image)?),
                Err(e) => {
                    tracing::warn!("Skipping {}: {e}", path.display());
                    report.skipped.push(SkippedFile {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Added {} examples to {category_id} ({} skipped)",
            report.added.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    pub fn remove_example(
        &mut self,
        category_id: &str,
        image_id: ImageId,
    ) -> FewShotResult<ExampleImage> {
        self.registry.remove_example(category_id, image_id)
    }

    /// Positional removal. Indices of later examples shift down by one.
    pub fn remove_example_at(
        &mut self,
        category_id: &str,
        index: usize,
    ) -> FewShotResult<ExampleImage> {
        self.registry.remove_example_at(category_id, index)
    }

    pub fn is_ready_to_train(&self) -> bool {
        self.registry.is_ready_to_train()
    }

    pub fn readiness(&self) -> Readiness {
        self.registry.readiness()
    }

    /// Embed every example and build the exemplar set.
    ///
    /// `on_progress` is called once per image. On failure the session returns
    /// to `Untrained`; exemplars added before the failing image are kept.
    pub fn train<F>(&mut self, on_progress: F) -> FewShotResult<TrainingSummary>
    where
        F: FnMut(&TrainingProgress),
    {
        match self.state {
            TrainingState::Trained => return Err(FewShotError::AlreadyTrained),
            TrainingState::Training => {
                return Err(FewShotError::NotReady("training already in progress".into()))
            }
            TrainingState::Untrained => {}
        }

        let readiness = self.registry.readiness();
        if !readiness.is_ready() {
            return Err(FewShotError::NotReady(readiness.to_string()));
        }

        self.state = TrainingState::Training;
        match run_training(&self.registry, &mut self.extractor, &mut self.matcher, on_progress) {
            Ok(summary) => {
                self.state = TrainingState::Trained;
                Ok(summary)
            }
            Err(e) => {
                self.state = TrainingState::Untrained;
                tracing::error!("Training aborted: {e}");
                Err(e)
            }
        }
    }

    /// Predict the category of `image` and hold it for feedback.
    ///
    /// Replaces any previously pending test image.
    pub fn classify(&mut self, image: DynamicImage) -> FewShotResult<Prediction> {
        if self.state != TrainingState::Trained {
            return Err(FewShotError::NotTrained);
        }

        self.pending = None;

        let vector = self
            .extractor
            .extract(&image)
            .map_err(|e| FewShotError::ClassificationFailed(e.into()))?;
        let vote = self
            .matcher
            .query(&vector, self.config.neighbors)
            .map_err(|e| FewShotError::ClassificationFailed(e.into()))?;

        let confidence = vote.confidence();
        let predicted_category_id = if self.registry.contains(&vote.label) {
            Some(vote.label)
        } else {
            tracing::warn!("Nearest exemplars belong to removed category {}", vote.label);
            None
        };

        let prediction = Prediction {
            predicted_category_id,
            confidence,
            confidences: vote.confidences,
        };
        tracing::debug!(
            "Classified as {:?} ({:.1}%)",
            prediction.predicted_category_id,
            prediction.confidence * 100.0
        );

        self.pending = Some(PendingTest {
            image,
            vector,
            prediction: prediction.clone(),
        });
        Ok(prediction)
    }

    /// Accept the pending prediction. Mutates nothing.
    pub fn affirm(&self) -> Option<&Prediction> {
        let prediction = self.pending_prediction();
        if let Some(p) = prediction {
            tracing::info!("Prediction {:?} affirmed", p.predicted_category_id);
        }
        prediction
    }

    /// Teach the matcher that the pending image belongs to `true_category_id`.
    ///
    /// Adds the pending vector `correction_weight` times and appends the image
    /// to the category's examples, then clears the pending slot. A vector the
    /// matcher would reject leaves the session untouched.
    pub fn correct(&mut self, true_category_id: &str) -> FewShotResult<Correction> {
        if !self.registry.contains(true_category_id) {
            return Err(FewShotError::UnknownCategory(true_category_id.to_string()));
        }
        let pending = self.pending.take().ok_or(FewShotError::NoPendingTest)?;

        if let Err(e) = self.matcher.check_exemplar(&pending.vector) {
            self.pending = Some(pending);
            return Err(FewShotError::CorrectionFailed(e));
        }
        for _ in 0..self.config.correction_weight {
            if let Err(e) = self.matcher.add_exemplar(pending.vector.clone(), true_category_id) {
                self.pending = Some(pending);
                return Err(FewShotError::CorrectionFailed(e));
            }
        }

        let image_id = self.registry.add_example(true_category_id, pending.image)?;
        tracing::info!(
            "Corrected {:?} -> {true_category_id}; added {} exemplars and example {image_id}",
            pending.prediction.predicted_category_id,
            self.config.correction_weight
        );

        Ok(Correction {
            category_id: true_category_id.to_string(),
            image_id,
            exemplars_added: self.config.correction_weight,
        })
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn is_trained(&self) -> bool {
        self.state == TrainingState::Trained
    }

    /// Prediction awaiting feedback, if any.
    pub fn pending_prediction(&self) -> Option<&Prediction> {
        self.pending.as_ref().map(|p| &p.prediction)
    }

    pub fn has_pending_test(&self) -> bool {
        self.pending.is_some()
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
