//! Bulk conversion of registry examples into matcher exemplars.

use std::time::Instant;

use crate::embedding::FeatureExtractor;
use crate::knn::ExemplarMatcher;
use crate::registry::CategoryRegistry;
use crate::types::{ComponentError, FewShotError, FewShotResult, TrainingProgress, TrainingSummary};

/// Embed every example and register it with the matcher.
///
/// Categories are visited in registry order and examples in upload order, one
/// image at a time, with `on_progress` called after each image. The first
/// failure aborts the run; exemplars added before it stay in the matcher.
pub fn run_training<E, M, F>(
    registry: &CategoryRegistry,
    extractor: &mut E,
    matcher: &mut M,
    mut on_progress: F,
) -> FewShotResult<TrainingSummary>
where
    E: FeatureExtractor + ?Sized,
    M: ExemplarMatcher + ?Sized,
    F: FnMut(&TrainingProgress),
{
    let started = Instant::now();
    let total = registry.total_examples();
    let mut processed = 0usize;

    tracing::info!(
        "Training on {total} examples across {} categories",
        registry.len()
    );

    for category in registry.categories() {
        for example in &category.examples {
            let fail = |source: ComponentError| FewShotError::TrainingFailed {
                category_id: category.id.clone(),
                image_id: example.id,
                source,
            };

            let vector = extractor
                .extract(&example.image)
                .map_err(|e| fail(e.into()))?;
            matcher
                .add_exemplar(vector, &category.id)
                .map_err(|e| fail(e.into()))?;

            processed += 1;
            tracing::debug!("Embedded {} {} ({processed}/{total})", category.id, example.id);
            on_progress(&TrainingProgress {
                processed,
                total,
                category_id: category.id.clone(),
            });
        }
    }

    let summary = TrainingSummary {
        exemplars_added: processed,
        categories: registry.len(),
        elapsed: started.elapsed(),
    };
    tracing::info!(
        "Training complete: {} exemplars in {:?}",
        summary.exemplars_added,
        summary.elapsed
    );
    Ok(summary)
}
