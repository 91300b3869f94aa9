//! Non-interactive `classify`: define, load, train, and predict in one pass.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use fewshot_vision::{
    list_files, load_image, ExemplarMatcher, FeatureExtractor, Prediction, Session,
};

use crate::args::CategoryArg;
use crate::render::progress_bar;

/// One line of `classify` output.
#[derive(Debug, Serialize)]
pub struct ImageOutcome {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Train `session` from the category directories, then classify each image.
///
/// Per-image failures are reported in the outcome rather than aborting.
pub fn run_classify<E, M>(
    session: &mut Session<E, M>,
    categories: &[CategoryArg],
    images: &[PathBuf],
    show_progress: bool,
) -> anyhow::Result<Vec<ImageOutcome>>
where
    E: FeatureExtractor,
    M: ExemplarMatcher,
{
    session.define_categories(categories.iter().map(|c| c.spec.clone()).collect())?;

    for category in categories {
        let files = list_files(&category.dir)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", category.dir.display()))?;
        let report = session.add_examples_from_files(&category.spec.id, &files)?;
        for skipped in &report.skipped {
            eprintln!("  skipped {} ({})", skipped.path, skipped.reason);
        }
    }

    session.train(|p| {
        if show_progress {
            eprint!("\r  {}", progress_bar(p));
            let _ = std::io::stderr().flush();
        }
    })?;
    if show_progress {
        eprintln!();
    }

    Ok(images.iter().map(|path| classify_one(session, path)).collect())
}

fn classify_one<E, M>(session: &mut Session<E, M>, path: &Path) -> ImageOutcome
where
    E: FeatureExtractor,
    M: ExemplarMatcher,
{
    let result = load_image(path).and_then(|img| session.classify(img));
    let (prediction, error) = match result {
        Ok(p) => (Some(p), None),
        Err(e) => (None, Some(e.to_string())),
    };
    ImageOutcome {
        image: path.display().to_string(),
        prediction,
        error,
    }
}
