//! Text rendering of session state for the terminal.

use fewshot_vision::{Category, CategoryRegistry, Prediction, TrainingProgress};

const BAR_WIDTH: usize = 24;

/// `[##########--------------]  42%  (5/12, cat)`
pub fn progress_bar(progress: &TrainingProgress) -> String {
    let filled = ((progress.fraction() * BAR_WIDTH as f32).round() as usize).min(BAR_WIDTH);
    format!(
        "[{}{}] {:>3.0}%  ({}/{}, {})",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        progress.percent(),
        progress.processed,
        progress.total,
        progress.category_id
    )
}

/// Emblem and display name, or the bare id for categories without an emblem.
pub fn category_label(category: &Category) -> String {
    if category.emblem.is_empty() {
        category.display_name.clone()
    } else {
        format!("{} {}", category.emblem, category.display_name)
    }
}

/// One-line summary of a prediction.
pub fn prediction_line(prediction: &Prediction, registry: &CategoryRegistry) -> String {
    let label = match prediction
        .predicted_category_id
        .as_deref()
        .and_then(|id| registry.get(id))
    {
        Some(category) => category_label(category),
        None => "❓ Unknown".to_string(),
    };
    format!("{label}  ({:.1}% confidence)", prediction.confidence * 100.0)
}

/// Category heading plus its example ids.
pub fn category_listing(category: &Category) -> String {
    let ids: Vec<String> = category.examples.iter().map(|e| e.id.to_string()).collect();
    format!(
        "{:<20} [{}] {} example(s): {}",
        category_label(category),
        category.id,
        category.example_count(),
        if ids.is_empty() { "-".to_string() } else { ids.join(" ") }
    )
}
