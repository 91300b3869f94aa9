//! Built-in category sets for starting a session quickly.

use serde::Serialize;

use crate::types::CategorySpec;

/// A named list of categories.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CategoryTemplate {
    pub name: &'static str,
    pub description: &'static str,
    /// `(id, display name, emblem)`
    pub categories: &'static [(&'static str, &'static str, &'static str)],
}

impl CategoryTemplate {
    pub fn specs(&self) -> Vec<CategorySpec> {
        self.categories
            .iter()
            .map(|(id, name, emblem)| CategorySpec::new(*id, *name, *emblem))
            .collect()
    }
}

const TEMPLATES: &[CategoryTemplate] = &[
    CategoryTemplate {
        name: "happy-sad",
        description: "Facial expressions: happy vs. sad",
        categories: &[("happy", "Happy", "😊"), ("sad", "Sad", "😢")],
    },
    CategoryTemplate {
        name: "cat-dog",
        description: "Pets: cats vs. dogs",
        categories: &[("cat", "Cat", "🐱"), ("dog", "Dog", "🐶")],
    },
    CategoryTemplate {
        name: "rock-paper-scissors",
        description: "Hand gestures for rock, paper, scissors",
        categories: &[
            ("rock", "Rock", "✊"),
            ("paper", "Paper", "✋"),
            ("scissors", "Scissors", "✌️"),
        ],
    },
];

pub fn builtin_templates() -> &'static [CategoryTemplate] {
    TEMPLATES
}

/// Look up a built-in template by name (case-insensitive).
pub fn find_template(name: &str) -> Option<&'static CategoryTemplate> {
    TEMPLATES.iter().find(|t| t.name.eq_ignore_ascii_case(name))
}
