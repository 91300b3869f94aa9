//! Category definitions and their example images.

use std::collections::HashSet;

use image::DynamicImage;

use crate::config::MIN_CATEGORIES_FLOOR;
use crate::types::{
    Category, CategorySpec, ExampleImage, FewShotError, FewShotResult, ImageId, Readiness,
    Shortfall,
};

/// Owns every category and its examples, in definition order.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: Vec<Category>,
    next_image_id: u64,
    min_examples_per_category: usize,
    min_categories: usize,
}

impl CategoryRegistry {
    /// Create an empty registry with the given training floors.
    ///
    /// `min_categories` is raised to [`MIN_CATEGORIES_FLOOR`] if lower.
    pub fn new(min_examples_per_category: usize, min_categories: usize) -> Self {
        Self {
            categories: Vec::new(),
            next_image_id: 1,
            min_examples_per_category,
            min_categories: min_categories.max(MIN_CATEGORIES_FLOOR),
        }
    }

    /// Add categories in input order. Nothing is added if any id is empty,
    /// already defined, or repeated within `specs`.
    pub fn define_categories(&mut self, specs: Vec<CategorySpec>) -> FewShotResult<()> {
        {
            let mut incoming = HashSet::new();
            for spec in &specs {
                if spec.id.trim().is_empty() {
                    return Err(FewShotError::InvalidCategoryId(spec.id.clone()));
                }
                if self.contains(&spec.id) || !incoming.insert(spec.id.as_str()) {
                    return Err(FewShotError::DuplicateCategory(spec.id.clone()));
                }
            }
        }

        for spec in specs {
            tracing::debug!("Defined category {}", spec.id);
            self.categories.push(Category::from_spec(spec));
        }
        Ok(())
    }

    /// Remove a category and all of its examples.
    pub fn remove_category(&mut self, category_id: &str) -> FewShotResult<Category> {
        let pos = self
            .categories
            .iter()
            .position(|c| c.id == category_id)
            .ok_or_else(|| FewShotError::UnknownCategory(category_id.to_string()))?;
        Ok(self.categories.remove(pos))
    }

    /// Append an example and return its stable id.
    pub fn add_example(
        &mut self,
        category_id: &str,
        image: DynamicImage,
    ) -> FewShotResult<ImageId> {
        let id = ImageId(self.next_image_id);
        let category = self.get_mut(category_id)?;
        category.examples.push(ExampleImage { id, image });
        self.next_image_id += 1;
        Ok(id)
    }

    /// Remove an example by its stable id.
    pub fn remove_example(
        &mut self,
        category_id: &str,
        image_id: ImageId,
    ) -> FewShotResult<ExampleImage> {
        let category = self.get_mut(category_id)?;
        let pos = category
            .position_of(image_id)
            .ok_or_else(|| FewShotError::ExampleNotFound {
                category_id: category_id.to_string(),
                image_id,
            })?;
        Ok(category.examples.remove(pos))
    }

    /// Remove an example by position. Later examples shift down by one.
    pub fn remove_example_at(
        &mut self,
        category_id: &str,
        index: usize,
    ) -> FewShotResult<ExampleImage> {
        let category = self.get_mut(category_id)?;
        let len = category.examples.len();
        if index >= len {
            return Err(FewShotError::IndexOutOfRange {
                category_id: category_id.to_string(),
                index,
                len,
            });
        }
        Ok(category.examples.remove(index))
    }

    /// True iff enough categories exist and each has enough examples.
    pub fn is_ready_to_train(&self) -> bool {
        self.readiness().is_ready()
    }

    pub fn readiness(&self) -> Readiness {
        let shortfalls = self
            .categories
            .iter()
            .filter(|c| c.example_count() < self.min_examples_per_category)
            .map(|c| Shortfall {
                category_id: c.id.clone(),
                have: c.example_count(),
                need: self.min_examples_per_category,
            })
            .collect();

        Readiness {
            category_count: self.categories.len(),
            min_categories: self.min_categories,
            shortfalls,
        }
    }

    pub fn get(&self, category_id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == category_id)
    }

    fn get_mut(&mut self, category_id: &str) -> FewShotResult<&mut Category> {
        self.categories
            .iter_mut()
            .find(|c| c.id == category_id)
            .ok_or_else(|| FewShotError::UnknownCategory(category_id.to_string()))
    }

    pub fn contains(&self, category_id: &str) -> bool {
        self.get(category_id).is_some()
    }

    /// Categories in definition order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn total_examples(&self) -> usize {
        self.categories.iter().map(|c| c.example_count()).sum()
    }
}
