//! Category to container mapping.
//!
//! A mapping is computed once per run. When a checkpoint already holds a
//! mapping, its entries win and only newly discovered categories are mapped,
//! avoiding every container name already in use.

use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

use crate::config::MappingSettings;

/// Category name -> container name.
pub type CategoryMapping = BTreeMap<String, String>;

/// Builds total, collision-free mappings from [`MappingSettings`].
#[derive(Debug, Clone)]
pub struct CategoryMapper {
    settings: MappingSettings,
}

impl CategoryMapper {
    /// Creates a mapper. Settings are expected to be validated already.
    #[must_use]
    pub fn new(settings: MappingSettings) -> Self {
        Self { settings }
    }

    /// Whether `category` is excluded from transfer.
    #[must_use]
    pub fn is_excluded(&self, category: &str) -> bool {
        self.settings.exclude.iter().any(|e| e == category)
    }

    /// Configured container for `category`, if any.
    #[must_use]
    pub fn override_for(&self, category: &str) -> Option<&str> {
        self.settings.overrides.get(category).map(String::as_str)
    }

    /// Drops excluded categories, keeping the source order.
    #[must_use]
    pub fn filter_excluded(&self, categories: Vec<String>) -> Vec<String> {
        let (kept, excluded): (Vec<_>, Vec<_>) =
            categories.into_iter().partition(|c| !self.is_excluded(c));
        if !excluded.is_empty() {
            info!("Excluding {} categories: {:?}", excluded.len(), excluded);
        }
        kept
    }

    /// Maps every name in `categories` from scratch.
    #[must_use]
    pub fn map(&self, categories: &[String]) -> CategoryMapping {
        self.extend(&CategoryMapping::new(), categories)
    }

    /// Keeps `existing` unchanged and maps the names it does not cover yet.
    ///
    /// Containers are reserved in this order: existing entries, configured
    /// overrides, then default names in first-seen order.
    #[must_use]
    pub fn extend(&self, existing: &CategoryMapping, categories: &[String]) -> CategoryMapping {
        let mut mapping = existing.clone();
        let mut taken: HashSet<String> = mapping.values().map(|c| self.key(c)).collect();

        let fresh: Vec<&String> = {
            let mut seen = HashSet::new();
            categories
                .iter()
                .filter(|c| !mapping.contains_key(*c) && seen.insert(c.as_str()))
                .collect()
        };

        for category in &fresh {
            if let Some(configured) = self.settings.overrides.get(*category) {
                let container = self.unique(configured.clone(), &taken);
                if &container != configured {
                    warn!(
                        "Override '{}' -> '{}' collides with a recorded container, using '{}'",
                        category, configured, container
                    );
                }
                taken.insert(self.key(&container));
                debug!("Category '{}' -> '{}' (configured)", category, container);
                mapping.insert((*category).clone(), container);
            }
        }

        for category in fresh {
            if mapping.contains_key(category) {
                continue;
            }
            let container = self.unique(self.sanitize(category), &taken);
            taken.insert(self.key(&container));
            debug!("Category '{}' -> '{}' (default)", category, container);
            mapping.insert(category.clone(), container);
        }

        mapping
    }

    /// Default container name for a category, before collision handling.
    #[must_use]
    pub fn sanitize(&self, category: &str) -> String {
        let stripped = self
            .settings
            .strip_prefixes
            .iter()
            .find_map(|p| category.strip_prefix(p.as_str()))
            .unwrap_or(category);

        let cleaned: String = stripped
            .chars()
            .map(|c| {
                if self.settings.is_illegal(c) {
                    self.settings.substitute
                } else {
                    c
                }
            })
            .collect();

        // Empty and dot-only names are not usable as containers
        let trimmed = cleaned.trim();
        if trimmed.chars().all(|c| c == '.') {
            self.settings.substitute.to_string()
        } else {
            trimmed.to_string()
        }
    }

    fn unique(&self, base: String, taken: &HashSet<String>) -> String {
        if !taken.contains(&self.key(&base)) {
            return base;
        }
        let mut n = 2u64;
        loop {
            let candidate = format!("{}{}{}", base, self.settings.substitute, n);
            if !taken.contains(&self.key(&candidate)) {
                return candidate;
            }
            n += 1;
        }
    }

    fn key(&self, container: &str) -> String {
        if self.settings.case_insensitive {
            container.to_lowercase()
        } else {
            container.to_string()
        }
    }
}

#[cfg(test)]
#[path = "mapping_tests.rs"]
mod tests;
