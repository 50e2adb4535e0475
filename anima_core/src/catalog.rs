//! Built-in breath pattern catalog.

use crate::types::BreathPattern;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Ordered collection of breath patterns
#[derive(Clone, Debug)]
pub struct Catalog {
    pub patterns: Vec<BreathPattern>,
}

impl Catalog {
    pub fn get(&self, id: &str) -> Option<&BreathPattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    /// Ids must be unique and every pattern must be able to run
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for pattern in &self.patterns {
            if !seen.insert(pattern.id.as_str()) {
                return Err(Error::Catalog(format!(
                    "duplicate pattern id: {}",
                    pattern.id
                )));
            }
            pattern
                .validate()
                .map_err(|e| Error::Catalog(e.to_string()))?;
        }
        Ok(())
    }
}

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the default catalog with the built-in patterns
///
/// Prefer `get_default_catalog()`; this is retained for tests and for
/// building customised catalogs.
pub fn build_default_catalog() -> Catalog {
    Catalog {
        patterns: vec![
            BreathPattern {
                id: "box".into(),
                name: "Box Breathing".into(),
                description: "A grounding 4-4-4-4 pattern for balance".into(),
                pattern: [4, 4, 4, 4],
                cycles: 8,
                instructions: "Inhale for 4, hold for 4, exhale for 4, hold for 4".into(),
            },
            BreathPattern {
                id: "4-7-8".into(),
                name: "4-7-8 Breath".into(),
                description: "A calming pattern for deep relaxation".into(),
                pattern: [4, 7, 8, 0],
                cycles: 6,
                instructions: "Inhale for 4, hold for 7, exhale for 8".into(),
            },
            BreathPattern {
                id: "alternate-nostril".into(),
                name: "Alternate Nostril".into(),
                description: "A balancing pranayama technique".into(),
                pattern: [4, 2, 4, 2],
                cycles: 10,
                instructions: "Breathe through one nostril, then switch".into(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = get_default_catalog();
        assert_eq!(catalog.patterns.len(), 3);
        catalog.validate().unwrap();
    }

    #[test]
    fn test_lookup_by_id() {
        let catalog = get_default_catalog();
        let pattern = catalog.get("4-7-8").unwrap();
        assert_eq!(pattern.pattern, [4, 7, 8, 0]);
        assert_eq!(pattern.cycles, 6);
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut catalog = build_default_catalog();
        let copy = catalog.patterns[0].clone();
        catalog.patterns.push(copy);
        assert!(matches!(catalog.validate(), Err(Error::Catalog(_))));
    }

    #[test]
    fn test_unrunnable_pattern_rejected() {
        let mut catalog = build_default_catalog();
        catalog.patterns[1].cycles = 0;
        assert!(matches!(catalog.validate(), Err(Error::Catalog(_))));
    }
}
