//! Key templates and the template catalog.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, TemplateName};

/// An algorithm plus its parameters, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyTemplate {
    /// Unique template name.
    pub name: TemplateName,
    /// Key type the template instantiates (e.g. `AesSivKey`).
    pub key_type: String,
    /// Key size in bytes.
    pub key_size: u32,
}

impl KeyTemplate {
    /// Create a template.
    pub fn new(name: impl Into<TemplateName>, key_type: impl Into<String>, key_size: u32) -> Self {
        Self { name: name.into(), key_type: key_type.into(), key_size }
    }

    /// AES-SIV with a 512-bit key (two AES-256 keys).
    #[must_use]
    pub fn aes256_siv() -> Self {
        Self::new("AES256_SIV", "AesSivKey", 64)
    }
}

/// Ordered set of known templates. Names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TemplateCatalog {
    templates: Vec<KeyTemplate>,
}

impl TemplateCatalog {
    /// Build a catalog, rejecting duplicate names.
    pub fn new(templates: impl IntoIterator<Item = KeyTemplate>) -> Result<Self, ConfigError> {
        let mut catalog = Self::default();
        for template in templates {
            if catalog.get(&template.name).is_some() {
                return Err(ConfigError::DuplicateTemplate(template.name));
            }
            catalog.templates.push(template);
        }
        Ok(catalog)
    }

    /// Deterministic AEAD templates every conforming backend is expected to
    /// know about.
    #[must_use]
    pub fn standard() -> Self {
        Self { templates: vec![KeyTemplate::aes256_siv()] }
    }

    /// Look up a template by name.
    #[must_use]
    pub fn get(&self, name: &TemplateName) -> Option<&KeyTemplate> {
        self.templates.iter().find(|t| &t.name == name)
    }

    /// Templates in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyTemplate> {
        self.templates.iter()
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_rejected() {
        let result = TemplateCatalog::new([KeyTemplate::aes256_siv(), KeyTemplate::aes256_siv()]);
        assert_eq!(result, Err(ConfigError::DuplicateTemplate("AES256_SIV".into())));
    }

    #[test]
    fn lookup_preserves_order() {
        let catalog = TemplateCatalog::new([
            KeyTemplate::new("B", "BKey", 32),
            KeyTemplate::new("A", "AKey", 16),
        ])
        .unwrap();

        let names: Vec<_> = catalog.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["B", "A"]);
        assert_eq!(catalog.get(&"A".into()).map(|t| t.key_size), Some(16));
        assert!(catalog.get(&"C".into()).is_none());
    }
}
