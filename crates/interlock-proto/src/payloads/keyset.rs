//! Keyset generation payloads.

use serde::{Deserialize, Serialize};

/// Template parameters sent to a backend asked to generate a keyset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    /// Template name, e.g. `AES256_SIV`.
    pub name: String,
    /// Key type the template instantiates, e.g. `AesSivKey`.
    pub key_type: String,
    /// Key size in bytes.
    pub key_size: u32,
}

/// Request a fresh keyset for a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysetGenerate {
    /// Template to instantiate.
    pub template: TemplateDescriptor,
}

/// Serialized keyset in the portable format every backend consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysetGenerated {
    /// Opaque keyset bytes.
    pub keyset: Vec<u8>,
}
