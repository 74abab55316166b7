//! Portable keysets.

use std::{fmt, sync::Arc};

use crate::{BackendId, TemplateName};

/// Key material for one template in the portable serialized form.
///
/// Produced once per case by a reference backend and handed unchanged to
/// every other backend. The bytes are opaque to the verifier. Cloning is
/// cheap and never copies key material.
#[derive(Clone, PartialEq, Eq)]
pub struct Keyset {
    template: TemplateName,
    source: BackendId,
    bytes: Arc<[u8]>,
}

impl Keyset {
    /// Wrap serialized keyset bytes produced by `source`.
    pub fn new(template: TemplateName, source: BackendId, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { template, source, bytes: bytes.into() }
    }

    /// Template the keyset was generated for.
    #[must_use]
    pub fn template(&self) -> &TemplateName {
        &self.template
    }

    /// Backend that generated the keyset.
    #[must_use]
    pub fn source(&self) -> &BackendId {
        &self.source
    }

    /// Serialized keyset.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

// Key material stays out of logs.
impl fmt::Debug for Keyset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyset")
            .field("template", &self.template)
            .field("source", &self.source)
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}
