//! JSON run configuration.
//!
//! ```json
//! {
//!   "reference_backend": "java",
//!   "backends": [
//!     { "id": "java", "address": "127.0.0.1:4501" },
//!     { "id": "go", "address": "127.0.0.1:4502" }
//!   ],
//!   "templates": [
//!     { "name": "AES256_SIV", "key_type": "AesSivKey", "key_size": 64, "supported": ["java", "go"] }
//!   ],
//!   "max_concurrent_cases": 4
//! }
//! ```

use std::{
    net::{AddrParseError, SocketAddr},
    path::{Path, PathBuf},
};

use interlock_core::{
    BackendId, ConfigError, ConformanceConfig, KeyTemplate, SupportMatrix, TemplateCatalog,
};
use serde::Deserialize;
use thiserror::Error;

/// Errors loading or validating a run file.
#[derive(Error, Debug)]
pub enum RunFileError {
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not a valid run configuration document.
    #[error("invalid run file: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend address is not `ip:port`.
    #[error("backend {backend} has invalid address {address:?}: {source}")]
    InvalidAddress {
        /// Backend whose address is invalid
        backend: String,
        /// Address as written
        address: String,
        /// Parse error
        source: AddrParseError,
    },

    /// Document parsed but describes an invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// One backend test server.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendEntry {
    /// Backend id, e.g. `java`.
    pub id: String,
    /// Server address, `ip:port`.
    pub address: String,
}

/// One key template and the backends claiming it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateEntry {
    /// Template name.
    pub name: String,
    /// Key type.
    pub key_type: String,
    /// Key size in bytes.
    pub key_size: u32,
    /// Backends declaring support.
    #[serde(default)]
    pub supported: Vec<String>,
}

/// Parsed run file, not yet validated.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFile {
    /// Backend that generates keysets.
    pub reference_backend: String,
    /// Backends in declaration order.
    pub backends: Vec<BackendEntry>,
    /// Templates in run order.
    pub templates: Vec<TemplateEntry>,
    /// Concurrency limit, defaults to the verifier's.
    #[serde(default)]
    pub max_concurrent_cases: Option<usize>,
}

/// Validated configuration plus where to reach each backend.
#[derive(Debug)]
pub struct RunPlan {
    /// Verifier configuration.
    pub config: ConformanceConfig,
    /// Backend addresses in declaration order.
    pub addresses: Vec<(BackendId, SocketAddr)>,
}

impl RunFile {
    /// Read and parse `path`.
    pub fn load(path: &Path) -> Result<Self, RunFileError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| RunFileError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&text)
    }

    /// Parse a JSON document.
    pub fn parse(text: &str) -> Result<Self, RunFileError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validate into a [`RunPlan`].
    pub fn into_plan(self) -> Result<RunPlan, RunFileError> {
        let addresses = self
            .backends
            .iter()
            .map(|entry| {
                let addr = entry.address.parse().map_err(|source| RunFileError::InvalidAddress {
                    backend: entry.id.clone(),
                    address: entry.address.clone(),
                    source,
                })?;
                Ok((BackendId::new(&entry.id), addr))
            })
            .collect::<Result<Vec<_>, RunFileError>>()?;

        let mut matrix = SupportMatrix::new(addresses.iter().map(|(id, _)| id.clone()))?;
        for template in &self.templates {
            matrix.declare(
                template.name.as_str().into(),
                template.supported.iter().map(BackendId::new),
            )?;
        }

        let catalog = TemplateCatalog::new(
            self.templates.iter().map(|t| KeyTemplate::new(t.name.as_str(), &t.key_type, t.key_size)),
        )?;

        let mut config =
            ConformanceConfig::new(BackendId::new(self.reference_backend), catalog, matrix)?;
        if let Some(limit) = self.max_concurrent_cases {
            config = config.with_max_concurrent_cases(limit)?;
        }

        Ok(RunPlan { config, addresses })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARD: &str = r#"{
        "reference_backend": "java",
        "backends": [
            { "id": "java", "address": "127.0.0.1:4501" },
            { "id": "go", "address": "127.0.0.1:4502" },
            { "id": "python", "address": "[::1]:4503" }
        ],
        "templates": [
            { "name": "AES256_SIV", "key_type": "AesSivKey", "key_size": 64, "supported": ["java", "go"] },
            { "name": "AES128_SIV", "key_type": "AesSivKey", "key_size": 32 }
        ],
        "max_concurrent_cases": 2
    }"#;

    #[test]
    fn standard_file_builds_plan() {
        let plan = RunFile::parse(STANDARD).unwrap().into_plan().unwrap();

        assert_eq!(plan.config.reference_backend().as_str(), "java");
        assert_eq!(plan.config.max_concurrent_cases(), 2);
        assert_eq!(plan.addresses.len(), 3);
        assert_eq!(plan.addresses[2].1.port(), 4503);

        let names: Vec<_> = plan.config.catalog().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["AES256_SIV", "AES128_SIV"]);

        let set = plan.config.matrix().partition(&"AES256_SIV".into()).unwrap();
        assert_eq!(set.unsupported, [BackendId::from("python")]);
    }

    #[test]
    fn unknown_field_rejected() {
        let err = RunFile::parse(r#"{"reference_backend": "java", "backends": [], "templates": [], "extra": 1}"#)
            .unwrap_err();
        assert!(matches!(err, RunFileError::Json(_)));
    }

    #[test]
    fn bad_address_names_backend() {
        let file = STANDARD.replace("127.0.0.1:4502", "not-an-address");
        let err = RunFile::parse(&file).unwrap().into_plan().unwrap_err();
        assert!(matches!(err, RunFileError::InvalidAddress { ref backend, .. } if backend == "go"));
    }

    #[test]
    fn undeclared_supporter_rejected() {
        let file = STANDARD.replace(r#"["java", "go"]"#, r#"["java", "rust"]"#);
        let err = RunFile::parse(&file).unwrap().into_plan().unwrap_err();
        assert!(matches!(err, RunFileError::Config(ConfigError::UnknownBackend { .. })));
    }

    #[test]
    fn unknown_reference_rejected() {
        let file = STANDARD.replace(r#""reference_backend": "java""#, r#""reference_backend": "cc""#);
        let err = RunFile::parse(&file).unwrap().into_plan().unwrap_err();
        assert!(matches!(err, RunFileError::Config(ConfigError::UnknownReferenceBackend(_))));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let file = STANDARD.replace(r#""max_concurrent_cases": 2"#, r#""max_concurrent_cases": 0"#);
        let err = RunFile::parse(&file).unwrap().into_plan().unwrap_err();
        assert!(matches!(err, RunFileError::Config(ConfigError::ZeroConcurrency)));
    }
}
