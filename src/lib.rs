pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ExtractorConfig;

pub use crate::adapters::storage::LocalStorage;
pub use crate::core::{
    capabilities::CapabilitiesResolver, extractor::WfsExtractor, permission::PermissionChecker,
    trust::TrustPolicy,
};
pub use crate::domain::crs::{Crs, Envelope};
pub use crate::domain::model::{
    Caller, CapabilitiesEntry, ExtractionRequest, OutputFormat, OwsType, ResolvedRequest,
};
pub use crate::utils::error::{ExtractorError, Result};
