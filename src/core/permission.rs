use crate::config::toml_config::ExtractorConfig;
use crate::core::capabilities::CapabilitiesResolver;
use crate::core::trust::TrustPolicy;
use crate::domain::model::{CapabilitiesEntry, Caller, ExtractionRequest, ResolvedRequest};
use crate::utils::error::{ExtractorError, Result};

/// Confirms that a caller can see the requested layer before the extractor
/// connects with elevated credentials.
#[derive(Debug, Clone)]
pub struct PermissionChecker {
    resolver: CapabilitiesResolver,
    trust: TrustPolicy,
}

impl PermissionChecker {
    pub fn new(trust: TrustPolicy) -> Self {
        Self {
            resolver: CapabilitiesResolver::new(),
            trust,
        }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(config.trust_policy())
    }

    /// Resolves the canonical WFS type name of `request` as seen by `caller`.
    ///
    /// Fails with [`ExtractorError::Authorization`] when no advertised feature
    /// type matches, transport and parse errors are passed through unchanged.
    pub async fn check_permission(
        &self,
        request: ExtractionRequest,
        caller: &Caller,
    ) -> Result<ResolvedRequest> {
        let trusted = self.trust.is_trusted(&request.url);
        if trusted {
            tracing::debug!(
                "Forwarding caller identity to trusted host {}",
                request.host().unwrap_or_default()
            );
        }

        let entries = self
            .resolver
            .fetch_capabilities(&request.url, trusted, caller)
            .await?;

        match resolve_type_name(&request, &entries) {
            Some(wfs_name) => {
                tracing::info!("Layer {} resolved to {}", request.layer_name, wfs_name);
                Ok(ResolvedRequest::new(request, wfs_name))
            }
            None => {
                tracing::warn!(
                    "Layer {} not available to {}",
                    request.layer_name,
                    caller.username.as_deref().unwrap_or("anonymous")
                );
                Err(ExtractorError::Authorization {
                    layer: request.layer_name,
                })
            }
        }
    }
}

/// Matches the request against the advertised feature types, first match wins.
///
/// Without a namespace the raw name must equal the layer name and the layer
/// name is canonical. With a namespace the entry must declare it, its local
/// part must equal the layer name, and the entry's full name is canonical.
pub fn resolve_type_name(
    request: &ExtractionRequest,
    entries: &[CapabilitiesEntry],
) -> Option<String> {
    match &request.namespace {
        None => entries
            .iter()
            .find(|entry| entry.name == request.layer_name)
            .map(|_| request.layer_name.clone()),
        Some(namespace) => entries
            .iter()
            .find(|entry| {
                entry.declares_namespace(namespace) && entry.local_name() == request.layer_name
            })
            .map(|entry| entry.name.clone()),
    }
}
