use crate::adapters::storage::LocalStorage;
use crate::config::toml_config::ExtractorConfig;
use crate::core::query::build_query;
use crate::core::trust::TrustPolicy;
use crate::core::write_features::FeatureWriter;
use crate::domain::model::{
    sanitize_file_name, ConnectionParams, Credentials, ExtractionRequest, OutputFormat, OwsType,
    RemoteSchema, ResolvedRequest,
};
use crate::domain::ports::{DataStore, DataStoreFactory, FeatureReader, WriterFactory};
use crate::domain::query::SpatialQuery;
use crate::utils::error::{ExtractorError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// GetCapabilities version pinned in the datastore connection URL.
pub const WFS_CONNECTION_VERSION: &str = "1.0.0";

/// Downloads the features of an already authorized layer into local files.
pub struct WfsExtractor<F: DataStoreFactory> {
    storage: LocalStorage,
    datastore_factory: F,
    admin: Option<Credentials>,
    trust: TrustPolicy,
    writers: HashMap<OutputFormat, Arc<dyn WriterFactory>>,
}

impl<F: DataStoreFactory> WfsExtractor<F> {
    pub fn new(base_dir: impl Into<PathBuf>, datastore_factory: F, trust: TrustPolicy) -> Self {
        Self {
            storage: LocalStorage::new(base_dir),
            datastore_factory,
            admin: None,
            trust,
            writers: HashMap::new(),
        }
    }

    /// Extractor sharing the trust policy a [`PermissionChecker`] built from
    /// the same configuration uses.
    ///
    /// [`PermissionChecker`]: crate::core::permission::PermissionChecker
    pub fn from_config(config: &ExtractorConfig, datastore_factory: F) -> Self {
        let extractor = Self::new(config.base_dir(), datastore_factory, config.trust_policy());
        match config.admin_credentials() {
            Some(credentials) => extractor.with_admin_credentials(credentials),
            None => extractor,
        }
    }

    pub fn with_admin_credentials(mut self, credentials: Credentials) -> Self {
        self.admin = Some(credentials);
        self
    }

    pub fn with_writer(mut self, format: OutputFormat, factory: Arc<dyn WriterFactory>) -> Self {
        self.writers.insert(format, factory);
        self
    }

    /// Datastore parameters for `request`. Admin credentials are only handed
    /// out for trusted hosts.
    pub fn connection_params(&self, request: &ExtractionRequest) -> ConnectionParams {
        let credentials = if self.trust.is_trusted(&request.url) {
            self.admin.clone()
        } else {
            None
        };

        ConnectionParams {
            url: request.capabilities_url("WFS", Some(WFS_CONNECTION_VERSION)),
            lenient: true,
            protocol: true,
            credentials,
        }
    }

    fn writer_for(&self, format: &str) -> Result<&Arc<dyn WriterFactory>> {
        let format: OutputFormat = format.parse()?;
        self.writers
            .get(&format)
            .ok_or_else(|| ExtractorError::ConfigError {
                message: format!("No writer registered for format {}", format),
            })
    }

    /// Runs the extraction and returns every file produced.
    pub async fn extract(&self, resolved: &ResolvedRequest) -> Result<Vec<PathBuf>> {
        let request = resolved.request();
        if request.ows_type != OwsType::Wfs {
            return Err(ExtractorError::UnsupportedService {
                service: request.ows_type.to_string(),
            });
        }

        request.bbox.check()?;
        let writer = self.writer_for(&request.format)?;

        tracing::info!(
            "Extracting {} from {}",
            resolved.wfs_name(),
            request.host().unwrap_or_default()
        );

        // Extract
        let params = self.connection_params(request);
        tracing::debug!(
            "Connecting to {} (admin credentials: {})",
            params.url,
            params.credentials.is_some()
        );
        let store = self.datastore_factory.create_data_store(&params).await?;
        let schema = store.schema(resolved.wfs_name()).await?;
        let query = build_query(resolved, &schema)?;
        tracing::debug!(
            "Query {} with {} properties, output in {}",
            query.type_name,
            query.properties.len(),
            query.reproject_to
        );
        let reader = store.features(&query).await?;

        // Load
        let directory = self.storage.prepare(request).await?;
        let layer_stem = sanitize_file_name(request.local_layer_name());

        match write_all(writer.as_ref(), &schema, &query, reader, &directory, &layer_stem).await {
            Ok(files) => {
                tracing::info!(
                    "Extraction of {} produced {} files in {}",
                    resolved.wfs_name(),
                    files.len(),
                    directory.display()
                );
                Ok(files)
            }
            Err(e) => {
                tracing::warn!("Extraction of {} failed: {}", resolved.wfs_name(), e);
                self.storage.discard(&directory).await;
                Err(e)
            }
        }
    }
}

async fn write_all(
    factory: &dyn WriterFactory,
    schema: &RemoteSchema,
    query: &SpatialQuery,
    mut reader: Box<dyn FeatureReader>,
    directory: &Path,
    layer_stem: &str,
) -> Result<Vec<PathBuf>> {
    let mut writer = FeatureWriter::new(
        factory,
        schema,
        &query.properties,
        directory,
        layer_stem,
        query.reproject_to,
    )?;

    while let Some(feature) = reader.next_feature().await? {
        writer.visit(&feature)?;
    }
    tracing::debug!("{} features written", writer.written());

    writer.close()
}
