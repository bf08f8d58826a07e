use crate::domain::crs::Crs;
use crate::domain::model::{
    AttributeDescriptor, ConnectionParams, Feature, GeometryKind, RemoteSchema,
};
use crate::domain::query::SpatialQuery;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

#[async_trait]
pub trait DataStoreFactory: Send + Sync {
    type Store: DataStore;

    async fn create_data_store(&self, params: &ConnectionParams) -> Result<Self::Store>;
}

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn schema(&self, type_name: &str) -> Result<RemoteSchema>;

    async fn features(&self, query: &SpatialQuery) -> Result<Box<dyn FeatureReader>>;
}

/// Pull based cursor over a feature collection.
#[async_trait]
pub trait FeatureReader: Send {
    async fn next_feature(&mut self) -> Result<Option<Feature>>;
}

/// Everything a format backend needs to open one output file.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkTarget {
    pub directory: PathBuf,
    pub file_stem: String,
    pub attributes: Vec<AttributeDescriptor>,
    pub geometry_attribute: String,
    pub geometry_kind: GeometryKind,
    pub projection: Crs,
}

pub trait FeatureSink: Send {
    fn write(&mut self, feature: &Feature) -> Result<()>;

    /// Flushes the file and returns every file it produced.
    fn close(self: Box<Self>) -> Result<Vec<PathBuf>>;
}

/// Opens sinks for one output format (shapefile, MIF/MID).
pub trait WriterFactory: Send + Sync {
    fn create_sink(&self, target: &SinkTarget) -> Result<Box<dyn FeatureSink>>;
}
