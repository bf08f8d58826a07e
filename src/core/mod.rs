pub mod capabilities;
pub mod extractor;
pub mod permission;
pub mod query;
pub mod reproject;
pub mod trust;
pub mod write_features;

pub use crate::domain::ports::{
    DataStore, DataStoreFactory, FeatureReader, FeatureSink, SinkTarget, WriterFactory,
};
pub use crate::utils::error::Result;
