use crate::domain::crs::Crs;
use crate::domain::model::{
    AttributeDescriptor, AttributeType, Feature, GeometryKind, RemoteSchema,
};
use crate::domain::ports::{FeatureSink, SinkTarget, WriterFactory};
use crate::utils::error::{ExtractorError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Feature visitor that routes every feature to a sink for its geometry kind.
///
/// A layer bound to a specific geometry kind produces one output; a layer
/// typed as generic geometry gets one output per kind actually seen.
pub struct FeatureWriter<'a> {
    factory: &'a dyn WriterFactory,
    directory: PathBuf,
    layer_stem: String,
    attributes: Vec<AttributeDescriptor>,
    geometry_attribute: String,
    layer_kind: GeometryKind,
    projection: Crs,
    sinks: BTreeMap<GeometryKind, Box<dyn FeatureSink>>,
    written: usize,
}

impl<'a> FeatureWriter<'a> {
    pub fn new(
        factory: &'a dyn WriterFactory,
        schema: &RemoteSchema,
        properties: &[String],
        directory: &Path,
        layer_stem: &str,
        projection: Crs,
    ) -> Result<Self> {
        let layer_kind = schema
            .geometry_descriptor()?
            .geometry_kind()
            .unwrap_or(GeometryKind::Geometry);

        let attributes = schema
            .attributes
            .iter()
            .filter(|a| properties.contains(&a.name))
            .cloned()
            .collect();

        Ok(Self {
            factory,
            directory: directory.to_path_buf(),
            layer_stem: layer_stem.to_string(),
            attributes,
            geometry_attribute: schema.geometry_attribute.clone(),
            layer_kind,
            projection,
            sinks: BTreeMap::new(),
            written: 0,
        })
    }

    fn kind_for(&self, feature: &Feature) -> Result<GeometryKind> {
        let feature_kind = feature.geometry.as_ref().map(|g| g.kind());
        match (self.layer_kind, feature_kind) {
            (GeometryKind::Geometry, Some(kind)) => Ok(kind),
            (layer_kind, None) => Ok(layer_kind),
            (layer_kind, Some(kind)) if kind == layer_kind => Ok(kind),
            (layer_kind, Some(kind)) => Err(ExtractorError::Processing {
                feature: feature.id.clone(),
                message: format!(
                    "{} geometry in a {} layer",
                    kind.as_str(),
                    layer_kind.as_str()
                ),
            }),
        }
    }

    fn target(&self, kind: GeometryKind) -> SinkTarget {
        let file_stem = if self.layer_kind == GeometryKind::Geometry {
            format!("{}_{}", self.layer_stem, kind.as_str())
        } else {
            self.layer_stem.clone()
        };

        let attributes = self
            .attributes
            .iter()
            .map(|a| {
                if a.name == self.geometry_attribute {
                    AttributeDescriptor::new(a.name.clone(), AttributeType::Geometry(kind))
                } else {
                    a.clone()
                }
            })
            .collect();

        SinkTarget {
            directory: self.directory.clone(),
            file_stem,
            attributes,
            geometry_attribute: self.geometry_attribute.clone(),
            geometry_kind: kind,
            projection: self.projection,
        }
    }

    pub fn visit(&mut self, feature: &Feature) -> Result<()> {
        let kind = self.kind_for(feature)?;

        if !self.sinks.contains_key(&kind) {
            let target = self.target(kind);
            tracing::debug!("Opening {} output {}", kind.as_str(), target.file_stem);
            let sink = self
                .factory
                .create_sink(&target)
                .map_err(|e| as_processing(&feature.id, e))?;
            self.sinks.insert(kind, sink);
        }

        if let Some(sink) = self.sinks.get_mut(&kind) {
            sink.write(feature)
                .map_err(|e| as_processing(&feature.id, e))?;
        }
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Closes every sink and returns the produced files in kind order.
    pub fn close(self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for (kind, sink) in self.sinks {
            let produced = sink.close().map_err(|e| ExtractorError::Processing {
                feature: format!("<{} output>", kind.as_str()),
                message: e.to_string(),
            })?;
            files.extend(produced);
        }
        Ok(files)
    }
}

fn as_processing(feature_id: &str, error: ExtractorError) -> ExtractorError {
    match error {
        ExtractorError::Processing { .. } => error,
        other => ExtractorError::Processing {
            feature: feature_id.to_string(),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Coord, Geometry};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingFactory {
        opened: Arc<Mutex<Vec<SinkTarget>>>,
        written: Arc<Mutex<Vec<(String, String)>>>,
        fail_on: Option<String>,
    }

    struct RecordingSink {
        stem: String,
        directory: PathBuf,
        written: Arc<Mutex<Vec<(String, String)>>>,
        fail_on: Option<String>,
    }

    impl FeatureSink for RecordingSink {
        fn write(&mut self, feature: &Feature) -> Result<()> {
            if self.fail_on.as_deref() == Some(feature.id.as_str()) {
                return Err(ExtractorError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.written
                .lock()
                .unwrap()
                .push((self.stem.clone(), feature.id.clone()));
            Ok(())
        }

        fn close(self: Box<Self>) -> Result<Vec<PathBuf>> {
            Ok(vec![self.directory.join(format!("{}.shp", self.stem))])
        }
    }

    impl WriterFactory for RecordingFactory {
        fn create_sink(&self, target: &SinkTarget) -> Result<Box<dyn FeatureSink>> {
            self.opened.lock().unwrap().push(target.clone());
            Ok(Box::new(RecordingSink {
                stem: target.file_stem.clone(),
                directory: target.directory.clone(),
                written: self.written.clone(),
                fail_on: self.fail_on.clone(),
            }))
        }
    }

    fn schema(kind: GeometryKind) -> RemoteSchema {
        RemoteSchema {
            type_name: "roads".to_string(),
            attributes: vec![
                AttributeDescriptor::new("geom", AttributeType::Geometry(kind)),
                AttributeDescriptor::new("name", AttributeType::String),
                AttributeDescriptor::new("label_point", AttributeType::Geometry(GeometryKind::Point)),
            ],
            geometry_attribute: "geom".to_string(),
            native_crs: None,
        }
    }

    fn feature(id: &str, geometry: Option<Geometry>) -> Feature {
        Feature {
            id: id.to_string(),
            geometry,
            properties: HashMap::new(),
        }
    }

    fn point() -> Geometry {
        Geometry::Point(Coord { x: 1.0, y: 2.0 })
    }

    fn line() -> Geometry {
        Geometry::LineString(vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }])
    }

    fn properties() -> Vec<String> {
        vec!["geom".to_string(), "name".to_string()]
    }

    #[test]
    fn test_specific_layer_uses_single_sink() {
        let factory = RecordingFactory::default();
        let dir = PathBuf::from("/tmp/out");
        let mut writer = FeatureWriter::new(
            &factory,
            &schema(GeometryKind::Line),
            &properties(),
            &dir,
            "roads",
            Crs::WGS84,
        )
        .unwrap();

        writer.visit(&feature("roads.1", Some(line()))).unwrap();
        writer.visit(&feature("roads.2", None)).unwrap();
        assert_eq!(writer.written(), 2);

        let files = writer.close().unwrap();
        assert_eq!(files, vec![dir.join("roads.shp")]);

        let opened = factory.opened.lock().unwrap();
        assert_eq!(opened.len(), 1);
        let names: Vec<&str> = opened[0].attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["geom", "name"]);
    }

    #[test]
    fn test_generic_layer_splits_per_kind() {
        let factory = RecordingFactory::default();
        let dir = PathBuf::from("/tmp/out");
        let mut writer = FeatureWriter::new(
            &factory,
            &schema(GeometryKind::Geometry),
            &properties(),
            &dir,
            "mixed",
            Crs::WGS84,
        )
        .unwrap();

        writer.visit(&feature("f.1", Some(line()))).unwrap();
        writer.visit(&feature("f.2", Some(point()))).unwrap();
        writer.visit(&feature("f.3", Some(point()))).unwrap();

        let files = writer.close().unwrap();
        assert_eq!(
            files,
            vec![dir.join("mixed_point.shp"), dir.join("mixed_line.shp")]
        );

        let opened = factory.opened.lock().unwrap();
        assert!(opened
            .iter()
            .all(|t| t.attributes[0].binding == AttributeType::Geometry(t.geometry_kind)));
    }

    #[test]
    fn test_mismatched_geometry_is_processing_error() {
        let factory = RecordingFactory::default();
        let mut writer = FeatureWriter::new(
            &factory,
            &schema(GeometryKind::Line),
            &properties(),
            Path::new("/tmp/out"),
            "roads",
            Crs::WGS84,
        )
        .unwrap();

        let err = writer.visit(&feature("roads.9", Some(point()))).unwrap_err();
        assert!(matches!(err, ExtractorError::Processing { ref feature, .. } if feature == "roads.9"));
    }

    #[test]
    fn test_sink_failure_is_reported_as_processing_error() {
        let factory = RecordingFactory {
            fail_on: Some("roads.2".to_string()),
            ..Default::default()
        };
        let mut writer = FeatureWriter::new(
            &factory,
            &schema(GeometryKind::Line),
            &properties(),
            Path::new("/tmp/out"),
            "roads",
            Crs::WGS84,
        )
        .unwrap();

        writer.visit(&feature("roads.1", Some(line()))).unwrap();
        let err = writer.visit(&feature("roads.2", Some(line()))).unwrap_err();

        match err {
            ExtractorError::Processing { feature, message } => {
                assert_eq!(feature, "roads.2");
                assert!(message.contains("disk full"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
