use crate::domain::crs::{Crs, Envelope};
use crate::utils::error::{ExtractorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OwsType {
    #[default]
    Wfs,
    Wcs,
}

impl fmt::Display for OwsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwsType::Wfs => write!(f, "WFS"),
            OwsType::Wcs => write!(f, "WCS"),
        }
    }
}

/// One extraction job as submitted by a caller.
///
/// The request is never mutated. Access control turns it into a
/// [`ResolvedRequest`], which is the only thing the extractor accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub url: Url,
    #[serde(default)]
    pub ows_type: OwsType,
    pub layer_name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub bbox: Envelope,
    pub format: String,
    pub projection: Crs,
}

impl ExtractionRequest {
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// GetCapabilities URL for `service` on this request's endpoint.
    pub fn capabilities_url(&self, service: &str, version: Option<&str>) -> Url {
        capabilities_url(&self.url, service, version)
    }

    /// Layer name without any `prefix:` qualifier.
    pub fn local_layer_name(&self) -> &str {
        self.layer_name
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.layer_name)
    }

    /// Directory name that scopes this request's output under the base dir.
    pub fn containing_dir_name(&self) -> String {
        let host = self.host().unwrap_or("local");
        sanitize_file_name(&format!("{}_{}", host, self.local_layer_name()))
    }
}

/// Existing `SERVICE`, `REQUEST` and `VERSION` parameters are replaced, any
/// other query parameter is kept.
pub fn capabilities_url(endpoint: &Url, service: &str, version: Option<&str>) -> Url {
    let mut url = endpoint.clone();
    let kept: Vec<(String, String)> = endpoint
        .query_pairs()
        .filter(|(key, _)| {
            !["service", "request", "version"]
                .iter()
                .any(|reserved| key.eq_ignore_ascii_case(reserved))
        })
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs.append_pair("SERVICE", service);
        pairs.append_pair("REQUEST", "GetCapabilities");
        if let Some(version) = version {
            pairs.append_pair("VERSION", version);
        }
    }
    url
}

pub(crate) fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A request that passed the permission check. Only
/// [`PermissionChecker`](crate::core::permission::PermissionChecker) creates
/// one, so an extraction can never start without a canonical type name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    request: ExtractionRequest,
    wfs_name: String,
}

impl ResolvedRequest {
    pub(crate) fn new(request: ExtractionRequest, wfs_name: String) -> Self {
        Self { request, wfs_name }
    }

    pub fn request(&self) -> &ExtractionRequest {
        &self.request
    }

    /// Canonical WFS type name, possibly `prefix:local`.
    pub fn wfs_name(&self) -> &str {
        &self.wfs_name
    }

    pub fn into_inner(self) -> ExtractionRequest {
        self.request
    }
}

/// Identity forwarded to trusted hosts through the security proxy headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub username: Option<String>,
    pub roles: Vec<String>,
}

impl Caller {
    pub fn new(username: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            username: Some(username.into()),
            roles,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// One `FeatureType` advertised in a capabilities document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitiesEntry {
    pub name: String,
    pub namespaces: Vec<String>,
}

impl CapabilitiesEntry {
    pub fn new(name: impl Into<String>, namespaces: Vec<String>) -> Self {
        Self {
            name: name.into(),
            namespaces,
        }
    }

    /// Part of the name after the first `:`, or the whole name.
    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }

    pub fn declares_namespace(&self, namespace: &str) -> bool {
        self.namespaces.iter().any(|ns| ns == namespace)
    }
}

/// Geometry families. Single and multi variants share a kind since the
/// output formats always store multi-geometries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
    Geometry,
}

impl GeometryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "point",
            GeometryKind::Line => "line",
            GeometryKind::Polygon => "polygon",
            GeometryKind::Geometry => "geometry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Integer,
    Double,
    Boolean,
    Date,
    Geometry(GeometryKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub binding: AttributeType,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, binding: AttributeType) -> Self {
        Self {
            name: name.into(),
            binding,
        }
    }

    pub fn geometry_kind(&self) -> Option<GeometryKind> {
        match self.binding {
            AttributeType::Geometry(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_geometry(&self) -> bool {
        self.geometry_kind().is_some()
    }
}

/// Feature type description reported by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSchema {
    pub type_name: String,
    pub attributes: Vec<AttributeDescriptor>,
    pub geometry_attribute: String,
    pub native_crs: Option<Crs>,
}

impl RemoteSchema {
    pub fn geometry_descriptor(&self) -> Result<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|a| a.name == self.geometry_attribute && a.is_geometry())
            .ok_or_else(|| ExtractorError::Schema {
                type_name: self.type_name.clone(),
                message: format!(
                    "geometry attribute {} is not a declared geometry",
                    self.geometry_attribute
                ),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    LineString(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    Polygon(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
    Collection(Vec<Geometry>),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => GeometryKind::Point,
            Geometry::LineString(_) | Geometry::MultiLineString(_) => GeometryKind::Line,
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => GeometryKind::Polygon,
            Geometry::Collection(_) => GeometryKind::Geometry,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: String,
    pub geometry: Option<Geometry>,
    pub properties: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Shp,
    Mif,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Shp => "shp",
            OutputFormat::Mif => "mif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ExtractorError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("shp") {
            Ok(OutputFormat::Shp)
        } else if s.eq_ignore_ascii_case("mif") {
            Ok(OutputFormat::Mif)
        } else {
            Err(ExtractorError::UnsupportedFormat {
                format: s.to_string(),
            })
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Parameters handed to the datastore factory.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionParams {
    pub url: Url,
    pub lenient: bool,
    /// `true` asks the datastore to issue GetFeature as HTTP POST.
    pub protocol: bool,
    pub credentials: Option<Credentials>,
}
