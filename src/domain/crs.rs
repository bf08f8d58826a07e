use crate::utils::error::{ExtractorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    pub const WGS84: Crs = Crs { epsg: 4326 };
    pub const WEB_MERCATOR: Crs = Crs { epsg: 3857 };

    pub const fn from_epsg(epsg: u32) -> Self {
        Self { epsg }
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// `EPSG:<code>`, the form used to tag literal geometries and in `srsName`.
    pub fn code(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = ExtractorError;

    /// Accepts the spellings found in WFS documents:
    /// `EPSG:2154`, `urn:ogc:def:crs:EPSG::2154`, `urn:x-ogc:def:crs:EPSG:2154`,
    /// `http://www.opengis.net/gml/srs/epsg.xml#2154`,
    /// `http://www.opengis.net/def/crs/EPSG/0/2154` and `CRS:84`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper == "CRS:84" || upper.ends_with(":CRS84") {
            return Ok(Crs::WGS84);
        }
        if !upper.contains("EPSG") {
            return Err(ExtractorError::UnknownCrs(trimmed.to_string()));
        }

        trimmed
            .rsplit([':', '#', '/'])
            .next()
            .and_then(|code| code.parse::<u32>().ok())
            .filter(|code| *code > 0)
            .map(Crs::from_epsg)
            .ok_or_else(|| ExtractorError::UnknownCrs(trimmed.to_string()))
    }
}

impl TryFrom<String> for Crs {
    type Error = ExtractorError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.code()
    }
}

/// Axis-aligned box in a given CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub crs: Crs,
}

#[derive(Deserialize)]
struct RawEnvelope {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    crs: Crs,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = ExtractorError;

    fn try_from(raw: RawEnvelope) -> Result<Self> {
        Envelope::new(raw.min_x, raw.min_y, raw.max_x, raw.max_y, raw.crs)
    }
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: Crs) -> Result<Self> {
        let envelope = Self {
            min_x,
            min_y,
            max_x,
            max_y,
            crs,
        };
        envelope.check()?;
        Ok(envelope)
    }

    pub fn check(&self) -> Result<()> {
        let values = [self.min_x, self.min_y, self.max_x, self.max_y];
        if values.iter().any(|v| !v.is_finite()) || self.min_x > self.max_x || self.min_y > self.max_y
        {
            return Err(ExtractorError::InvalidConfigValueError {
                field: "bbox".to_string(),
                value: format!(
                    "{},{},{},{}",
                    self.min_x, self.min_y, self.max_x, self.max_y
                ),
                reason: "Expected finite minx,miny,maxx,maxy with min <= max".to_string(),
            });
        }
        Ok(())
    }

    /// Closed exterior ring, clockwise from the lower-left corner.
    pub fn ring(&self) -> Vec<(f64, f64)> {
        vec![
            (self.min_x, self.min_y),
            (self.min_x, self.max_y),
            (self.max_x, self.max_y),
            (self.max_x, self.min_y),
            (self.min_x, self.min_y),
        ]
    }

    /// Parses `minx,miny,maxx,maxy`.
    pub fn parse(value: &str, crs: Crs) -> Result<Self> {
        let parts: Vec<f64> = value
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| ExtractorError::InvalidConfigValueError {
                field: "bbox".to_string(),
                value: value.to_string(),
                reason: format!("Invalid number: {}", e),
            })?;

        match parts.as_slice() {
            [min_x, min_y, max_x, max_y] => Self::new(*min_x, *min_y, *max_x, *max_y, crs),
            _ => Err(ExtractorError::InvalidConfigValueError {
                field: "bbox".to_string(),
                value: value.to_string(),
                reason: "Expected four comma separated values".to_string(),
            }),
        }
    }
}
