use crate::domain::crs::{Crs, Envelope};
use quick_xml::escape::escape;
use std::fmt::Write;

/// Polygon literal used on the right-hand side of a spatial predicate,
/// tagged with the `EPSG:xxxx` code of the CRS its coordinates are in.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralGeometry {
    pub ring: Vec<(f64, f64)>,
    pub epsg_code: String,
}

impl LiteralGeometry {
    pub fn from_envelope(envelope: &Envelope) -> Self {
        Self {
            ring: envelope.ring(),
            epsg_code: envelope.crs.code(),
        }
    }

    /// `(min_x, min_y, max_x, max_y)` of the ring.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.ring.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Intersects {
        property: String,
        literal: LiteralGeometry,
    },
}

/// Server side query derived for one extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialQuery {
    pub type_name: String,
    pub filter: Filter,
    pub properties: Vec<String>,
    pub reproject_to: Crs,
}

impl Filter {
    /// OGC Filter Encoding 1.0 with a GML 2 polygon.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<ogc:Filter xmlns:ogc="http://www.opengis.net/ogc" xmlns:gml="http://www.opengis.net/gml">"#);
        match self {
            Filter::Intersects { property, literal } => {
                xml.push_str("<ogc:Intersects>");
                let _ = write!(xml, "<ogc:PropertyName>{}</ogc:PropertyName>", escape(property.as_str()));
                let _ = write!(
                    xml,
                    r#"<gml:Polygon srsName="{}"><gml:outerBoundaryIs><gml:LinearRing><gml:coordinates decimal="." cs="," ts=" ">"#,
                    escape(literal.epsg_code.as_str())
                );
                let coordinates: Vec<String> = literal
                    .ring
                    .iter()
                    .map(|(x, y)| format!("{},{}", x, y))
                    .collect();
                xml.push_str(&coordinates.join(" "));
                xml.push_str("</gml:coordinates></gml:LinearRing></gml:outerBoundaryIs></gml:Polygon>");
                xml.push_str("</ogc:Intersects>");
            }
        }
        xml.push_str("</ogc:Filter>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> SpatialQuery {
        let bbox = Envelope::new(0.0, 0.0, 10.0, 10.0, Crs::WGS84).unwrap();
        SpatialQuery {
            type_name: "ns0:roads".to_string(),
            filter: Filter::Intersects {
                property: "the_geom".to_string(),
                literal: LiteralGeometry::from_envelope(&bbox),
            },
            properties: vec!["the_geom".to_string(), "name".to_string()],
            reproject_to: Crs::from_epsg(2154),
        }
    }

    #[test]
    fn test_filter_xml() {
        let xml = query().filter.to_xml();
        assert!(xml.starts_with("<ogc:Filter"));
        assert!(xml.contains("<ogc:PropertyName>the_geom</ogc:PropertyName>"));
        assert!(xml.contains(r#"srsName="EPSG:4326""#));
        assert!(xml.contains("0,0 0,10 10,10 10,0 0,0"));
        assert!(xml.ends_with("</ogc:Filter>"));
    }

    #[test]
    fn test_literal_bounds() {
        let bbox = Envelope::new(-5.0, 1.0, 3.0, 2.0, Crs::WGS84).unwrap();
        assert_eq!(
            LiteralGeometry::from_envelope(&bbox).bounds(),
            (-5.0, 1.0, 3.0, 2.0)
        );
    }
}
