use crate::domain::crs::{Crs, Envelope};
use crate::utils::error::{ExtractorError, Result};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use std::f64::consts::PI;

/// Points sampled along each bbox edge when reprojecting, so curved edges
/// under non-linear projections still fall inside the result.
pub const DENSIFY_POINTS_PER_EDGE: usize = 10;

const EARTH_RADIUS: f64 = 6_378_137.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Proj definitions for the projections offered to extractor users.
pub fn proj_string(epsg: u32) -> Option<&'static str> {
    let definition = match epsg {
        4326 => "+proj=longlat +datum=WGS84 +no_defs",
        4171 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs",
        4258 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs",
        3857 | 900913 => {
            "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
        }
        2154 => {
            "+proj=lcc +lat_0=46.5 +lon_0=3 +lat_1=49 +lat_2=44 +x_0=700000 +y_0=6600000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs"
        }
        3948 => {
            "+proj=lcc +lat_0=48 +lon_0=3 +lat_1=47.25 +lat_2=48.75 +x_0=1700000 +y_0=7200000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs"
        }
        27562 => {
            "+proj=lcc +lat_1=46.8 +lat_0=46.8 +lon_0=0 +k_0=0.99987742 +x_0=600000 +y_0=200000 +a=6378249.2 +b=6356515 +towgs84=-168,-60,320,0,0,0,0 +pm=paris +units=m +no_defs"
        }
        27572 => {
            "+proj=lcc +lat_1=46.8 +lat_0=46.8 +lon_0=0 +k_0=0.99987742 +x_0=600000 +y_0=2200000 +a=6378249.2 +b=6356515 +towgs84=-168,-60,320,0,0,0,0 +pm=paris +units=m +no_defs"
        }
        32631 => "+proj=utm +zone=31 +datum=WGS84 +units=m +no_defs",
        32632 => "+proj=utm +zone=32 +datum=WGS84 +units=m +no_defs",
        32633 => "+proj=utm +zone=33 +datum=WGS84 +units=m +no_defs",
        _ => return None,
    };
    Some(definition)
}

pub fn is_geographic(epsg: u32) -> bool {
    matches!(epsg, 4326 | 4171 | 4258)
}

fn is_web_mercator(epsg: u32) -> bool {
    matches!(epsg, 3857 | 900913)
}

fn lonlat_to_merc(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let x = lon.to_radians() * EARTH_RADIUS;
    let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
    (x, y)
}

fn merc_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

/// Point transform between two EPSG coded systems.
pub enum CrsTransformer {
    Identity,
    LonLatToMerc,
    MercToLonLat,
    Proj4rs {
        source: Box<Proj>,
        target: Box<Proj>,
        source_is_geographic: bool,
        target_is_geographic: bool,
    },
}

impl std::fmt::Debug for CrsTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrsTransformer::Identity => f.write_str("Identity"),
            CrsTransformer::LonLatToMerc => f.write_str("LonLatToMerc"),
            CrsTransformer::MercToLonLat => f.write_str("MercToLonLat"),
            CrsTransformer::Proj4rs { .. } => f.write_str("Proj4rs"),
        }
    }
}

impl CrsTransformer {
    pub fn new(source: Crs, target: Crs) -> Result<Self> {
        let (src, dst) = (source.epsg(), target.epsg());
        if src == dst || (is_web_mercator(src) && is_web_mercator(dst)) {
            return Ok(CrsTransformer::Identity);
        }
        if src == 4326 && is_web_mercator(dst) {
            return Ok(CrsTransformer::LonLatToMerc);
        }
        if is_web_mercator(src) && dst == 4326 {
            return Ok(CrsTransformer::MercToLonLat);
        }

        let source_def =
            proj_string(src).ok_or_else(|| ExtractorError::UnknownCrs(source.code()))?;
        let target_def =
            proj_string(dst).ok_or_else(|| ExtractorError::UnknownCrs(target.code()))?;

        let source_proj =
            Proj::from_proj_string(source_def).map_err(|e| ExtractorError::Transform {
                message: format!("Invalid projection {}: {:?}", source, e),
            })?;
        let target_proj =
            Proj::from_proj_string(target_def).map_err(|e| ExtractorError::Transform {
                message: format!("Invalid projection {}: {:?}", target, e),
            })?;

        Ok(CrsTransformer::Proj4rs {
            source: Box::new(source_proj),
            target: Box::new(target_proj),
            source_is_geographic: is_geographic(src),
            target_is_geographic: is_geographic(dst),
        })
    }

    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (out_x, out_y) = match self {
            CrsTransformer::Identity => (x, y),
            CrsTransformer::LonLatToMerc => lonlat_to_merc(x, y),
            CrsTransformer::MercToLonLat => merc_to_lonlat(x, y),
            CrsTransformer::Proj4rs {
                source,
                target,
                source_is_geographic,
                target_is_geographic,
            } => {
                let mut point = if *source_is_geographic {
                    (x.to_radians(), y.to_radians(), 0.0)
                } else {
                    (x, y, 0.0)
                };
                transform(source, target, &mut point).map_err(|e| ExtractorError::Transform {
                    message: format!("({}, {}): {:?}", x, y, e),
                })?;
                if *target_is_geographic {
                    (point.0.to_degrees(), point.1.to_degrees())
                } else {
                    (point.0, point.1)
                }
            }
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(ExtractorError::Transform {
                message: format!("({}, {}) has no finite image", x, y),
            });
        }
        Ok((out_x, out_y))
    }
}

/// Reprojects an envelope by sampling `points_per_edge` points along each
/// edge and taking the bounds of the transformed samples.
pub fn transform_envelope(
    envelope: &Envelope,
    target: Crs,
    points_per_edge: usize,
) -> Result<Envelope> {
    if envelope.crs == target {
        return Ok(*envelope);
    }

    let transformer = CrsTransformer::new(envelope.crs, target)?;
    let steps = points_per_edge.max(2) - 1;
    let width = envelope.max_x - envelope.min_x;
    let height = envelope.max_y - envelope.min_y;

    let mut bounds = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = envelope.min_x + t * width;
        let y = envelope.min_y + t * height;
        for (px, py) in [
            (x, envelope.min_y),
            (x, envelope.max_y),
            (envelope.min_x, y),
            (envelope.max_x, y),
        ] {
            let (tx, ty) = transformer.transform(px, py)?;
            bounds = (
                bounds.0.min(tx),
                bounds.1.min(ty),
                bounds.2.max(tx),
                bounds.3.max(ty),
            );
        }
    }

    Envelope::new(bounds.0, bounds.1, bounds.2, bounds.3, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {} to be within {} of {}",
            actual,
            tolerance,
            expected
        );
    }

    #[test]
    fn test_identity_keeps_envelope() {
        let bbox = Envelope::new(1.0, 2.0, 3.0, 4.0, Crs::WGS84).unwrap();
        assert_eq!(transform_envelope(&bbox, Crs::WGS84, 10).unwrap(), bbox);
    }

    #[test]
    fn test_lonlat_to_web_mercator() {
        let bbox = Envelope::new(0.0, 0.0, 10.0, 10.0, Crs::WGS84).unwrap();
        let merc = transform_envelope(&bbox, Crs::WEB_MERCATOR, DENSIFY_POINTS_PER_EDGE).unwrap();

        assert_eq!(merc.crs, Crs::WEB_MERCATOR);
        assert_close(merc.min_x, 0.0, 1e-6);
        assert_close(merc.min_y, 0.0, 1e-6);
        assert_close(merc.max_x, 1_113_194.907_932_7, 0.01);
        assert_close(merc.max_y, 1_118_889.974_857_9, 0.01);
    }

    #[test]
    fn test_web_mercator_round_trip_point() {
        let forward = CrsTransformer::new(Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let inverse = CrsTransformer::new(Crs::WEB_MERCATOR, Crs::WGS84).unwrap();
        let (x, y) = forward.transform(2.35, 48.85).unwrap();
        let (lon, lat) = inverse.transform(x, y).unwrap();
        assert_close(lon, 2.35, 1e-9);
        assert_close(lat, 48.85, 1e-9);
    }

    #[test]
    fn test_lonlat_to_lambert93() {
        let transformer = CrsTransformer::new(Crs::WGS84, Crs::from_epsg(2154)).unwrap();
        let (x, y) = transformer.transform(2.35, 48.85).unwrap();
        assert_close(x, 652_300.0, 5_000.0);
        assert_close(y, 6_861_900.0, 5_000.0);
    }

    #[test]
    fn test_densified_edges_extend_past_corners() {
        // parallels are arcs under Lambert conformal conic, the southern edge
        // dips lowest near the central meridian (3°E), between the corners
        let bbox = Envelope::new(-5.0, 42.0, 11.0, 51.0, Crs::WGS84).unwrap();
        let target = Crs::from_epsg(2154);

        let transformer = CrsTransformer::new(Crs::WGS84, target).unwrap();
        let corners: Vec<(f64, f64)> = bbox.ring()[..4]
            .iter()
            .map(|&(x, y)| transformer.transform(x, y).unwrap())
            .collect();
        let corner_min_y = corners.iter().map(|c| c.1).fold(f64::MAX, f64::min);
        let corner_max_y = corners.iter().map(|c| c.1).fold(f64::MIN, f64::max);

        let densified = transform_envelope(&bbox, target, DENSIFY_POINTS_PER_EDGE).unwrap();
        let corners_only = transform_envelope(&bbox, target, 2).unwrap();

        assert!(densified.min_y < corner_min_y - 10_000.0);
        assert!(densified.max_y >= corner_max_y);
        assert_eq!(corners_only.min_y, corner_min_y);
        assert!(densified.min_y < corners_only.min_y);
    }

    #[test]
    fn test_unknown_code_is_georeferencing_error() {
        let bbox = Envelope::new(0.0, 0.0, 1.0, 1.0, Crs::WGS84).unwrap();
        let err = transform_envelope(&bbox, Crs::from_epsg(99999), 10).unwrap_err();
        assert!(matches!(err, ExtractorError::UnknownCrs(_)));
    }
}
