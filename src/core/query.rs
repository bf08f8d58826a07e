use crate::core::reproject::{transform_envelope, DENSIFY_POINTS_PER_EDGE};
use crate::domain::crs::Envelope;
use crate::domain::model::{OwsType, RemoteSchema, ResolvedRequest};
use crate::domain::query::{Filter, LiteralGeometry, SpatialQuery};
use crate::utils::error::Result;

/// Builds the server side query for a resolved WFS request.
///
/// Only WFS requests reach this point, `WfsExtractor::extract` rejects
/// every other service type before connecting.
pub fn build_query(resolved: &ResolvedRequest, schema: &RemoteSchema) -> Result<SpatialQuery> {
    let request = resolved.request();
    debug_assert_eq!(request.ows_type, OwsType::Wfs);

    let filter = intersects_filter(&request.bbox, schema)?;

    Ok(SpatialQuery {
        type_name: resolved.wfs_name().to_string(),
        filter,
        properties: select_properties(schema),
        reproject_to: request.projection,
    })
}

/// `schema.geometry_attribute` intersects `bbox`, with the bbox moved into
/// the native CRS of the layer when the schema declares one.
pub fn intersects_filter(bbox: &Envelope, schema: &RemoteSchema) -> Result<Filter> {
    // bbox may not be in the same projection as the data
    let bbox = match schema.native_crs {
        Some(native) => transform_envelope(bbox, native, DENSIFY_POINTS_PER_EDGE)?,
        None => *bbox,
    };

    let literal = LiteralGeometry::from_envelope(&bbox);
    tracing::debug!(
        "Intersects filter on {} with bbox {:?} ({})",
        schema.geometry_attribute,
        literal.bounds(),
        literal.epsg_code
    );

    Ok(Filter::Intersects {
        property: schema.geometry_attribute.clone(),
        literal,
    })
}

/// Every attribute except geometries other than the default one: the output
/// formats hold a single geometry column.
pub fn select_properties(schema: &RemoteSchema) -> Vec<String> {
    schema
        .attributes
        .iter()
        .filter(|attribute| !attribute.is_geometry() || attribute.name == schema.geometry_attribute)
        .map(|attribute| attribute.name.clone())
        .collect()
}
