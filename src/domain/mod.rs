// Domain layer: request/schema/query models and the ports the core talks to.

pub mod crs;
pub mod model;
pub mod ports;
pub mod query;
