// Domain layer: tabular and market data models plus ports (interfaces).

pub mod market;
pub mod model;
pub mod ports;
