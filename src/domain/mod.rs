// Domain layer: record model and ports. Adapters and config live outside.

pub mod model;
pub mod ports;
