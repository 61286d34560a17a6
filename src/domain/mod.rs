// Domain layer: API models and the traits the clients are written against.

pub mod model;
pub mod ports;
