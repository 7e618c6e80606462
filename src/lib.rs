// TikiLIVE REST API
//
// Channels and users served through the tikilive-core dispatch pipeline,
// configured by tikilive-config.

pub mod bootstrap;
pub mod controllers;
pub mod entity;
pub mod store;

pub use bootstrap::Kernel;
