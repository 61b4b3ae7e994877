//! HealthBite admin REST API: client, payload types and list sources.

pub mod api_types;
pub mod client;
pub mod sources;
pub mod types;

pub use client::AdminClient;
