//! Meridian Scaleway Provider
//!
//! Scaleway resources and data sources for the Meridian host. Identifiers are
//! stored with the zone or region they live in (`fr-par-1/<uuid>`), every API
//! call goes through a retrying transport, and handlers wait for remote
//! objects to settle before reporting state.

pub mod api;
pub mod client;
pub mod config;
pub mod data_sources;
pub mod datasource;
pub mod diff_policy;
pub mod envelope;
pub mod errors;
pub mod locality;
pub mod provider;
pub mod resources;
pub mod scope;
pub mod transport;
pub mod waiter;

#[cfg(test)]
mod test_support;

pub use provider::ScalewayProvider;
