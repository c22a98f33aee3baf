//! Meridian Core
//!
//! Contracts shared between the host runtime and provider plugins:
//! attribute values and the per-operation `ResourceData` handle, attribute
//! schemas, diagnostics, the resource and data-source contracts, and the
//! plan differ that applies diff-suppression and custom-diff hooks.

pub mod datasource;
pub mod diagnostics;
pub mod differ;
pub mod provider;
pub mod resource;
pub mod schema;
