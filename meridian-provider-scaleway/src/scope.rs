//! Scope resolution
//!
//! The effective zone or region of an operation comes from the resource's
//! `zone`/`region` attribute when set, otherwise from the client defaults.

use meridian_core::resource::ResourceData;

use crate::errors::{ScalewayError, ScalewayResult};
use crate::locality::{Region, Zone};

/// Defaults carried by the API client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientDefaults {
    pub zone: Option<Zone>,
    pub region: Option<Region>,
    pub project_id: Option<String>,
    pub organization_id: Option<String>,
}

/// Where the effective scope came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeSource {
    UserAttribute,
    ClientDefault,
}

/// Effective scope of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeDecision<T> {
    pub scope: T,
    pub source: ScopeSource,
}

impl<T> ScopeDecision<T> {
    fn from_user(scope: T) -> Self {
        Self {
            scope,
            source: ScopeSource::UserAttribute,
        }
    }

    fn from_default(scope: T) -> Self {
        Self {
            scope,
            source: ScopeSource::ClientDefault,
        }
    }
}

/// Zone of the operation: `zone` attribute, then the client default
pub fn extract_zone(d: &ResourceData, defaults: &ClientDefaults) -> ScalewayResult<ScopeDecision<Zone>> {
    if let Some(zone) = d.get_string("zone") {
        return Ok(ScopeDecision::from_user(zone.parse::<Zone>()?));
    }
    defaults
        .zone
        .clone()
        .map(ScopeDecision::from_default)
        .ok_or(ScalewayError::ScopeNotFound("zone"))
}

/// Region of the operation: `region` attribute, then the client default
pub fn extract_region(
    d: &ResourceData,
    defaults: &ClientDefaults,
) -> ScalewayResult<ScopeDecision<Region>> {
    extract_region_with_default(d, defaults, None)
}

/// Region of the operation: `region` attribute, then `fallback`, then the client default
pub fn extract_region_with_default(
    d: &ResourceData,
    defaults: &ClientDefaults,
    fallback: Option<&Region>,
) -> ScalewayResult<ScopeDecision<Region>> {
    if let Some(region) = d.get_string("region") {
        return Ok(ScopeDecision::from_user(region.parse::<Region>()?));
    }
    if let Some(region) = fallback {
        return Ok(ScopeDecision::from_user(region.clone()));
    }
    defaults
        .region
        .clone()
        .map(ScopeDecision::from_default)
        .ok_or(ScalewayError::ScopeNotFound("region"))
}

/// `project_id` attribute, then the client default
pub fn extract_project_id(d: &ResourceData, defaults: &ClientDefaults) -> Option<String> {
    d.get_string("project_id")
        .map(str::to_string)
        .or_else(|| defaults.project_id.clone())
}
