//! Locality-tagged identifiers
//!
//! Every resource identifier persisted in state embeds its scope:
//! `<zone>/<uuid>`, `<region>/<uuid>`, or `<scope>/<inner>/<outer>` for
//! resources that are only unique within a parent. This module parses and
//! formats those identifiers and classifies scopes as zones or regions.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

/// Known zones
pub const ALL_ZONES: &[&str] = &[
    "fr-par-1", "fr-par-2", "fr-par-3", "nl-ams-1", "nl-ams-2", "nl-ams-3", "pl-waw-1",
    "pl-waw-2", "pl-waw-3",
];

/// Known regions
pub const ALL_REGIONS: &[&str] = &["fr-par", "nl-ams", "pl-waw"];

static ZONE_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}-[a-z]{3}-[0-9]+$").expect("valid zone regex"));
static REGION_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}-[a-z]{3}$").expect("valid region regex"));

/// Error raised for unparsable identifiers or scopes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocalityError {
    #[error("cant parse localized id: {0}")]
    InvalidId(String),

    #[error("bad zone format '{0}', available zones are: {zones}", zones = ALL_ZONES.join(", "))]
    InvalidZone(String),

    #[error("bad region format '{0}', available regions are: {regions}", regions = ALL_REGIONS.join(", "))]
    InvalidRegion(String),
}

/// A zone, the finest locality (a single datacenter)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Zone(String);

impl Zone {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The region this zone belongs to (`fr-par-1` -> `fr-par`)
    pub fn region(&self) -> Region {
        let region = self
            .0
            .rsplit_once('-')
            .map(|(region, _)| region)
            .unwrap_or(&self.0);
        Region(region.to_string())
    }

    /// Returns true when the zone is part of the known catalog
    pub fn is_known(&self) -> bool {
        ALL_ZONES.contains(&self.0.as_str())
    }
}

impl FromStr for Zone {
    type Err = LocalityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if ZONE_FORMAT.is_match(s) {
            Ok(Zone(s.to_string()))
        } else {
            Err(LocalityError::InvalidZone(s.to_string()))
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A region, a group of zones
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region(String);

impl Region {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Known zones of this region
    pub fn zones(&self) -> Vec<Zone> {
        all_zones()
            .into_iter()
            .filter(|z| z.region() == *self)
            .collect()
    }

    pub fn is_known(&self) -> bool {
        ALL_REGIONS.contains(&self.0.as_str())
    }
}

impl FromStr for Region {
    type Err = LocalityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if REGION_FORMAT.is_match(s) {
            Ok(Region(s.to_string()))
        } else {
            Err(LocalityError::InvalidRegion(s.to_string()))
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A scope classified as zone or region
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locality {
    Zone(Zone),
    Region(Region),
}

impl Locality {
    /// Classify a scope string; `None` when it is neither a zone nor a region
    pub fn classify(s: &str) -> Option<Self> {
        if let Ok(zone) = s.parse() {
            Some(Locality::Zone(zone))
        } else {
            s.parse().ok().map(Locality::Region)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Locality::Zone(z) => z.as_str(),
            Locality::Region(r) => r.as_str(),
        }
    }
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn all_zones() -> Vec<Zone> {
    ALL_ZONES.iter().map(|z| Zone(z.to_string())).collect()
}

pub fn all_regions() -> Vec<Region> {
    ALL_REGIONS.iter().map(|r| Region(r.to_string())).collect()
}

/// Identifier of a resource unique within a scope: `<scope>/<id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalizedId {
    pub locality: String,
    pub id: String,
}

impl fmt::Display for LocalizedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.locality, self.id)
    }
}

/// Identifier of a resource unique within a parent: `<scope>/<inner>/<outer>`
///
/// `outer` keeps any embedded slashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NestedId {
    pub locality: String,
    pub inner: String,
    pub outer: String,
}

impl fmt::Display for NestedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.outer.is_empty() {
            write!(f, "{}/{}", self.locality, self.inner)
        } else {
            write!(f, "{}/{}/{}", self.locality, self.inner, self.outer)
        }
    }
}

/// A possibly unscoped zoned identifier accepted at input boundaries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZonedId {
    pub zone: Option<Zone>,
    pub id: String,
}

impl fmt::Display for ZonedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.zone {
            Some(zone) => write!(f, "{}/{}", zone, self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// A possibly unscoped regional identifier accepted at input boundaries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionalId {
    pub region: Option<Region>,
    pub id: String,
}

impl fmt::Display for RegionalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}/{}", region, self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// Split `<scope>/<id>`; exactly two components are required
pub fn parse_localized_id(s: &str) -> Result<LocalizedId, LocalityError> {
    let parts: Vec<&str> = s.split('/').collect();
    match parts.as_slice() {
        [locality, id] => Ok(LocalizedId {
            locality: locality.to_string(),
            id: id.to_string(),
        }),
        _ => Err(LocalityError::InvalidId(s.to_string())),
    }
}

/// Split `<scope>/<inner>/<outer...>`; three or more components are required
pub fn parse_localized_nested_id(s: &str) -> Result<NestedId, LocalityError> {
    let mut parts = s.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(locality), Some(inner), Some(outer)) => Ok(NestedId {
            locality: locality.to_string(),
            inner: inner.to_string(),
            outer: outer.to_string(),
        }),
        _ => Err(LocalityError::InvalidId(s.to_string())),
    }
}

/// Accept either `<scope>/<inner>` or `<scope>/<inner>/<outer>`; the former yields an empty outer
pub fn parse_localized_nested_owner_id(s: &str) -> Result<NestedId, LocalityError> {
    let parts: Vec<&str> = s.split('/').collect();
    match parts.as_slice() {
        [locality, inner] => Ok(NestedId {
            locality: locality.to_string(),
            inner: inner.to_string(),
            outer: String::new(),
        }),
        [locality, inner, outer] => Ok(NestedId {
            locality: locality.to_string(),
            inner: inner.to_string(),
            outer: outer.to_string(),
        }),
        _ => Err(LocalityError::InvalidId(s.to_string())),
    }
}

pub fn parse_zoned_id(s: &str) -> Result<(Zone, String), LocalityError> {
    let LocalizedId { locality, id } = parse_localized_id(s)?;
    Ok((locality.parse()?, id))
}

pub fn parse_regional_id(s: &str) -> Result<(Region, String), LocalityError> {
    let LocalizedId { locality, id } = parse_localized_id(s)?;
    Ok((locality.parse()?, id))
}

/// Returns (zone, inner, outer)
pub fn parse_zoned_nested_id(s: &str) -> Result<(Zone, String, String), LocalityError> {
    let NestedId {
        locality,
        inner,
        outer,
    } = parse_localized_nested_id(s)?;
    Ok((locality.parse()?, inner, outer))
}

/// Returns (region, inner, outer)
pub fn parse_regional_nested_id(s: &str) -> Result<(Region, String, String), LocalityError> {
    let NestedId {
        locality,
        inner,
        outer,
    } = parse_localized_nested_id(s)?;
    Ok((locality.parse()?, inner, outer))
}

pub fn new_zoned_id(zone: &Zone, id: &str) -> String {
    format!("{}/{}", zone, id)
}

pub fn new_regional_id(region: &Region, id: &str) -> String {
    format!("{}/{}", region, id)
}

/// `<zone>/<inner>/<outer>`, the inverse of [`parse_zoned_nested_id`]
pub fn new_zoned_nested_id(zone: &Zone, inner: &str, outer: &str) -> String {
    format!("{}/{}/{}", zone, inner, outer)
}

/// `<region>/<inner>/<outer>`, the inverse of [`parse_regional_nested_id`]
pub fn new_regional_nested_id(region: &Region, inner: &str, outer: &str) -> String {
    format!("{}/{}/{}", region, inner, outer)
}

/// Strip the scope from a localized identifier; anything else is returned unchanged
pub fn expand_id(s: &str) -> &str {
    match s.split_once('/') {
        Some((_, id)) if !id.contains('/') => id,
        _ => s,
    }
}

/// Parse an identifier that may or may not carry a zone
pub fn expand_zoned_id(s: &str) -> ZonedId {
    match parse_localized_id(s) {
        Ok(LocalizedId { locality, id }) => ZonedId {
            zone: locality.parse().ok(),
            id,
        },
        Err(_) => ZonedId {
            zone: None,
            id: s.to_string(),
        },
    }
}

/// Parse an identifier that may or may not carry a region
pub fn expand_regional_id(s: &str) -> RegionalId {
    match parse_localized_id(s) {
        Ok(LocalizedId { locality, id }) => RegionalId {
            region: locality.parse().ok(),
            id,
        },
        Err(_) => RegionalId {
            region: None,
            id: s.to_string(),
        },
    }
}

/// Compose the identifier of a referenced entity using the referencing resource's zone.
/// Empty identifiers stay empty so that unset references are not reported as drift.
pub fn flatten_zoned_id(zone: &Zone, id: &str) -> String {
    if id.is_empty() {
        String::new()
    } else {
        new_zoned_id(zone, expand_id(id))
    }
}

pub fn flatten_regional_id(region: &Region, id: &str) -> String {
    if id.is_empty() {
        String::new()
    } else {
        new_regional_id(region, expand_id(id))
    }
}

/// Two scopes are compatible when equal or when one is a prefix of the other
/// (a zone is contained in its region).
pub fn compare_localities(a: &str, b: &str) -> bool {
    a == b || a.starts_with(b) || b.starts_with(a)
}
