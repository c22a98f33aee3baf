//! Data-source lookups
//!
//! A data source either receives the identifier of the object (`<kind>_id`)
//! or finds it by listing with filters and keeping the exact match. The
//! identifier it ends up with is always scoped to the operation's zone or
//! region before the resource read takes over.

use meridian_core::resource::ResourceData;

use crate::errors::{ScalewayError, ScalewayResult};
use crate::locality::{Region, Zone, expand_id, new_regional_id, new_zoned_id};
use crate::scope::{ClientDefaults, extract_region, extract_zone};

/// Keep the single candidate matching `matcher`.
///
/// Zero matches is [`ScalewayError::NotFound`], several is
/// [`ScalewayError::AmbiguousMatch`].
pub fn find_exact<T, F>(candidates: Vec<T>, matcher: F, kind: &str, name: &str) -> ScalewayResult<T>
where
    F: Fn(&T) -> bool,
{
    let mut matches = candidates.into_iter().filter(|candidate| matcher(candidate));
    let Some(found) = matches.next() else {
        return Err(ScalewayError::not_found(kind, name));
    };
    if matches.next().is_some() {
        return Err(ScalewayError::ambiguous(kind, name));
    }
    Ok(found)
}

/// Scope a user-supplied identifier to the zone of the lookup.
///
/// The operation zone is the `zone` attribute, else the client default. An
/// unscoped identifier gets it stamped on and a scoped one is recomposed with it.
pub fn zoned_lookup_id(d: &ResourceData, defaults: &ClientDefaults, raw: &str) -> ScalewayResult<(Zone, String)> {
    let zone = extract_zone(d, defaults)?.scope;
    let id = new_zoned_id(&zone, expand_id(raw));
    Ok((zone, id))
}

/// Regional counterpart of [`zoned_lookup_id`]
pub fn regional_lookup_id(
    d: &ResourceData,
    defaults: &ClientDefaults,
    raw: &str,
) -> ScalewayResult<(Region, String)> {
    let region = extract_region(d, defaults)?.scope;
    let id = new_regional_id(&region, expand_id(raw));
    Ok((region, id))
}

/// Fail a lookup whose resource read tombstoned the identifier
pub fn ensure_found(d: &ResourceData, kind: &str, id: &str) -> ScalewayResult<()> {
    if d.is_gone() {
        return Err(ScalewayError::Gone {
            kind: kind.to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}
