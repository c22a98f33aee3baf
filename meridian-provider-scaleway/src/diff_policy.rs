//! Diff suppression and plan-time locality checks
//!
//! The suppressors match the core `DiffSuppressFn` signature and are attached
//! to attributes in resource schemas. The locality check is a custom-diff hook
//! rejecting cross-resource references whose scope does not match the
//! resource's own scope.

use std::sync::Arc;

use chrono::DateTime;
use meridian_core::provider::CustomizeDiffFn;
use meridian_core::resource::{ResourceData, Value};

use crate::locality::{compare_localities, expand_id, parse_localized_id, parse_localized_nested_id};
use crate::scope::ClientDefaults;

/// Identifiers differing only by their scope prefix are equal
pub fn diff_suppress_func_locality(_key: &str, old: &Value, new: &Value) -> bool {
    match (old, new) {
        (Value::String(old), Value::String(new)) => expand_id(old) == expand_id(new),
        _ => false,
    }
}

/// Case-insensitive comparison for cloud enum values (e.g. commercial types)
pub fn diff_suppress_func_ignore_case(_key: &str, old: &Value, new: &Value) -> bool {
    match (old, new) {
        (Value::String(old), Value::String(new)) => old.eq_ignore_ascii_case(new),
        _ => false,
    }
}

/// RFC 3339 timestamps designating the same instant are equal
pub fn diff_suppress_func_time_rfc3339(_key: &str, old: &Value, new: &Value) -> bool {
    let (Some(old), Some(new)) = (old.as_str(), new.as_str()) else {
        return false;
    };
    match (DateTime::parse_from_rfc3339(old), DateTime::parse_from_rfc3339(new)) {
        (Ok(old), Ok(new)) => old == new,
        _ => false,
    }
}

/// Expand every `#` segment of `key` into the indices of the list it designates
fn expand_key(d: &ResourceData, key: &str) -> Vec<String> {
    let Some((prefix, rest)) = key.split_once(".#") else {
        return vec![key.to_string()];
    };

    let count = d
        .get_path(&format!("{}.#", prefix))
        .and_then(|v| v.as_int())
        .unwrap_or(0);

    (0..count)
        .flat_map(|i| expand_key(d, &format!("{}.{}{}", prefix, i, rest)))
        .collect()
}

/// Scope of the resource: from its identifier, else from its zone/region, else the client default
fn resource_locality(d: &ResourceData, defaults: &ClientDefaults) -> Option<String> {
    if !d.is_gone() {
        if let Ok(id) = parse_localized_id(d.id()) {
            return Some(id.locality);
        }
        if let Ok(id) = parse_localized_nested_id(d.id()) {
            return Some(id.locality);
        }
    }
    d.get_string("zone")
        .or_else(|| d.get_string("region"))
        .map(str::to_string)
        .or_else(|| defaults.zone.as_ref().map(|z| z.to_string()))
        .or_else(|| defaults.region.as_ref().map(|r| r.to_string()))
}

/// Custom-diff hook checking that every identifier stored under `keys` lives
/// in a scope compatible with the resource's. Keys may use `#` for "every
/// index of this list" (e.g. `private_network.#.private_network_id`).
/// Unscoped identifiers are accepted as-is.
pub fn customize_diff_locality_check(keys: &[&str], defaults: ClientDefaults) -> CustomizeDiffFn {
    let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();

    Arc::new(move |d: &ResourceData| {
        let Some(locality) = resource_locality(d, &defaults) else {
            return Ok(());
        };

        for key in &keys {
            for path in expand_key(d, key) {
                let Some(Value::String(value)) = d.get_path(&path) else {
                    continue;
                };
                let Ok(parsed) = parse_localized_id(&value) else {
                    continue;
                };
                if !compare_localities(&parsed.locality, &locality) {
                    return Err(format!(
                        "given {} {} has different locality than the resource \"{}\"",
                        key, value, locality
                    ));
                }
            }
        }
        Ok(())
    })
}
