//! Reconciliation helpers shared by every resource
//!
//! Tombstoning on missing resources, request shaping for partial updates,
//! association set-difference, table-driven flattening and the guards around
//! destructive update paths.

use std::collections::HashSet;
use std::future::Future;
use std::time::{Duration, Instant};

use meridian_core::diagnostics::{Diagnostic, Diagnostics};
use meridian_core::provider::{OperationContext, Timeouts};
use meridian_core::resource::{ResourceData, Value};
use meridian_core::schema::ResourceSchema;
use serde::{Serialize, Serializer};

use crate::errors::{ErrorKind, ScalewayError, ScalewayResult};
use crate::locality::expand_id;
use crate::waiter::Domain;

/// Which errors mean "the remote resource is gone" on read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GonePolicy {
    /// 404 and 410
    NotFound,
    /// 404, 410 and 403, for resources revoked with a 403
    NotFoundOrForbidden,
}

impl GonePolicy {
    pub fn is_gone(self, err: &ScalewayError) -> bool {
        match self {
            GonePolicy::NotFound => err.is_not_found(),
            GonePolicy::NotFoundOrForbidden => err.is_gone_or_forbidden(),
        }
    }
}

/// Empty the identifier so the host drops the resource from state
pub fn tombstone(d: &mut ResourceData) {
    log::info!("{} {} not found, removing from state", d.resource_type(), d.id());
    d.set_id("");
}

/// Outcome of a read: `Ok(None)` when the resource was tombstoned
pub fn read_or_tombstone<T>(
    d: &mut ResourceData,
    result: ScalewayResult<T>,
    policy: GonePolicy,
) -> ScalewayResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if policy.is_gone(&e) => {
            tombstone(d);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// A delete that finds nothing to delete succeeded
pub fn ignore_not_found(result: ScalewayResult<()>) -> ScalewayResult<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

/// Downgrade the given error kinds to a warning diagnostic
pub fn downgrade_to_warning(
    result: ScalewayResult<()>,
    kinds: &[ErrorKind],
    summary: &str,
    diags: &mut Diagnostics,
) -> ScalewayResult<()> {
    match result {
        Err(e) if kinds.contains(&e.kind()) => {
            log::warn!("{}: {}", summary, e);
            diags.warn(summary, e.to_string());
            Ok(())
        }
        other => other,
    }
}

/// Default timeouts of a domain
pub fn default_timeouts(domain: Domain) -> Timeouts {
    Timeouts::uniform(domain.timeout())
}

/// Optional field of an update request
///
/// `Omit` leaves the field out of the request, `Clear` sends an explicit
/// null, `Set` sends the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Omit,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_omit(&self) -> bool {
        matches!(self, Patch::Omit)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            _ => None,
        }
    }
}

impl Patch<String> {
    /// `Omit` when unchanged, `Clear` when emptied, `Set` otherwise
    pub fn string_change(d: &ResourceData, key: &str) -> Self {
        if !d.has_change(key) {
            return Patch::Omit;
        }
        match d.get_string(key) {
            Some(value) => Patch::Set(value.to_string()),
            None => Patch::Clear,
        }
    }
}

impl Patch<Vec<String>> {
    /// `Omit` when unchanged; an emptied list is sent as an empty list
    pub fn list_change(d: &ResourceData, key: &str) -> Self {
        if d.has_change(key) {
            Patch::Set(d.get_string_list(key))
        } else {
            Patch::Omit
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Set(value) => value.serialize(serializer),
            Patch::Clear | Patch::Omit => serializer.serialize_none(),
        }
    }
}

/// `tf-<prefix>-<random>`
pub fn new_random_name(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("tf-{}-{}", prefix, &suffix[..8])
}

/// Name from the attribute, or a generated one
pub fn name_or_random(d: &ResourceData, prefix: &str) -> String {
    d.get_string("name")
        .map(str::to_string)
        .unwrap_or_else(|| new_random_name(prefix))
}

/// String elements of a list value
pub fn expand_strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_list)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Strip the scope from each identifier
pub fn expand_ids<S: AsRef<str>>(ids: &[S]) -> Vec<String> {
    ids.iter().map(|id| expand_id(id.as_ref()).to_string()).collect()
}

/// Split an association update into `(to_delete, to_add)`.
///
/// Elements are compared without their scope prefix; order is preserved.
pub fn diff_associations(current: &[String], desired: &[String]) -> (Vec<String>, Vec<String>) {
    let current_ids: HashSet<&str> = current.iter().map(|id| expand_id(id)).collect();
    let desired_ids: HashSet<&str> = desired.iter().map(|id| expand_id(id)).collect();

    let to_delete = current
        .iter()
        .filter(|id| !desired_ids.contains(expand_id(id)))
        .cloned()
        .collect();
    let to_add = desired
        .iter()
        .filter(|id| !current_ids.contains(expand_id(id)))
        .cloned()
        .collect();

    (to_delete, to_add)
}

/// Copy every attribute with an `api_field` from an API response.
///
/// Missing or null fields are skipped, so optional sub-fields never fail a read.
pub fn flatten_with_schema(schema: &ResourceSchema, response: &serde_json::Value, d: &mut ResourceData) {
    for (name, attr) in &schema.attributes {
        let Some(field) = &attr.api_field else {
            continue;
        };
        if let Some(value) = response.get(field).and_then(Value::from_json) {
            d.set(name.clone(), value);
        }
    }
}

/// Serialize an API model and flatten it with [`flatten_with_schema`]
pub fn flatten_model<M: Serialize>(schema: &ResourceSchema, model: &M, d: &mut ResourceData) -> ScalewayResult<()> {
    let response = serde_json::to_value(model)?;
    flatten_with_schema(schema, &response, d);
    Ok(())
}

/// Warning for a change to `keys` that needs `guard` set to be applied.
/// Returns `None` when nothing changed or the guard is set.
pub fn guarded_change(d: &ResourceData, keys: &[&str], guard: &str, action: &str) -> Option<Diagnostic> {
    if !d.has_changes(keys) || d.get_bool(guard) {
        return None;
    }
    Some(
        Diagnostic::warning(format!("Changes have been made on {}", keys.join(", ")))
            .with_detail(format!(
                "they require the resource to {}; set {} = true to apply them",
                action, guard
            ))
            .with_attribute(guard),
    )
}

/// Repeat `action` while it fails because the reverse DNS record does not
/// resolve yet, until it succeeds, `timeout` elapses or `ctx` is cancelled
pub async fn retry_update_reverse<F, Fut>(
    ctx: &OperationContext,
    mut action: F,
    timeout: Duration,
    interval: Duration,
) -> ScalewayResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ScalewayResult<()>>,
{
    let started = Instant::now();
    loop {
        match action().await {
            Err(e) if e.is_reverse_invalid_argument() && started.elapsed() < timeout => {
                log::debug!("reverse DNS not resolvable yet, retrying in {:?}", interval);
                let pause = async {
                    if interval.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(interval).await;
                    }
                };
                tokio::select! {
                    _ = pause => {}
                    _ = ctx.cancelled() => {
                        return Err(ScalewayError::Cancelled("updating the reverse DNS record".to_string()));
                    }
                }
            }
            other => return other,
        }
    }
}
