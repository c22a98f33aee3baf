//! Differ - Compare planned configuration with prior state
//!
//! Computes which attributes of a resource changed, honoring per-attribute
//! diff-suppression and force-new flags, then runs the resource's custom-diff
//! hooks on the planned values. The resulting [`PlannedChange`] carries the
//! `ResourceData` handed to the update handler, so that `has_change` only
//! reports changes that survived suppression.

use std::collections::HashMap;

use crate::provider::{ProviderError, ProviderResult, ResourceAddress, ResourceContract};
use crate::resource::{ResourceData, Value};
use crate::schema::{AttributeSchema, ResourceSchema};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create,
    /// Resource exists with differences -> needs update
    Update { changed_attributes: Vec<String> },
    /// A force-new attribute changed -> delete then create
    Replace { forced_by: Vec<String> },
    /// Resource exists with no differences -> no action needed
    NoChange,
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange)
    }
}

/// Outcome of planning one resource
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub diff: Diff,
    /// Handle carrying prior state and planned values
    pub data: ResourceData,
}

/// Returns true when `old` and `new` are equal for plan purposes
fn values_equivalent(key: &str, schema: Option<&AttributeSchema>, old: &Value, new: &Value) -> bool {
    if old == new {
        return true;
    }

    let Some(schema) = schema else {
        return false;
    };

    if let Some(suppress) = schema.diff_suppress
        && suppress(key, old, new)
    {
        return true;
    }

    // Descend into nested blocks so suppression applies per field
    if let (Some(block), Value::List(old_items), Value::List(new_items)) =
        (schema.block(), old, new)
    {
        return old_items.len() == new_items.len()
            && old_items.iter().zip(new_items).all(|(o, n)| match (o, n) {
                (Value::Map(om), Value::Map(nm)) => {
                    find_changed_attributes(block, om, nm).is_empty()
                }
                _ => o == n,
            });
    }

    // Element-wise suppression for lists of primitives
    if let (Some(suppress), Value::List(old_items), Value::List(new_items)) =
        (schema.diff_suppress, old, new)
    {
        return old_items.len() == new_items.len()
            && old_items
                .iter()
                .zip(new_items)
                .all(|(o, n)| o == n || suppress(key, o, n));
    }

    false
}

/// Find changed attributes between planned values and prior state
fn find_changed_attributes(
    schema: &ResourceSchema,
    prior: &HashMap<String, Value>,
    planned: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, planned_value) in planned {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        let attr = schema.get(key);
        match prior.get(key) {
            Some(prior_value) if values_equivalent(key, attr, prior_value, planned_value) => {}
            None if planned_value.is_zero() => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

/// Compare user configuration with prior state and compute a Diff.
///
/// Attributes the user did not configure keep their prior value (computed
/// attributes are never overwritten by the plan). Attributes whose change is
/// suppressed keep the prior textual value, so a later update sees no change.
pub fn diff(
    schema: &ResourceSchema,
    prior: Option<&ResourceData>,
    config: &HashMap<String, Value>,
) -> PlannedChange {
    let Some(prior) = prior.filter(|p| !p.is_gone()) else {
        let mut data = ResourceData::new(schema.resource_type.clone(), config.clone());
        schema.apply_defaults(&mut data);
        return PlannedChange {
            diff: Diff::Create,
            data,
        };
    };

    let prior_attrs = prior.attributes();
    let mut planned = prior_attrs.clone();
    for (key, value) in config {
        let attr = schema.get(key);
        if attr.is_some_and(AttributeSchema::is_computed_only) {
            continue;
        }
        match prior_attrs.get(key) {
            Some(prior_value) if values_equivalent(key, attr, prior_value, value) => {}
            _ => {
                planned.insert(key.clone(), value.clone());
            }
        }
    }

    // Optional, non-computed attributes removed from the configuration are cleared
    for (name, attr) in &schema.attributes {
        if attr.optional && !attr.computed && !config.contains_key(name) {
            match &attr.default {
                Some(default) => planned.insert(name.clone(), default.clone()),
                None => planned.remove(name),
            };
        }
    }

    let changed = find_changed_attributes(schema, prior_attrs, &planned);
    let removed: Vec<String> = prior_attrs
        .iter()
        .filter(|(k, v)| !planned.contains_key(*k) && !v.is_zero())
        .map(|(k, _)| k.clone())
        .collect();

    let mut changed_attributes = changed;
    changed_attributes.extend(removed);
    changed_attributes.sort();
    changed_attributes.dedup();

    let forced_by: Vec<String> = changed_attributes
        .iter()
        .filter(|k| schema.get(k).is_some_and(|a| a.force_new))
        .cloned()
        .collect();

    let data = ResourceData::existing(
        schema.resource_type.clone(),
        prior.id(),
        prior_attrs.clone(),
        planned,
    );

    let diff = if !forced_by.is_empty() {
        Diff::Replace { forced_by }
    } else if changed_attributes.is_empty() {
        Diff::NoChange
    } else {
        Diff::Update { changed_attributes }
    };

    PlannedChange { diff, data }
}

/// Plan one resource: validate configuration, diff it, and run custom-diff hooks.
///
/// Any failure here is a plan-time error; nothing reaches the cloud.
pub fn plan(
    contract: &dyn ResourceContract,
    prior: Option<&ResourceData>,
    config: &HashMap<String, Value>,
) -> ProviderResult<PlannedChange> {
    let schema = contract.schema();
    let address = ResourceAddress::new(
        contract.type_name(),
        prior.map(|p| p.id().to_string()).unwrap_or_default(),
    );

    schema.validate(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        ProviderError::new(messages.join("; ")).for_resource(address.clone())
    })?;

    let planned = diff(&schema, prior, config);

    for hook in contract.customize_diff() {
        hook(&planned.data).map_err(|message| {
            ProviderError::new(message).for_resource(address.clone())
        })?;
    }

    Ok(planned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeType;

    fn ignore_case(_: &str, old: &Value, new: &Value) -> bool {
        match (old, new) {
            (Value::String(o), Value::String(n)) => o.eq_ignore_ascii_case(n),
            _ => false,
        }
    }

    fn schema() -> ResourceSchema {
        ResourceSchema::new("thing")
            .attribute(AttributeSchema::new("name", AttributeType::String).optional())
            .attribute(
                AttributeSchema::new("type", AttributeType::String)
                    .required()
                    .with_diff_suppress(ignore_case),
            )
            .attribute(
                AttributeSchema::new("zone", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("status", AttributeType::String).computed())
    }

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    fn prior(pairs: &[(&str, &str)]) -> ResourceData {
        ResourceData::from_state("thing", "fr-par-1/abc", attrs(pairs))
    }

    #[test]
    fn diff_create_when_not_exists() {
        let result = diff(&schema(), None, &attrs(&[("type", "gp1-xs")]));
        assert_eq!(result.diff, Diff::Create);

        let mut tombstoned = prior(&[("type", "gp1-xs")]);
        tombstoned.set_id("");
        let result = diff(&schema(), Some(&tombstoned), &attrs(&[("type", "gp1-xs")]));
        assert_eq!(result.diff, Diff::Create);
    }

    #[test]
    fn diff_no_change_when_suppressed() {
        let state = prior(&[("type", "GP1-XS"), ("zone", "fr-par-1"), ("status", "ready")]);
        let result = diff(&schema(), Some(&state), &attrs(&[("type", "gp1-xs")]));
        assert_eq!(result.diff, Diff::NoChange);
        // Suppressed values keep the prior text
        assert_eq!(result.data.get("type"), Some(&Value::from("GP1-XS")));
        assert!(!result.data.has_change("type"));
    }

    #[test]
    fn diff_update_when_different() {
        let state = prior(&[("type", "gp1-xs"), ("name", "web")]);
        let result = diff(
            &schema(),
            Some(&state),
            &attrs(&[("type", "gp1-xs"), ("name", "api")]),
        );
        assert_eq!(
            result.diff,
            Diff::Update {
                changed_attributes: vec!["name".to_string()]
            }
        );
        assert!(result.data.has_change("name"));
    }

    #[test]
    fn removed_optional_attribute_is_a_change() {
        let state = prior(&[("type", "gp1-xs"), ("name", "web")]);
        let result = diff(&schema(), Some(&state), &attrs(&[("type", "gp1-xs")]));
        assert_eq!(
            result.diff,
            Diff::Update {
                changed_attributes: vec!["name".to_string()]
            }
        );
    }

    #[test]
    fn force_new_change_is_a_replace() {
        let state = prior(&[("type", "gp1-xs"), ("zone", "fr-par-1")]);
        let result = diff(
            &schema(),
            Some(&state),
            &attrs(&[("type", "gp1-xs"), ("zone", "nl-ams-1")]),
        );
        assert_eq!(
            result.diff,
            Diff::Replace {
                forced_by: vec!["zone".to_string()]
            }
        );
    }

    #[test]
    fn computed_only_attributes_are_not_planned() {
        let state = prior(&[("type", "gp1-xs"), ("status", "ready")]);
        let result = diff(
            &schema(),
            Some(&state),
            &attrs(&[("type", "gp1-xs"), ("status", "stopped")]),
        );
        assert_eq!(result.diff, Diff::NoChange);
    }

    #[test]
    fn suppression_applies_inside_blocks() {
        let block = ResourceSchema::new("pn").attribute(
            AttributeSchema::new("private_network_id", AttributeType::String)
                .required()
                .with_diff_suppress(ignore_case),
        );
        let schema = ResourceSchema::new("lb").attribute(
            AttributeSchema::new("private_network", AttributeType::list_of(block)).optional(),
        );
        let block_value = |id: &str| {
            Value::List(vec![Value::Map(
                [("private_network_id".to_string(), Value::from(id))]
                    .into_iter()
                    .collect(),
            )])
        };

        let mut state_attrs = HashMap::new();
        state_attrs.insert("private_network".to_string(), block_value("ABC"));
        let state = ResourceData::from_state("lb", "fr-par-1/lb", state_attrs);

        let mut config = HashMap::new();
        config.insert("private_network".to_string(), block_value("abc"));

        let result = diff(&schema, Some(&state), &config);
        assert_eq!(result.diff, Diff::NoChange);
    }
}
