//! Datasource - Derive data-source schemas from resource schemas
//!
//! A data source exposes the same attribute surface as its resource, with
//! every attribute reported by the provider. Lookup keys are re-marked as
//! optional afterwards with [`fix_datasource_schema_flags`].

use crate::schema::{AttributeSchema, AttributeType, ResourceSchema};

/// Derive a data-source schema from a resource schema.
///
/// Every attribute becomes computed; required, force-new, validators,
/// defaults, diff-suppression and item bounds are cleared. Types and
/// descriptions are preserved, recursing into nested blocks.
pub fn datasource_schema_from_resource_schema(resource: &ResourceSchema) -> ResourceSchema {
    let mut derived = ResourceSchema::new(resource.resource_type.clone());
    derived.description = resource.description.clone();

    for attr in resource.attributes.values() {
        derived = derived.attribute(datasource_attribute(attr));
    }

    derived
}

fn datasource_attribute(attr: &AttributeSchema) -> AttributeSchema {
    let mut derived = AttributeSchema::new(attr.name.clone(), datasource_type(&attr.attr_type));
    derived.computed = true;
    derived.description = attr.description.clone();
    derived.sensitive = attr.sensitive;
    derived.api_field = attr.api_field.clone();
    derived
}

fn datasource_type(attr_type: &AttributeType) -> AttributeType {
    match attr_type {
        AttributeType::List(inner) => AttributeType::List(Box::new(datasource_type(inner))),
        AttributeType::Set(inner) => AttributeType::Set(Box::new(datasource_type(inner))),
        AttributeType::Block(block) => {
            AttributeType::Block(Box::new(datasource_schema_from_resource_schema(block)))
        }
        other => other.clone(),
    }
}

/// Re-mark lookup keys on a derived schema.
///
/// With `required` the keys must be set by the user; otherwise they become
/// optional and stay computed so the provider can fill them in.
pub fn fix_datasource_schema_flags(schema: &mut ResourceSchema, required: bool, keys: &[&str]) {
    for key in keys {
        if let Some(attr) = schema.attributes.get_mut(*key) {
            if required {
                attr.required = true;
                attr.optional = false;
                attr.computed = false;
            } else {
                attr.required = false;
                attr.optional = true;
                attr.computed = true;
            }
        }
    }
}

/// Add an attribute to a derived schema (e.g. the `<kind>_id` lookup key)
pub fn add_optional_field(schema: &mut ResourceSchema, attr: AttributeSchema) {
    schema.attributes.insert(attr.name.clone(), attr.optional());
}
