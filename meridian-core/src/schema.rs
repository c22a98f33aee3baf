//! Schema - Attribute schemas for resources and data sources
//!
//! Providers declare one schema per resource type. The host validates user
//! configuration against it before planning, and the differ consults the
//! per-attribute flags (computed, force-new, diff-suppression).

use std::collections::HashMap;
use std::fmt;

use crate::resource::{ResourceData, Value, lookup_path};

/// Validation function attached to an attribute
pub type ValidateFn = fn(&Value) -> Result<(), String>;

/// Diff-suppression predicate: `(key, old, new) -> equal-for-diff`
pub type DiffSuppressFn = fn(&str, &Value, &Value) -> bool;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Ordered list
    List(Box<AttributeType>),
    /// Unordered collection of unique elements
    Set(Box<AttributeType>),
    /// Map with string keys
    Map(Box<AttributeType>),
    /// Nested block (element type of lists and sets of sub-resources)
    Block(Box<ResourceSchema>),
}

impl AttributeType {
    /// List of nested blocks
    pub fn list_of(block: ResourceSchema) -> Self {
        AttributeType::List(Box::new(AttributeType::Block(Box::new(block))))
    }

    /// Set of nested blocks
    pub fn set_of(block: ResourceSchema) -> Self {
        AttributeType::Set(Box::new(AttributeType::Block(Box::new(block))))
    }

    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::List(inner) | AttributeType::Set(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(block), Value::Map(map)) => {
                block.validate(map).map_err(|mut errors| errors.remove(0))
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value_type_name(value),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Set(inner) => format!("Set<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(block) => format!("Block({})", block.resource_type),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

fn value_type_name(value: &Value) -> String {
    match value {
        Value::String(_) => "String".to_string(),
        Value::Int(_) => "Int".to_string(),
        Value::Bool(_) => "Bool".to_string(),
        Value::List(_) => "List".to_string(),
        Value::Map(_) => "Map".to_string(),
    }
}

/// Type error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Invalid value for '{name}': {message}")]
    ValidationFailed { name: String, message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedOnly { name: String },

    #[error("Attributes '{name}' and '{other}' conflict, set only one of them")]
    Conflict { name: String, other: String },

    #[error("Attribute '{name}' expects between {min} and {max} items, got {got}")]
    ItemCount {
        name: String,
        min: usize,
        max: usize,
        got: usize,
    },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub validate: Option<ValidateFn>,
    pub diff_suppress: Option<DiffSuppressFn>,
    pub conflicts_with: Vec<String>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    /// API-side field name, used by table-driven flattening
    pub api_field: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            description: None,
            validate: None,
            diff_suppress: None,
            conflicts_with: Vec::new(),
            min_items: None,
            max_items: None,
            api_field: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_validator(mut self, validate: ValidateFn) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn with_diff_suppress(mut self, suppress: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(suppress);
        self
    }

    pub fn conflicts_with(mut self, keys: &[&str]) -> Self {
        self.conflicts_with = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_item_bounds(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_items = min;
        self.max_items = max;
        self
    }

    pub fn with_api_field(mut self, name: impl Into<String>) -> Self {
        self.api_field = Some(name.into());
        self
    }

    /// Attribute can only be reported by the provider, never set by the user
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    /// Nested block schema for list/set-of-block attributes
    pub fn block(&self) -> Option<&ResourceSchema> {
        match &self.attr_type {
            AttributeType::List(inner) | AttributeType::Set(inner) => match inner.as_ref() {
                AttributeType::Block(block) => Some(block),
                _ => None,
            },
            AttributeType::Block(block) => Some(block),
            _ => None,
        }
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    /// Schema of the attribute addressed by a dotted path, descending into blocks
    pub fn attribute_at(&self, path: &str) -> Option<&AttributeSchema> {
        let mut segments = path.split('.').filter(|s| s.parse::<usize>().is_err());
        let mut current = self.attributes.get(segments.next()?)?;
        for segment in segments {
            current = current.block()?.attributes.get(segment)?;
        }
        Some(current)
    }

    /// Validate user-supplied attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        for (name, schema) in &self.attributes {
            let value = attributes.get(name).filter(|v| !v.is_zero());

            if schema.required && value.is_none() && schema.default.is_none() {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }

            let Some(value) = value else {
                continue;
            };

            if schema.is_computed_only() {
                errors.push(TypeError::ComputedOnly { name: name.clone() });
                continue;
            }

            for other in &schema.conflicts_with {
                if lookup_path(attributes, other).is_some_and(|v| !v.is_zero()) {
                    let mutual = self
                        .attributes
                        .get(other)
                        .is_some_and(|o| o.conflicts_with.contains(name));
                    // Report each pair once
                    if name < other || !mutual {
                        errors.push(TypeError::Conflict {
                            name: name.clone(),
                            other: other.clone(),
                        });
                    }
                }
            }

            if let Value::List(items) = value {
                let min = schema.min_items.unwrap_or(0);
                let max = schema.max_items.unwrap_or(usize::MAX);
                if items.len() < min || items.len() > max {
                    errors.push(TypeError::ItemCount {
                        name: name.clone(),
                        min,
                        max,
                        got: items.len(),
                    });
                }
            }
        }

        for (name, value) in attributes {
            let Some(schema) = self.attributes.get(name) else {
                // Unknown attributes are allowed (for flexibility)
                continue;
            };
            if let Err(e) = schema.attr_type.validate(value) {
                errors.push(e);
                continue;
            }
            if let Some(validate) = schema.validate
                && !value.is_zero()
                && let Err(message) = validate(value)
            {
                errors.push(TypeError::ValidationFailed {
                    name: name.clone(),
                    message,
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Fill defaults for attributes the user left unset
    pub fn apply_defaults(&self, d: &mut ResourceData) {
        for (name, schema) in &self.attributes {
            if let Some(default) = &schema.default
                && d.get(name).is_none()
            {
                d.set(name.clone(), default.clone());
            }
        }
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// List of strings
    pub fn string_list() -> AttributeType {
        AttributeType::List(Box::new(AttributeType::String))
    }

    /// Positive integer validator
    pub fn positive_int(value: &Value) -> Result<(), String> {
        match value {
            Value::Int(n) if *n > 0 => Ok(()),
            Value::Int(_) => Err("Value must be positive".to_string()),
            _ => Err("Expected integer".to_string()),
        }
    }
}

/// Validate CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let Some((ip, prefix)) = cidr.split_once('/') else {
        return Err(format!("Invalid CIDR format '{}': expected IP/prefix", cidr));
    };

    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("Invalid IP address '{}': expected 4 octets", ip));
    }
    for octet in &octets {
        if octet.parse::<u8>().is_err() {
            return Err(format!(
                "Invalid octet '{}' in IP address: must be 0-255",
                octet
            ));
        }
    }

    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok(()),
        Ok(p) => Err(format!("Invalid prefix length '{}': must be 0-32", p)),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}
