//! Resource - Attribute values and the per-operation resource handle

use std::collections::HashMap;

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns true for the zero value of each kind (empty string, 0, false, empty collections)
    pub fn is_zero(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::Int(n) => *n == 0,
            Value::Bool(b) => !*b,
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
        }
    }

    /// Render the value the way it appears in textual diffs
    pub fn to_diff_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::List(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(Value::to_diff_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Value::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let parts: Vec<String> = keys
                    .into_iter()
                    .map(|k| format!("{} = {}", k, map[k].to_diff_string()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }

    /// Build a list of strings
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::String(s.into())).collect())
    }

    /// Convert a JSON value into an attribute value. `null` and floats without
    /// an integer representation yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n.as_i64().map(Value::Int),
            serde_json::Value::Array(arr) => {
                Some(Value::List(arr.iter().filter_map(Value::from_json).collect()))
            }
            serde_json::Value::Object(obj) => Some(Value::Map(
                obj.iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
            serde_json::Value::Null => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::string_list(items)
    }
}

/// Look up a dotted attribute path (`private_network.0.private_network_id`).
///
/// A trailing `#` segment yields the length of the list it follows.
pub fn lookup_path(attributes: &HashMap<String, Value>, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = attributes.get(first)?.clone();

    for segment in segments {
        current = match (&current, segment) {
            (Value::List(items), "#") => Value::Int(items.len() as i64),
            (Value::Map(map), "%") => Value::Int(map.len() as i64),
            (Value::List(items), index) => items.get(index.parse::<usize>().ok()?)?.clone(),
            (Value::Map(map), key) => map.get(key)?.clone(),
            _ => return None,
        };
    }

    Some(current)
}

/// Per-operation handle on a resource instance.
///
/// Holds the prior state (as last persisted by the host), the current values
/// (planned values on entry, flattened values after a read), and the external
/// identifier. An empty identifier after an operation means the resource is
/// gone and the host should drop it from state.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceData {
    resource_type: String,
    id: String,
    prior: HashMap<String, Value>,
    current: HashMap<String, Value>,
}

impl ResourceData {
    /// Handle for a resource that does not exist yet (create path)
    pub fn new(resource_type: impl Into<String>, planned: HashMap<String, Value>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: String::new(),
            prior: HashMap::new(),
            current: planned,
        }
    }

    /// Handle for an existing resource, with prior state and planned values
    pub fn existing(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        prior: HashMap<String, Value>,
        planned: HashMap<String, Value>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            prior,
            current: planned,
        }
    }

    /// Handle built from a persisted state where nothing is planned to change
    pub fn from_state(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        state: HashMap<String, Value>,
    ) -> Self {
        Self::existing(resource_type, id, state.clone(), state)
    }

    /// Handle built from an identifier alone (import path)
    pub fn imported(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::existing(resource_type, id, HashMap::new(), HashMap::new())
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Returns true when the resource has been tombstoned or was never created
    pub fn is_gone(&self) -> bool {
        self.id.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.current.get(key)
    }

    /// Value at a dotted path, see [`lookup_path`]
    pub fn get_path(&self, path: &str) -> Option<Value> {
        lookup_path(&self.current, path)
    }

    /// Returns the value only when it is set to a non-zero value
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.current.get(key).filter(|v| !v.is_zero())
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get_ok(key).and_then(Value::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.current.get(key).and_then(Value::as_int)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.current
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// String elements of a list attribute; missing or non-list yields an empty vector
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.current
            .get(key)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Map elements of a list-of-blocks attribute
    pub fn get_blocks(&self, key: &str) -> Vec<HashMap<String, Value>> {
        self.current
            .get(key)
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(|v| v.as_map().cloned()).collect())
            .unwrap_or_default()
    }

    /// (prior, current) values of an attribute
    pub fn get_change(&self, key: &str) -> (Option<&Value>, Option<&Value>) {
        (self.prior.get(key), self.current.get(key))
    }

    /// Returns true when the attribute differs between prior and current values.
    /// A missing value and a zero value are treated as equal.
    pub fn has_change(&self, key: &str) -> bool {
        match self.get_change(key) {
            (Some(old), Some(new)) => old != new,
            (None, Some(v)) | (Some(v), None) => !v.is_zero(),
            (None, None) => false,
        }
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(k))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.current.insert(key.into(), value.into());
    }

    /// Set a value only when present; absent optional fields leave the attribute untouched
    pub fn set_opt<V: Into<Value>>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(v) = value {
            self.set(key, v);
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.current.remove(key);
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.current
    }

    pub fn prior_attributes(&self) -> &HashMap<String, Value> {
        &self.prior
    }

    /// Consume the handle, returning the identifier and attributes to persist
    pub fn into_state(self) -> (String, HashMap<String, Value>) {
        (self.id, self.current)
    }
}
