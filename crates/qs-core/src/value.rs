use serde::{Deserialize, Serialize};

/// The engine's tagged dynamic value representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DynamicValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Array(DynArray),
}

impl DynamicValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&DynArray> {
        match self {
            Self::Array(value) => Some(value),
            _ => None,
        }
    }
}

/// One slot of a [`DynArray`]. `key` is `None` for positional entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynEntry {
    pub key: Option<String>,
    pub value: DynamicValue,
}

/// An ordered sequence in which any entry may also carry a string key.
///
/// Positional and keyed entries coexist in one value: sequence consumers
/// iterate every entry in insertion order, mapping consumers look entries
/// up by key. `set` on an existing key replaces the value without moving
/// the entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynArray {
    entries: Vec<DynEntry>,
}

impl DynArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional entry.
    pub fn push(&mut self, value: DynamicValue) {
        self.entries.push(DynEntry { key: None, value });
    }

    /// Inserts or replaces the entry stored under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: DynamicValue) {
        let key = key.into();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.key.as_deref() == Some(key.as_str()))
        {
            entry.value = value;
            return;
        }
        self.entries.push(DynEntry {
            key: Some(key),
            value,
        });
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.entries
            .iter()
            .find(|entry| entry.key.as_deref() == Some(key))
            .map(|entry| &entry.value)
    }

    pub fn get_index(&self, index: usize) -> Option<&DynamicValue> {
        self.entries.get(index).map(|entry| &entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DynEntry] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| entry.key.as_deref())
    }

    pub fn values(&self) -> impl Iterator<Item = &DynamicValue> {
        self.entries.iter().map(|entry| &entry.value)
    }
}

impl From<DynArray> for DynamicValue {
    fn from(value: DynArray) -> Self {
        Self::Array(value)
    }
}

impl FromIterator<DynamicValue> for DynArray {
    fn from_iter<I: IntoIterator<Item = DynamicValue>>(iter: I) -> Self {
        let mut array = Self::new();
        for value in iter {
            array.push(value);
        }
        array
    }
}

impl FromIterator<(String, DynamicValue)> for DynArray {
    fn from_iter<I: IntoIterator<Item = (String, DynamicValue)>>(iter: I) -> Self {
        let mut array = Self::new();
        for (key, value) in iter {
            array.set(key, value);
        }
        array
    }
}
