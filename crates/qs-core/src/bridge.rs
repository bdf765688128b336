use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::ConversionError;
use crate::value::{DynArray, DynamicValue};

pub const INT_SENTINEL: i64 = -1;
pub const FLOAT_SENTINEL: f64 = -1.0;
pub const CHAR_SENTINEL: char = ' ';

/// Conversion from a host value into the dynamic representation.
///
/// Total: every implementor produces some [`DynamicValue`].
pub trait ToDynamic {
    fn to_dynamic(&self) -> DynamicValue;
}

/// Conversion from a dynamic value back into a host type.
///
/// Leaf targets never fail. Where no coercion path exists, a fixed
/// non-null sentinel is substituted (`-1`, `-1.0`, `false`, `""`, `' '`)
/// so absence is not propagated into strict call sites. The only error
/// source is a structured target whose constructor fails.
pub trait FromDynamic: Sized {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, ConversionError>;
}

/// Field-wise marshalling for structured host types.
///
/// Field names are part of the implementing type's contract: `to_fields`
/// lists them in declaration order, `put_field` assigns one by name and
/// ignores names it does not declare.
pub trait HostFields: Sized {
    /// Produces the instance fields are assigned into. The single failure
    /// point of structured conversion.
    fn construct() -> Result<Self, ConversionError>;

    fn to_fields(&self) -> Vec<(&'static str, DynamicValue)>;

    fn put_field(&mut self, name: &str, value: &DynamicValue) -> Result<(), ConversionError>;
}

/// Marshals a structured host value into a keyed array.
pub fn fields_to_dynamic<T: HostFields>(value: &T) -> DynamicValue {
    let mut array = DynArray::new();
    for (name, field) in value.to_fields() {
        array.set(name, field);
    }
    DynamicValue::Array(array)
}

/// Rebuilds a structured host value from a keyed array.
///
/// Unmatched keys are skipped; fields without a matching entry keep their
/// constructor value. A non-array input yields the bare constructed
/// instance.
pub fn fields_from_dynamic<T: HostFields>(value: &DynamicValue) -> Result<T, ConversionError> {
    let mut out = T::construct()?;
    if let DynamicValue::Array(array) = value {
        for entry in array.entries() {
            if let Some(key) = &entry.key {
                out.put_field(key, &entry.value)?;
            }
        }
    }
    Ok(out)
}

impl ToDynamic for DynamicValue {
    fn to_dynamic(&self) -> DynamicValue {
        self.clone()
    }
}

impl FromDynamic for DynamicValue {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl<T: ToDynamic + ?Sized> ToDynamic for &T {
    fn to_dynamic(&self) -> DynamicValue {
        (**self).to_dynamic()
    }
}

macro_rules! impl_int_to_dynamic {
    ($($ty:ty),*) => {
        $(
            impl ToDynamic for $ty {
                fn to_dynamic(&self) -> DynamicValue {
                    DynamicValue::Int(i64::from(*self))
                }
            }
        )*
    };
}

impl_int_to_dynamic!(i8, i16, i32, i64);

macro_rules! impl_int_from_dynamic {
    ($($ty:ty),*) => {
        $(
            impl FromDynamic for $ty {
                fn from_dynamic(value: &DynamicValue) -> Result<Self, ConversionError> {
                    Ok(match value {
                        DynamicValue::Int(inner) => *inner as $ty,
                        _ => INT_SENTINEL as $ty,
                    })
                }
            }
        )*
    };
}

impl_int_from_dynamic!(i8, i16, i32, i64);

impl ToDynamic for f32 {
    fn to_dynamic(&self) -> DynamicValue {
        DynamicValue::Float(f64::from(*self))
    }
}

impl ToDynamic for f64 {
    fn to_dynamic(&self) -> DynamicValue {
        DynamicValue::Float(*self)
    }
}

impl FromDynamic for f32 {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, ConversionError> {
        Ok(match value {
            DynamicValue::Float(inner) => *inner as f32,
            _ => FLOAT_SENTINEL as f32,
        })
    }
}

impl FromDynamic for f64 {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, ConversionError> {
        Ok(match value {
            DynamicValue::Float(inner) => *inner,
            _ => FLOAT_SENTINEL,
        })
    }
}

impl ToDynamic for bool {
    fn to_dynamic(&self) -> DynamicValue {
        DynamicValue::Bool(*self)
    }
}

impl FromDynamic for bool {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, ConversionError> {
        Ok(match value {
            DynamicValue::Bool(inner) => *inner,
            _ => false,
        })
    }
}

impl ToDynamic for char {
    fn to_dynamic(&self) -> DynamicValue {
        DynamicValue::String(self.to_string())
    }
}

impl FromDynamic for char {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, ConversionError> {
        Ok(match value {
            DynamicValue::String(inner) => inner.chars().next().unwrap_or(CHAR_SENTINEL),
            _ => CHAR_SENTINEL,
        })
    }
}

impl ToDynamic for str {
    fn to_dynamic(&self) -> DynamicValue {
        DynamicValue::String(self.to_string())
    }
}

impl ToDynamic for String {
    fn to_dynamic(&self) -> DynamicValue {
        DynamicValue::String(self.clone())
    }
}

impl FromDynamic for String {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, ConversionError> {
        Ok(match value {
            DynamicValue::String(inner) => inner.clone(),
            _ => String::new(),
        })
    }
}

impl<T: ToDynamic> ToDynamic for Option<T> {
    fn to_dynamic(&self) -> DynamicValue {
        match self {
            None => DynamicValue::Null,
            Some(inner) => inner.to_dynamic(),
        }
    }
}

impl<T: FromDynamic> FromDynamic for Option<T> {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, ConversionError> {
        match value {
            DynamicValue::Null => Ok(None),
            other => Ok(Some(T::from_dynamic(other)?)),
        }
    }
}

impl<T: ToDynamic> ToDynamic for [T] {
    fn to_dynamic(&self) -> DynamicValue {
        DynamicValue::Array(self.iter().map(ToDynamic::to_dynamic).collect())
    }
}

impl<T: ToDynamic> ToDynamic for Vec<T> {
    fn to_dynamic(&self) -> DynamicValue {
        self.as_slice().to_dynamic()
    }
}

impl<T: FromDynamic> FromDynamic for Vec<T> {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, ConversionError> {
        match value {
            DynamicValue::Array(array) => array
                .values()
                .map(T::from_dynamic)
                .collect::<Result<Vec<_>, _>>(),
            _ => Ok(Vec::new()),
        }
    }
}

impl<K: fmt::Display, V: ToDynamic> ToDynamic for BTreeMap<K, V> {
    fn to_dynamic(&self) -> DynamicValue {
        let mut array = DynArray::new();
        for (key, value) in self {
            array.set(key.to_string(), value.to_dynamic());
        }
        DynamicValue::Array(array)
    }
}

impl<K: fmt::Display, V: ToDynamic> ToDynamic for HashMap<K, V> {
    fn to_dynamic(&self) -> DynamicValue {
        let mut array = DynArray::new();
        for (key, value) in self {
            array.set(key.to_string(), value.to_dynamic());
        }
        DynamicValue::Array(array)
    }
}

impl<V: FromDynamic> FromDynamic for BTreeMap<String, V> {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, ConversionError> {
        let mut out = BTreeMap::new();
        if let DynamicValue::Array(array) = value {
            for entry in array.entries() {
                if let Some(key) = &entry.key {
                    out.insert(key.clone(), V::from_dynamic(&entry.value)?);
                }
            }
        }
        Ok(out)
    }
}
