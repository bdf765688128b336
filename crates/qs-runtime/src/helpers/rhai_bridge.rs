use qs_core::{DynArray, DynamicValue, RuntimeFault, SourceTag};
use rhai::{Array, Dynamic, ImmutableString, Map, FLOAT, INT};

/// Converts a stored value into the engine's scope representation.
///
/// A purely positional array becomes an engine array; once any entry is
/// keyed the whole value becomes an engine map, positional entries keyed
/// by their index.
pub(crate) fn value_to_dynamic(value: &DynamicValue) -> Dynamic {
    match value {
        DynamicValue::Null => Dynamic::UNIT,
        DynamicValue::Int(inner) => Dynamic::from_int(*inner as INT),
        DynamicValue::Float(inner) => Dynamic::from_float(*inner as FLOAT),
        DynamicValue::Bool(inner) => Dynamic::from_bool(*inner),
        DynamicValue::String(inner) => Dynamic::from(inner.clone()),
        DynamicValue::Array(array) => {
            if array.keys().next().is_none() {
                let mut out = Array::new();
                for item in array.values() {
                    out.push(value_to_dynamic(item));
                }
                Dynamic::from_array(out)
            } else {
                let mut out = Map::new();
                for (index, entry) in array.entries().iter().enumerate() {
                    let key = entry
                        .key
                        .clone()
                        .unwrap_or_else(|| index.to_string());
                    out.insert(key.into(), value_to_dynamic(&entry.value));
                }
                Dynamic::from_map(out)
            }
        }
    }
}

/// Converts an engine value back into the stored representation.
pub(crate) fn dynamic_to_value(
    value: Dynamic,
    tag: &SourceTag,
) -> Result<DynamicValue, RuntimeFault> {
    if value.is_unit() {
        return Ok(DynamicValue::Null);
    }
    if value.is::<bool>() {
        return Ok(DynamicValue::Bool(value.cast::<bool>()));
    }
    if value.is::<INT>() {
        return Ok(DynamicValue::Int(value.cast::<INT>()));
    }
    if value.is::<FLOAT>() {
        return Ok(DynamicValue::Float(value.cast::<FLOAT>()));
    }
    if value.is::<char>() {
        return Ok(DynamicValue::String(value.cast::<char>().to_string()));
    }
    if value.is::<ImmutableString>() {
        return Ok(DynamicValue::String(
            value.cast::<ImmutableString>().to_string(),
        ));
    }
    if value.is::<Array>() {
        let mut out = DynArray::new();
        for item in value.cast::<Array>() {
            out.push(dynamic_to_value(item, tag)?);
        }
        return Ok(DynamicValue::Array(out));
    }
    if value.is::<Map>() {
        let mut out = DynArray::new();
        for (key, item) in value.cast::<Map>() {
            out.set(key.to_string(), dynamic_to_value(item, tag)?);
        }
        return Ok(DynamicValue::Array(out));
    }

    Err(RuntimeFault::new(
        format!("unsupported engine value of type {}", value.type_name()),
        tag.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: DynamicValue) -> DynamicValue {
        dynamic_to_value(value_to_dynamic(&value), &SourceTag::unknown()).expect("roundtrip")
    }

    #[test]
    fn leaves_roundtrip_through_the_engine_representation() {
        assert_eq!(roundtrip(DynamicValue::Null), DynamicValue::Null);
        assert_eq!(roundtrip(DynamicValue::Int(42)), DynamicValue::Int(42));
        assert_eq!(roundtrip(DynamicValue::Float(2.5)), DynamicValue::Float(2.5));
        assert_eq!(roundtrip(DynamicValue::Bool(true)), DynamicValue::Bool(true));
        assert_eq!(
            roundtrip(DynamicValue::String("quill".to_string())),
            DynamicValue::String("quill".to_string())
        );
    }

    #[test]
    fn positional_arrays_stay_ordered() {
        let mut array = DynArray::new();
        array.push(DynamicValue::Int(3));
        array.push(DynamicValue::Int(1));
        array.push(DynamicValue::Int(2));
        assert_eq!(roundtrip(DynamicValue::Array(array.clone())), DynamicValue::Array(array));
    }

    #[test]
    fn keyed_arrays_become_engine_maps() {
        let mut array = DynArray::new();
        array.set("name", DynamicValue::String("quill".to_string()));
        array.set("level", DynamicValue::Int(3));

        let dynamic = value_to_dynamic(&DynamicValue::Array(array));
        assert!(dynamic.is::<Map>());

        let back = dynamic_to_value(dynamic, &SourceTag::unknown()).expect("back");
        let back = back.as_array().expect("array");
        assert_eq!(back.get("name"), Some(&DynamicValue::String("quill".to_string())));
        assert_eq!(back.get("level"), Some(&DynamicValue::Int(3)));
    }

    #[test]
    fn mixed_arrays_key_positional_entries_by_index() {
        let mut array = DynArray::new();
        array.push(DynamicValue::Int(10));
        array.set("label", DynamicValue::String("x".to_string()));

        let dynamic = value_to_dynamic(&DynamicValue::Array(array));
        assert!(dynamic.is::<Map>());

        let back = dynamic_to_value(dynamic, &SourceTag::unknown()).expect("back");
        let back = back.as_array().expect("array");
        assert_eq!(back.get("0"), Some(&DynamicValue::Int(10)));
        assert_eq!(back.get("label"), Some(&DynamicValue::String("x".to_string())));
    }

    #[test]
    fn engine_chars_read_back_as_one_length_strings() {
        let back = dynamic_to_value(Dynamic::from('q'), &SourceTag::unknown()).expect("char");
        assert_eq!(back, DynamicValue::String("q".to_string()));
    }
}
