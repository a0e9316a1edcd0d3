//! Built-in value transformation functions.
//!
//! Every function returns a freshly allocated item and never mutates its
//! inputs. Failures carry the function name and a reason.

use std::collections::BTreeMap;

use crate::error::{ErrorKind, SakuraError};
use crate::items::DataItem;

fn fail(function: &str, reason: impl Into<String>) -> SakuraError {
    SakuraError::new(ErrorKind::function(function, reason))
}

/// `get(k)`: entry at key (map) or index (array).
pub fn get_value(item: &DataItem, key: &DataItem) -> Result<DataItem, SakuraError> {
    match item {
        DataItem::Map(map) => {
            let key = key.to_string();
            map.get(&key)
                .cloned()
                .ok_or_else(|| fail("get", format!("key {key} doesn't exist in the map")))
        }
        DataItem::Array(items) => {
            let pos = key
                .as_int()
                .ok_or_else(|| fail("get", "input is not an integer-typed value-item"))?;
            if pos < 0 {
                return Err(fail("get", "input has a negative value"));
            }
            items
                .get(pos as usize)
                .cloned()
                .ok_or_else(|| fail("get", "input value is too big for the array"))
        }
        _ => Err(fail("get", "item is a value-item")),
    }
}

/// `split(d)`: split the stringified item on the first character of the
/// delimiter. The literal `"\n"` means newline.
pub fn split_value(item: &DataItem, delimiter: &DataItem) -> Result<DataItem, SakuraError> {
    let delimiter = delimiter.to_string();
    let separator = if delimiter == "\\n" {
        '\n'
    } else {
        delimiter
            .chars()
            .next()
            .ok_or_else(|| fail("split", "delimiter is empty"))?
    };

    let parts = item
        .to_string()
        .split(separator)
        .map(|part| DataItem::String(part.to_string()))
        .collect();

    Ok(DataItem::Array(parts))
}

/// `contains(k)`: key in map, stringified element in array, substring in
/// anything else.
pub fn contains_value(item: &DataItem, key: &DataItem) -> Result<DataItem, SakuraError> {
    let key = key.to_string();
    let result = match item {
        DataItem::Map(map) => map.contains_key(&key),
        DataItem::Array(items) => items.iter().any(|entry| entry.to_string() == key),
        _ => item.to_string().contains(&key),
    };
    Ok(DataItem::Bool(result))
}

/// `size()`: entry count, string byte length, or 1 for scalars.
pub fn size_value(item: &DataItem) -> Result<DataItem, SakuraError> {
    Ok(DataItem::Int(item.size() as i64))
}

/// `insert(k, v)`: map copy with the pair inserted (overwriting).
pub fn insert_value(
    item: &DataItem,
    key: &DataItem,
    value: &DataItem,
) -> Result<DataItem, SakuraError> {
    let DataItem::Map(map) = item else {
        return Err(fail("insert", "item is not a map-item"));
    };
    let mut result: BTreeMap<String, DataItem> = map.clone();
    result.insert(key.to_string(), value.clone());
    Ok(DataItem::Map(result))
}

/// `append(v)`: array copy with the value pushed.
pub fn append_value(item: &DataItem, value: &DataItem) -> Result<DataItem, SakuraError> {
    let DataItem::Array(items) = item else {
        return Err(fail("append", "item is not an array-item"));
    };
    let mut result = items.clone();
    result.push(value.clone());
    Ok(DataItem::Array(result))
}

/// `clear_empty()`: array copy without entries whose stringification is
/// empty.
pub fn clear_empty(item: &DataItem) -> Result<DataItem, SakuraError> {
    let DataItem::Array(items) = item else {
        return Err(fail("clear_empty", "item is not an array-item"));
    };
    let result = items
        .iter()
        .filter(|entry| !entry.to_string().is_empty())
        .cloned()
        .collect();
    Ok(DataItem::Array(result))
}

/// `parse_json()`: parse the stringified item as JSON.
pub fn parse_json(item: &DataItem) -> Result<DataItem, SakuraError> {
    DataItem::from_json(&item.to_string())
        .map_err(|parse_err| fail("parse_json", parse_err.to_string()))
}
