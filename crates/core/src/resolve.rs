//! Value resolution and scope merging.
//!
//! `fill_value_item` turns a declared value into a concrete `DataItem`
//! against the current scope: identifiers are looked up, strings are
//! template-expanded, and the function pipeline is applied. The override
//! functions implement the three merge policies used at every scope
//! boundary.

use crate::error::{ErrorKind, SakuraError};
use crate::items::{DataItem, DataMap, UNINITIALIZED};
use crate::template::TemplateEngine;
use crate::values::{IoType, ValueItem, ValueItemMap};
use crate::functions;

/// Merge policy at a scope boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideMode {
    /// Copy every source entry.
    All,
    /// Only overwrite keys already present in the target.
    OnlyExisting,
    /// Only insert keys not present in the target.
    OnlyNonExisting,
}

/// Resolve one value item against the scope.
///
/// Output captures stay untouched (they are bound after the blossom
/// returns). Identifiers are replaced by a deep copy of the scope value and
/// then run through the function pipeline. Literal strings are template
/// expansions producing literal strings (no pipeline). Every other literal
/// runs the pipeline directly.
pub fn fill_value_item(
    value_item: &mut ValueItem,
    scope: &DataMap,
    templates: &dyn TemplateEngine,
) -> Result<(), SakuraError> {
    if value_item.io_type == IoType::Output {
        return Ok(());
    }

    if value_item.is_identifier {
        let name = value_item.item.to_string();
        let resolved = scope
            .get(&name)
            .ok_or_else(|| SakuraError::new(ErrorKind::UndefinedIdentifier { name }))?;
        value_item.item = resolved.clone();
        value_item.is_identifier = false;
        return run_function_pipeline(value_item, scope, templates);
    }

    if value_item.item.is_string() {
        let rendered = templates
            .render(&value_item.item.to_string(), scope)
            .map_err(|message| SakuraError::new(ErrorKind::Template { message }))?;
        value_item.item = DataItem::String(rendered);
        return Ok(());
    }

    run_function_pipeline(value_item, scope, templates)
}

/// Apply the functions of a value item left to right; each call replaces
/// the item with its freshly allocated result.
fn run_function_pipeline(
    value_item: &mut ValueItem,
    scope: &DataMap,
    templates: &dyn TemplateEngine,
) -> Result<(), SakuraError> {
    for call in &value_item.functions {
        let args = resolve_arguments(&call.name, &call.args, scope, templates)?;
        let item = &value_item.item;

        value_item.item = match call.name.as_str() {
            "get" => {
                expect_arity(&call.name, &args, 1)?;
                functions::get_value(item, &args[0])?
            }
            "split" => {
                expect_arity(&call.name, &args, 1)?;
                functions::split_value(item, &args[0])?
            }
            "contains" => {
                expect_arity(&call.name, &args, 1)?;
                functions::contains_value(item, &args[0])?
            }
            "size" => {
                expect_arity(&call.name, &args, 0)?;
                functions::size_value(item)?
            }
            "insert" => {
                expect_arity(&call.name, &args, 2)?;
                functions::insert_value(item, &args[0], &args[1])?
            }
            "append" => {
                expect_arity(&call.name, &args, 1)?;
                functions::append_value(item, &args[0])?
            }
            "clear_empty" => {
                expect_arity(&call.name, &args, 0)?;
                functions::clear_empty(item)?
            }
            "parse_json" => {
                expect_arity(&call.name, &args, 0)?;
                functions::parse_json(item)?
            }
            unknown => {
                return Err(SakuraError::new(ErrorKind::function(
                    unknown,
                    "unknown function",
                )))
            }
        };
    }

    Ok(())
}

fn resolve_arguments(
    function: &str,
    args: &[ValueItem],
    scope: &DataMap,
    templates: &dyn TemplateEngine,
) -> Result<Vec<DataItem>, SakuraError> {
    args.iter()
        .map(|arg| {
            let mut arg = arg.clone();
            fill_value_item(&mut arg, scope, templates)
                .map_err(|err| err.context(format!("while resolving {function}-function argument")))
                .map(|_| arg.item)
        })
        .collect()
}

fn expect_arity(function: &str, args: &[DataItem], expected: usize) -> Result<(), SakuraError> {
    if args.len() != expected {
        let plural = if expected == 1 { "" } else { "s" };
        return Err(SakuraError::new(ErrorKind::function(
            function,
            format!("requires {expected} argument{plural}"),
        )));
    }
    Ok(())
}

/// Resolve every non-output entry of a value item map, values first, then
/// the nested child maps.
pub fn fill_input_value_item_map(
    items: &mut ValueItemMap,
    scope: &DataMap,
    templates: &dyn TemplateEngine,
) -> Result<(), SakuraError> {
    for value_item in items.values.values_mut() {
        fill_value_item(value_item, scope, templates)?;
    }
    for child in items.children.values_mut() {
        fill_input_value_item_map(child, scope, templates)?;
    }
    Ok(())
}

/// Bind every output capture of the map from the produced values.
///
/// The entry key is the target variable; the entry item names the produced
/// output to copy. A produced value missing for a capture fails
/// `MissingOutput`.
pub fn fill_output_value_item_map(
    items: &mut ValueItemMap,
    produced: &DataMap,
) -> Result<(), SakuraError> {
    for value_item in items.values.values_mut() {
        if value_item.io_type != IoType::Output {
            continue;
        }
        let name = value_item.item.to_string();
        let item = produced
            .get(&name)
            .ok_or_else(|| SakuraError::new(ErrorKind::MissingOutput { name }))?;
        value_item.item = item.clone();
    }
    Ok(())
}

/// Merge a data map into a data map.
pub fn override_items(target: &mut DataMap, source: &DataMap, mode: OverrideMode) {
    for (key, value) in source {
        if keep(target.contains_key(key), mode) {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Merge the items of a value item map into a data map.
pub fn override_items_with(target: &mut DataMap, source: &ValueItemMap, mode: OverrideMode) {
    for (key, value_item) in &source.values {
        if keep(target.contains_key(key), mode) {
            target.insert(key.clone(), value_item.item.clone());
        }
    }
}

/// Merge a value item map into a value item map.
pub fn override_value_items(target: &mut ValueItemMap, source: &ValueItemMap, mode: OverrideMode) {
    for (key, value_item) in &source.values {
        if keep(target.contains(key), mode) {
            target.values.insert(key.clone(), value_item.clone());
        }
    }
}

fn keep(exists: bool, mode: OverrideMode) -> bool {
    match mode {
        OverrideMode::All => true,
        OverrideMode::OnlyExisting => exists,
        OverrideMode::OnlyNonExisting => !exists,
    }
}

/// Keys whose value is still the uninitialised sentinel.
pub fn check_items(scope: &DataMap) -> Vec<String> {
    scope
        .iter()
        .filter(|(_, value)| value.as_str() == Some(UNINITIALIZED))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Provided keys that are not declared by the value item map.
pub fn check_input(declared: &ValueItemMap, provided: &DataMap) -> Vec<String> {
    provided
        .keys()
        .filter(|key| !declared.contains(key))
        .cloned()
        .collect()
}

/// Flatten a value item map (values plus nested child maps) into a data
/// map.
pub fn convert_value_map(input: &ValueItemMap) -> DataMap {
    let mut result = DataMap::new();
    for (key, value_item) in &input.values {
        result.insert(key.clone(), value_item.item.clone());
    }
    for (key, child) in &input.children {
        result.insert(key.clone(), DataItem::Map(convert_value_map(child)));
    }
    result
}
