//! Pre-dispatch validation of resolved blossom inputs.
//!
//! The static validator has already checked key sets at registration; this
//! pass re-checks the *resolved* values right before the handler runs:
//! kind against the declared field type, the `match` constant, the regex,
//! and numeric bounds. Absent optional inputs pick up their declared
//! default here.

use regex::Regex;
use sakura_core::{BlossomSchema, DataItem, DataMap, ErrorKind, FieldDef, SakuraError};

/// Validate (and default-fill) the resolved input map against the schema.
pub(crate) fn check_blossom_values(
    schema: &BlossomSchema,
    values: &mut DataMap,
) -> Result<(), SakuraError> {
    for (name, def) in schema.inputs() {
        match values.get(name) {
            Some(item) => check_field(name, def, item)?,
            None => {
                if let Some(default) = &def.default_value {
                    values.insert(name.clone(), default.clone());
                } else if def.required {
                    return Err(SakuraError::new(ErrorKind::MissingKey { key: name.clone() }));
                }
            }
        }
    }
    Ok(())
}

/// Flag input keys the schema does not declare. Used for direct blossom
/// triggering, where no static validation has seen the value map.
pub(crate) fn check_unknown_keys(
    schema: &BlossomSchema,
    values: &DataMap,
) -> Result<(), SakuraError> {
    if schema.accepts_unknown_keys() {
        return Ok(());
    }
    for key in values.keys() {
        if schema.get(key).is_none() {
            return Err(SakuraError::new(ErrorKind::UnknownKey { key: key.clone() }));
        }
    }
    Ok(())
}

fn check_field(name: &str, def: &FieldDef, item: &DataItem) -> Result<(), SakuraError> {
    if !def.field_type.matches(item) {
        return Err(SakuraError::new(ErrorKind::TypeMismatch {
            key: name.to_string(),
            expected: def.field_type.name().to_string(),
            got: item.kind_name().to_string(),
        }));
    }

    if let Some(expected) = &def.match_value {
        if expected.to_string() != item.to_string() {
            return Err(SakuraError::new(ErrorKind::MatchFailed {
                key: name.to_string(),
                expected: expected.to_string(),
            }));
        }
    }

    if let Some(pattern) = &def.regex {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
            SakuraError::new(ErrorKind::MatchFailed {
                key: name.to_string(),
                expected: format!("invalid regex: {err}"),
            })
        })?;
        if !regex.is_match(&item.to_string()) {
            return Err(SakuraError::new(ErrorKind::MatchFailed {
                key: name.to_string(),
                expected: pattern.clone(),
            }));
        }
    }

    if def.has_border() {
        let measure = match item {
            DataItem::Int(value) => Some(*value),
            DataItem::String(text) => Some(text.len() as i64),
            _ => None,
        };
        if let Some(measure) = measure {
            if measure < def.lower_border || measure >= def.upper_border {
                return Err(SakuraError::new(ErrorKind::MatchFailed {
                    key: name.to_string(),
                    expected: format!(
                        "value in range [{}, {})",
                        def.lower_border, def.upper_border
                    ),
                }));
            }
        }
    }

    Ok(())
}
