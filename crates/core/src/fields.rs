//! Blossom field schemas.
//!
//! A handler declares its inputs and outputs as `FieldDef`s collected in a
//! `BlossomSchema`. The static validator checks value maps against the
//! schema at registration; the runtime check re-validates the resolved
//! values right before dispatch.

use std::collections::BTreeMap;

use crate::items::DataItem;

/// Expected kind of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Bool,
    String,
    Array,
    Map,
}

impl FieldType {
    pub fn matches(&self, item: &DataItem) -> bool {
        matches!(
            (self, item),
            (FieldType::Int, DataItem::Int(_))
                | (FieldType::Float, DataItem::Float(_))
                | (FieldType::Bool, DataItem::Bool(_))
                | (FieldType::String, DataItem::String(_))
                | (FieldType::Array, DataItem::Array(_))
                | (FieldType::Map, DataItem::Map(_))
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::String => "string",
            FieldType::Array => "array",
            FieldType::Map => "map",
        }
    }
}

/// Direction of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldIo {
    Input,
    Output,
}

/// One declared field of a blossom.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub io_type: FieldIo,
    pub field_type: FieldType,
    pub required: bool,
    pub match_value: Option<DataItem>,
    pub default_value: Option<DataItem>,
    pub regex: Option<String>,
    /// Inclusive lower / exclusive upper bound for int inputs and string
    /// lengths. `(0, 0)` means unbounded.
    pub lower_border: i64,
    pub upper_border: i64,
}

impl FieldDef {
    fn new(io_type: FieldIo, field_type: FieldType, required: bool) -> Self {
        FieldDef {
            io_type,
            field_type,
            required,
            match_value: None,
            default_value: None,
            regex: None,
            lower_border: 0,
            upper_border: 0,
        }
    }

    /// Constrain the input to exactly this value (stringified compare).
    pub fn set_match(&mut self, value: impl Into<DataItem>) -> &mut Self {
        self.match_value = Some(value.into());
        self
    }

    /// Value used when the caller does not provide the input.
    pub fn set_default(&mut self, value: impl Into<DataItem>) -> &mut Self {
        self.default_value = Some(value.into());
        self
    }

    /// Full-match regex for string inputs.
    pub fn set_regex(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.regex = Some(pattern.into());
        self
    }

    pub fn set_border(&mut self, lower: i64, upper: i64) -> &mut Self {
        self.lower_border = lower;
        self.upper_border = upper;
        self
    }

    pub fn has_border(&self) -> bool {
        self.lower_border != 0 || self.upper_border != 0
    }
}

/// The declared field set of one blossom. Inputs and outputs are separate
/// namespaces: an accumulator-style handler may declare the same name on
/// both sides.
#[derive(Debug, Clone, Default)]
pub struct BlossomSchema {
    inputs: BTreeMap<String, FieldDef>,
    outputs: BTreeMap<String, FieldDef>,
    allow_unknown: bool,
}

impl BlossomSchema {
    pub fn new() -> Self {
        BlossomSchema::default()
    }

    /// Declare an input field. Returns the definition for further
    /// constraint chaining.
    pub fn register_input(
        &mut self,
        name: impl Into<String>,
        field_type: FieldType,
        required: bool,
    ) -> &mut FieldDef {
        self.inputs
            .entry(name.into())
            .or_insert_with(|| FieldDef::new(FieldIo::Input, field_type, required))
    }

    /// Declare an output field.
    pub fn register_output(&mut self, name: impl Into<String>, field_type: FieldType) {
        self.outputs
            .insert(name.into(), FieldDef::new(FieldIo::Output, field_type, false));
    }

    /// Accept input keys beyond the declared set (the `*` wildcard).
    pub fn allow_unknown_keys(&mut self) {
        self.allow_unknown = true;
    }

    pub fn accepts_unknown_keys(&self) -> bool {
        self.allow_unknown
    }

    /// Look up a declared field, inputs first.
    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.inputs.get(name).or_else(|| self.outputs.get(name))
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = (&String, &FieldDef)> {
        self.inputs.iter()
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&String, &FieldDef)> {
        self.outputs.iter()
    }
}
