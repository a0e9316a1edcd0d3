//! Error kinds and the context accumulator.
//!
//! A `SakuraError` is one typed kind plus an ordered list of contextual
//! frames collected while the failure travels up through the engine. The
//! frames concatenate in order in the rendered output; blossom-site frames
//! are the key|value table produced by [`error_table`].

use std::fmt;

use thiserror::Error;

/// The typed failure cause.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error("failed to parse tree: {message}")]
    Parse { message: String },

    #[error("variable \"{key}\" is not in the list of allowed keys")]
    UnknownKey { key: String },

    #[error("variable \"{key}\" is required, but is not set")]
    MissingKey { key: String },

    #[error("variable \"{key}\" captures output \"{produced}\", but the blossom has no such output")]
    UnknownOutputKey { key: String, produced: String },

    #[error("unknown blossom-type (group: {group}, type: {name})")]
    UnknownBlossom { group: String, name: String },

    #[error("value \"{key}\" has the wrong type: expected {expected}, got {got}")]
    TypeMismatch {
        key: String,
        expected: String,
        got: String,
    },

    #[error("value \"{key}\" doesn't match the expected value: {expected}")]
    MatchFailed { key: String, expected: String },

    #[error("item \"{name}\" doesn't exist in the current scope")]
    UndefinedIdentifier { name: String },

    #[error("output \"{name}\" is missing in the produced values")]
    MissingOutput { name: String },

    #[error("subtree doesn't exist: {name}")]
    MissingSubtree { name: String },

    #[error("id \"{id}\" is already registered")]
    DuplicateId { id: String },

    #[error("template error: {message}")]
    Template { message: String },

    #[error("{function}-function failed: {reason}")]
    Function { function: String, reason: String },

    #[error("blossom handler failed: {message}")]
    Handler { message: String },

    #[error("the following items are not initialized: {}", .names.join(", "))]
    UninitialisedValue { names: Vec<String> },
}

impl ErrorKind {
    pub fn function(function: &str, reason: impl Into<String>) -> Self {
        ErrorKind::Function {
            function: function.to_string(),
            reason: reason.into(),
        }
    }
}

/// A failure with its accumulated context frames.
#[derive(Debug, Clone, PartialEq)]
pub struct SakuraError {
    pub kind: ErrorKind,
    frames: Vec<String>,
}

impl SakuraError {
    pub fn new(kind: ErrorKind) -> Self {
        SakuraError {
            kind,
            frames: Vec::new(),
        }
    }

    /// Append a context frame. Frames render after the kind, in the order
    /// they were added.
    pub fn add_message(&mut self, message: impl Into<String>) {
        self.frames.push(message.into());
    }

    /// Builder form of [`add_message`](Self::add_message).
    pub fn context(mut self, message: impl Into<String>) -> Self {
        self.add_message(message);
        self
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }
}

impl From<ErrorKind> for SakuraError {
    fn from(kind: ErrorKind) -> Self {
        SakuraError::new(kind)
    }
}

impl fmt::Display for SakuraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for frame in &self.frames {
            write!(f, "\n{}", frame)?;
        }
        Ok(())
    }
}

impl std::error::Error for SakuraError {}

/// Identifies the blossom site an error table is rendered for. Empty fields
/// are omitted from the table.
#[derive(Debug, Clone, Default)]
pub struct ErrorSite {
    pub location: String,
    pub possible_solution: String,
    pub blossom_type: String,
    pub blossom_group_type: String,
    pub blossom_name: String,
    pub blossom_file_path: String,
}

/// Render the error surface table: two columns (`key`, `value`) and the
/// rows ERROR / component / source / location / possible solution /
/// blossom-type / blossom-group-type / blossom-name / blossom-file-path /
/// message.
pub fn error_table(site: &ErrorSite, message: &str) -> String {
    let mut rows: Vec<(String, String)> = vec![
        ("ERROR".to_string(), String::new()),
        ("component".to_string(), "sakura".to_string()),
        ("source".to_string(), "runtime".to_string()),
    ];
    let optional = [
        ("location", &site.location),
        ("possible solution", &site.possible_solution),
        ("blossom-type", &site.blossom_type),
        ("blossom-group-type", &site.blossom_group_type),
        ("blossom-name", &site.blossom_name),
        ("blossom-file-path", &site.blossom_file_path),
    ];
    for (key, value) in optional {
        if !value.is_empty() {
            rows.push((key.to_string(), value.clone()));
        }
    }
    rows.push(("message".to_string(), message.to_string()));

    render_table(&rows)
}

fn render_table(rows: &[(String, String)]) -> String {
    let key_width = rows
        .iter()
        .map(|(k, _)| k.len())
        .chain(std::iter::once("key".len()))
        .max()
        .unwrap_or(0);
    let value_width = rows
        .iter()
        .flat_map(|(_, v)| v.lines().map(str::len))
        .chain(std::iter::once("value".len()))
        .max()
        .unwrap_or(0);

    let separator = format!(
        "+{}+{}+\n",
        "-".repeat(key_width + 2),
        "-".repeat(value_width + 2)
    );

    let mut out = String::new();
    out.push_str(&separator);
    out.push_str(&format!(
        "| {:key_width$} | {:value_width$} |\n",
        "key", "value"
    ));
    out.push_str(&separator);
    for (key, value) in rows {
        let mut lines = value.lines();
        let first = lines.next().unwrap_or("");
        out.push_str(&format!(
            "| {:key_width$} | {:value_width$} |\n",
            key, first
        ));
        for line in lines {
            out.push_str(&format!("| {:key_width$} | {:value_width$} |\n", "", line));
        }
    }
    out.push_str(&separator);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_concatenate_in_order() {
        let err = SakuraError::new(ErrorKind::MissingKey { key: "input".into() })
            .context("first")
            .context("second");
        let rendered = err.to_string();
        let first = rendered.find("first").unwrap();
        let second = rendered.find("second").unwrap();
        assert!(rendered.starts_with("variable \"input\" is required"));
        assert!(first < second);
    }

    #[test]
    fn table_contains_all_set_rows() {
        let site = ErrorSite {
            location: "processing".into(),
            blossom_type: "standalone".into(),
            blossom_group_type: "special".into(),
            blossom_name: "copy".into(),
            blossom_file_path: "root/t.sakura".into(),
            ..ErrorSite::default()
        };
        let table = error_table(&site, "boom");
        for needle in [
            "ERROR",
            "component",
            "source",
            "location",
            "blossom-type",
            "blossom-group-type",
            "blossom-name",
            "blossom-file-path",
            "message",
            "boom",
        ] {
            assert!(table.contains(needle), "missing {needle} in\n{table}");
        }
        assert!(!table.contains("possible solution"));
    }

    #[test]
    fn multi_line_messages_stay_inside_the_table() {
        let table = error_table(&ErrorSite::default(), "line one\nline two");
        assert!(table.contains("line one"));
        assert!(table.contains("line two"));
    }
}
