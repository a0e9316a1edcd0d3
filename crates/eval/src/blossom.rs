//! The contract between the engine and host action handlers.
//!
//! A blossom is registered under `(group, name)` and declares its fields in
//! a [`BlossomSchema`]. The engine resolves the declared values against the
//! current scope, validates them against the schema, and hands the handler
//! a [`BlossomIO`] view: resolved inputs to read, an output map to write.

use sakura_core::{error_table, BlossomSchema, DataMap, ErrorKind, ErrorSite, SakuraError};
use tracing::debug;

/// Status of a blossom invocation. Codes are host-defined; the runtime only
/// preserves them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlossomStatus {
    pub status_code: u64,
    pub message: String,
}

/// The handler's view of one invocation.
#[derive(Debug, Clone, Default)]
pub struct BlossomIO {
    /// File the blossom call lives in.
    pub blossom_path: String,
    /// Human breadcrumb of the call hierarchy.
    pub name_hierarchy: Vec<String>,
    /// Read-only snapshot of the caller scope.
    pub parent_values: DataMap,
    /// Resolved inputs.
    pub input: DataMap,
    /// Handler-written outputs. Undeclared keys are dropped by the engine.
    pub output: DataMap,
    /// Free-form text the handler wants surfaced on the terminal.
    pub terminal_output: String,
}

impl BlossomIO {
    /// Indented breadcrumb block, followed by the handler's terminal text.
    pub fn render_output(&self) -> String {
        let mut out = render_hierarchy(&self.name_hierarchy);
        if !self.terminal_output.is_empty() {
            out.push('\n');
            out.push_str(&self.terminal_output);
            out.push('\n');
        }
        out
    }
}

/// Indent each hierarchy entry by its depth.
pub(crate) fn render_hierarchy(entries: &[String]) -> String {
    let mut out = String::new();
    for (depth, entry) in entries.iter().enumerate() {
        for _ in 0..depth {
            out.push_str("   ");
        }
        out.push_str(entry);
        out.push('\n');
    }
    out
}

/// A host-registered action handler.
pub trait Blossom: Send + Sync {
    /// Declared input/output fields.
    fn schema(&self) -> &BlossomSchema;

    /// Run the action. Inputs in `io.input` satisfy the declared schema.
    /// Returning `Err` fails the whole invocation; `status` is surfaced
    /// upward unchanged.
    fn run_task(
        &self,
        io: &mut BlossomIO,
        context: &DataMap,
        status: &mut BlossomStatus,
    ) -> Result<(), String>;
}

/// Invoke a handler and wrap its failure into the error surface.
pub(crate) fn grow_blossom(
    handler: &dyn Blossom,
    io: &mut BlossomIO,
    context: &DataMap,
    status: &mut BlossomStatus,
    site: &ErrorSite,
) -> Result<(), SakuraError> {
    io.output.clear();

    debug!(blossom = %site.blossom_name, "run blossom task");
    handler.run_task(io, context, status).map_err(|message| {
        SakuraError::new(ErrorKind::Handler {
            message: message.clone(),
        })
        .context(error_table(site, &message))
    })
}
