//! Seams to the host editor.
//!
//! The bridge never touches editor internals directly; the embedding editor
//! implements these traits over its own status widget, command facility, and
//! configuration store, and hands them over as [`EditorHandles`].

use std::sync::Arc;

use url::Url;

/// Configuration keys the bridge reads from the editor's store.
pub mod settings {
    /// Explicit server executable override; used verbatim when non-empty.
    pub const EXECUTABLE_PATH: &str = "Lua.misc.executablePath";
    /// Extra command-line arguments for the server process.
    pub const SERVER_PARAMETERS: &str = "Lua.misc.parameters";
    /// Per-scope Lua runtime version.
    pub const RUNTIME_VERSION: &str = "Lua.runtime.version";
}

/// Language identifier of documents the bridge cares about.
pub const LANGUAGE_ID: &str = "lua";

/// Runtime version pinned for documents joining an existing session.
pub const DEFAULT_RUNTIME_VERSION: &str = "Lua 5.4";

/// The single status affordance. The server is the sole authority on
/// visibility; the bridge only relays its decisions.
pub trait StatusSink: Send + Sync {
    fn show(&self);
    fn hide(&self);
    fn set_status(&self, text: &str, tooltip: &str);
}

/// Executes a named, already-registered editor command. A failure for an
/// unknown name belongs to the editor's own error reporting.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str, data: serde_json::Value) -> anyhow::Result<()>;
}

/// The editor's configuration store, read and written at a document or
/// workspace-folder scope. `global` selects the global store instead.
pub trait ConfigStore: Send + Sync {
    fn get(&self, scope: &Url, key: &str) -> Option<serde_json::Value>;
    fn update(
        &self,
        scope: &Url,
        key: &str,
        value: serde_json::Value,
        global: bool,
    ) -> anyhow::Result<()>;
}

/// Receives `$/api/report` payloads, passed through opaquely.
pub trait ReportSink: Send + Sync {
    fn report(&self, params: serde_json::Value);
}

/// Everything the bridge needs from the host editor, bundled.
#[derive(Clone)]
pub struct EditorHandles {
    pub status: Arc<dyn StatusSink>,
    pub commands: Arc<dyn CommandRunner>,
    pub config: Arc<dyn ConfigStore>,
    pub reports: Arc<dyn ReportSink>,
}

/// A document the editor observed opening.
#[derive(Debug, Clone)]
pub struct Document {
    pub uri: Url,
    pub language_id: String,
}

impl Document {
    pub fn new(uri: Url, language_id: impl Into<String>) -> Self {
        Self {
            uri,
            language_id: language_id.into(),
        }
    }
}
