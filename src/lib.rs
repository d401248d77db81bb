//! Editor-side bridge for the Lua language-analysis server.
//!
//! The embedding editor hands this crate a set of small trait objects
//! ([`editor::EditorHandles`]) and forwards its document-open and deactivate
//! events to a [`Bridge`]. The bridge owns at most one live server session:
//! it resolves the server executable, brings up a framed JSON-RPC transport
//! over the child's stdio, and wires the extension protocol on top — the
//! server-driven status indicator, server-driven editor commands, structured
//! data reports, and the configuration read/write/patch channel.

pub mod codec;
pub mod config;
pub mod editor;

pub(crate) mod dispatch;
pub(crate) mod protocol;
pub(crate) mod resolve;
pub(crate) mod status;
pub(crate) mod transport;

mod bridge;
mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use bridge::Bridge;
pub use config::{ConfigAction, ConfigEdit, apply_local_edits};
pub use editor::{
    CommandRunner, ConfigStore, Document, EditorHandles, ReportSink, StatusSink,
};
pub use session::{Session, StartError};
