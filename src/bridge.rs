//! The bridge context object: entry points the editor calls.
//!
//! Holds the single optional [`Session`] explicitly instead of global
//! state. Every operation that needs a live session treats its absence as a
//! soft outcome — `false` or `None`, never an error.

use std::path::PathBuf;

use serde_json::Value;
use url::Url;

use crate::config::{self, ConfigAction, ConfigEdit};
use crate::editor::{DEFAULT_RUNTIME_VERSION, Document, EditorHandles, LANGUAGE_ID, settings};
use crate::protocol::method;
use crate::session::Session;

/// Whether a newly opened document is one the bridge serves.
fn wants_session(doc: &Document) -> bool {
    doc.language_id == LANGUAGE_ID && matches!(doc.uri.scheme(), "file" | "untitled")
}

pub struct Bridge {
    editor: EditorHandles,
    install_root: PathBuf,
    root_uri: Url,
    session: Option<Session>,
}

impl Bridge {
    /// `install_root` is where the extension (and its bundled server) is
    /// installed; `root_uri` is the workspace scope used for session-level
    /// settings reads and the initialize handshake.
    pub fn new(editor: EditorHandles, install_root: impl Into<PathBuf>, root_uri: Url) -> Self {
        Self {
            editor,
            install_root: install_root.into(),
            root_uri,
            session: None,
        }
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// React to a document becoming open or visible.
    ///
    /// The first qualifying document starts the default session; later ones
    /// join it and get their runtime version pinned. The current effective
    /// value is read first but does not gate the write: every joining
    /// document ends up on the pinned version.
    pub async fn on_document_open(&mut self, doc: &Document) -> anyhow::Result<()> {
        if !wants_session(doc) {
            return Ok(());
        }

        if self.session.is_none() {
            let session =
                Session::start(&self.editor, &self.install_root, &self.root_uri).await?;
            self.session = Some(session);
            return Ok(());
        }

        let _ = self.get_config(&doc.uri, settings::RUNTIME_VERSION).await?;
        let pin = ConfigEdit {
            key: settings::RUNTIME_VERSION.to_string(),
            uri: doc.uri.clone(),
            global: false,
            action: ConfigAction::Set {
                value: Value::String(DEFAULT_RUNTIME_VERSION.to_string()),
            },
        };
        self.set_config(&[pin]).await?;
        Ok(())
    }

    /// Stop and drop the session, if any. Safe to call repeatedly.
    pub async fn deactivate(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop().await;
            tracing::info!("language server session stopped");
        }
    }

    /// Ship a batch of configuration edits to the server in one round trip.
    ///
    /// Returns `Ok(false)` — applied nothing, sent nothing — when no session
    /// exists. Transport failures propagate to the caller.
    pub async fn set_config(&mut self, edits: &[ConfigEdit]) -> anyhow::Result<bool> {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        config::push_edits(&mut session.transport, edits).await?;
        Ok(true)
    }

    /// Read one configuration value through the server; `Ok(None)` when no
    /// session exists. The value is returned untyped.
    pub async fn get_config(&mut self, scope: &Url, key: &str) -> anyhow::Result<Option<Value>> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        let value = config::fetch_value(&mut session.transport, scope, key).await?;
        Ok(Some(value))
    }

    /// The locally-registered patch command: apply a batch against the
    /// editor's own store, no server round trip.
    pub fn apply_local_edits(&self, edits: &[ConfigEdit]) -> anyhow::Result<()> {
        config::apply_local_edits(self.editor.config.as_ref(), edits)
    }

    /// Forward a click on the status affordance to the server. The server
    /// alone decides what, if anything, changes.
    pub async fn status_click(&self) -> anyhow::Result<()> {
        if let Some(session) = self.session.as_ref() {
            session.transport.notify(method::STATUS_CLICK, None).await?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn adopt_session(&mut self, session: Session) {
        self.session = Some(session);
    }
}
