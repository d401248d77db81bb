//! Session lifecycle: one live server session, started from a document-open
//! event and torn down on deactivation.

use std::path::Path;
use std::sync::Arc;

use url::Url;

use crate::dispatch;
use crate::editor::{EditorHandles, StatusSink, settings};
use crate::protocol::method;
use crate::resolve;
use crate::status;
use crate::transport::Transport;

/// Why a session could not be brought up.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// No usable server command: unsupported platform, missing binary, and
    /// no override configured. Fatal; the caller surfaces it to the user.
    #[error("cannot locate the language server: {0}")]
    Configuration(String),
    /// The transport failed to come up or the handshake was rejected.
    #[error("language server transport failed: {0:#}")]
    Transport(anyhow::Error),
}

/// A live session with the server. While one exists, all configuration,
/// status, and command traffic routes through it.
pub struct Session {
    pub(crate) transport: Transport,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    status: Arc<dyn StatusSink>,
}

impl Session {
    /// Resolve the server command, bring the transport up, and attach the
    /// extension-protocol channels.
    pub(crate) async fn start(
        editor: &EditorHandles,
        install_root: &Path,
        root_uri: &Url,
    ) -> Result<Self, StartError> {
        let override_path = editor
            .config
            .get(root_uri, settings::EXECUTABLE_PATH)
            .and_then(|v| v.as_str().map(str::to_owned));
        let args: Vec<String> = editor
            .config
            .get(root_uri, settings::SERVER_PARAMETERS)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let command = resolve::resolve_server_command(override_path.as_deref(), install_root)?;
        tracing::info!(command = %command.display(), "starting the language server");

        let mut transport = Transport::spawn(&command, &args)
            .await
            .map_err(StartError::Transport)?;
        transport
            .initialize(root_uri.as_str())
            .await
            .map_err(StartError::Transport)?;

        Self::attach(transport, editor).await
    }

    /// Attach the status, command, and report channels to a ready transport.
    ///
    /// The status refresh goes out before any other client-originated status
    /// traffic, so the server's first push reflects its true current state.
    pub(crate) async fn attach(
        transport: Transport,
        editor: &EditorHandles,
    ) -> Result<Self, StartError> {
        let status_rx = transport
            .subscribe(&[
                method::STATUS_SHOW,
                method::STATUS_HIDE,
                method::STATUS_REPORT,
            ])
            .await;
        transport
            .notify(method::STATUS_REFRESH, None)
            .await
            .map_err(StartError::Transport)?;

        let command_rx = transport.subscribe(&[method::COMMAND]).await;
        let report_rx = transport.subscribe(&[method::API_REPORT]).await;

        let tasks = vec![
            tokio::spawn(status::run_status_channel(
                status_rx,
                editor.status.clone(),
            )),
            tokio::spawn(dispatch::run_command_channel(
                command_rx,
                editor.commands.clone(),
            )),
            tokio::spawn(dispatch::run_report_channel(
                report_rx,
                editor.reports.clone(),
            )),
        ];

        Ok(Self {
            transport,
            tasks,
            status: editor.status.clone(),
        })
    }

    /// Tear the session down: transport shutdown first, then every channel
    /// task released and the status affordance hidden, regardless of how the
    /// shutdown went. Never fails, even on a transport that was never ready.
    pub(crate) async fn stop(self) {
        let Self {
            transport,
            tasks,
            status,
        } = self;

        transport.shutdown().await;
        for task in tasks {
            task.abort();
        }
        status.hide();
    }
}
