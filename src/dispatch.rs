//! Server-pushed command and report channels.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::editor::{CommandRunner, ReportSink};
use crate::protocol::CommandInvocation;

/// Run editor commands the server asks for. No acknowledgment is sent back
/// and nothing is retried; a failing command is the editor's to report.
pub(crate) async fn run_command_channel(
    mut rx: mpsc::Receiver<(&'static str, serde_json::Value)>,
    runner: Arc<dyn CommandRunner>,
) {
    while let Some((_, params)) = rx.recv().await {
        match serde_json::from_value::<CommandInvocation>(params) {
            Ok(invocation) => {
                tracing::debug!(command = %invocation.command, "running server-requested command");
                if let Err(e) = runner.run(&invocation.command, invocation.data) {
                    tracing::warn!(command = %invocation.command, "editor command failed: {e:#}");
                }
            }
            Err(e) => tracing::debug!("malformed $/command payload: {e}"),
        }
    }
}

/// Forward `$/api/report` payloads to the editor, opaquely.
pub(crate) async fn run_report_channel(
    mut rx: mpsc::Receiver<(&'static str, serde_json::Value)>,
    sink: Arc<dyn ReportSink>,
) {
    while let Some((_, params)) = rx.recv().await {
        sink.report(params);
    }
}
