//! The status channel: a two-state machine driven by server notifications.
//!
//! `$/status/show` and `$/status/hide` are the only transitions; a report
//! received while hidden is stored and surfaces on the next show. Clicks
//! travel the other way and never change local state.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::editor::StatusSink;
use crate::protocol::{StatusReport, method};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visibility {
    Hidden,
    Shown,
}

pub(crate) enum StatusEvent {
    Show,
    Hide,
    Report(StatusReport),
}

/// Pure transition model, separated from the channel task so interleavings
/// are unit-testable.
pub(crate) struct StatusModel {
    visibility: Visibility,
    text: String,
    tooltip: String,
}

impl StatusModel {
    pub fn new() -> Self {
        Self {
            visibility: Visibility::Hidden,
            text: String::new(),
            tooltip: String::new(),
        }
    }

    #[cfg(test)]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn apply(&mut self, event: StatusEvent, sink: &dyn StatusSink) {
        match event {
            StatusEvent::Show => {
                self.visibility = Visibility::Shown;
                sink.set_status(&self.text, &self.tooltip);
                sink.show();
            }
            StatusEvent::Hide => {
                // Text and tooltip are retained for the next show.
                self.visibility = Visibility::Hidden;
                sink.hide();
            }
            StatusEvent::Report(report) => {
                self.text = report.text;
                self.tooltip = report.tooltip;
                if self.visibility == Visibility::Shown {
                    sink.set_status(&self.text, &self.tooltip);
                }
            }
        }
    }
}

/// Drive the status affordance from the subscribed notification stream.
pub(crate) async fn run_status_channel(
    mut rx: mpsc::Receiver<(&'static str, serde_json::Value)>,
    sink: Arc<dyn StatusSink>,
) {
    let mut model = StatusModel::new();
    while let Some((msg_method, params)) = rx.recv().await {
        match msg_method {
            method::STATUS_SHOW => model.apply(StatusEvent::Show, &*sink),
            method::STATUS_HIDE => model.apply(StatusEvent::Hide, &*sink),
            method::STATUS_REPORT => match serde_json::from_value::<StatusReport>(params) {
                Ok(report) => model.apply(StatusEvent::Report(report), &*sink),
                Err(e) => tracing::debug!("malformed status report: {e}"),
            },
            other => tracing::trace!("unexpected method on the status channel: {other}"),
        }
    }
}
