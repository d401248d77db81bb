//! Shared test doubles: an in-memory fake server and recording editor seams.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::codec::{MessageReader, MessageWriter};
use crate::editor::{CommandRunner, ConfigStore, EditorHandles, ReportSink, StatusSink};
use crate::transport::Transport;

async fn wait_until(mut cond: impl FnMut() -> bool, what: &str) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

/// The server side of an in-memory transport pair. Records every frame the
/// client sends, answers requests from a configurable result table, and can
/// push notifications of its own.
pub(crate) struct FakeServer {
    received: Arc<Mutex<Vec<Value>>>,
    results: Arc<Mutex<HashMap<String, Value>>>,
    outbound: mpsc::Sender<Value>,
}

impl FakeServer {
    /// Result to reply with, keyed by method name — or, for
    /// `workspace/executeCommand`, by the command name. Unconfigured
    /// requests get `null`.
    pub fn set_result(&self, key: &str, value: Value) {
        self.results.lock().unwrap().insert(key.to_string(), value);
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) {
        let mut frame = serde_json::json!({"jsonrpc": "2.0", "method": method});
        if let Some(params) = params {
            frame["params"] = params;
        }
        self.outbound
            .send(frame)
            .await
            .expect("fake server writer is gone");
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    pub async fn wait_for_frames(&self, count: usize) -> Vec<Value> {
        let received = self.received.clone();
        wait_until(
            || received.lock().unwrap().len() >= count,
            "frames from the client",
        )
        .await;
        self.received()
    }
}

/// A [`Transport`] wired over an in-memory duplex, with a [`FakeServer`] on
/// the other end.
pub(crate) fn fake_server_pair() -> (Transport, FakeServer) {
    let (client_io, server_io) = tokio::io::duplex(256 * 1024);
    let (client_read, client_write) = tokio::io::split(client_io);
    let (server_read, server_write) = tokio::io::split(server_io);

    let transport = Transport::from_streams(client_read, client_write);

    let received: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let results: Arc<Mutex<HashMap<String, Value>>> = Arc::new(Mutex::new(HashMap::new()));
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Value>(32);
    let (write_tx, mut write_rx) = mpsc::channel::<Value>(32);

    // Writer: everything the fake server sends funnels through one task so
    // replies and pushed notifications cannot interleave mid-frame.
    tokio::spawn(async move {
        let mut writer = MessageWriter::new(server_write);
        while let Some(frame) = write_rx.recv().await {
            if writer.send(&frame).await.is_err() {
                break;
            }
        }
    });

    let push_tx = write_tx.clone();
    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if push_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    let reader_received = received.clone();
    let reader_results = results.clone();
    tokio::spawn(async move {
        let mut reader = MessageReader::new(server_read);
        while let Ok(Some(frame)) = reader.next_message().await {
            reader_received.lock().unwrap().push(frame.clone());

            let id = frame.get("id").cloned();
            let method = frame.get("method").and_then(Value::as_str);
            if let (Some(id), Some(method)) = (id, method) {
                let lookup = if method == "workspace/executeCommand" {
                    frame["params"]["command"]
                        .as_str()
                        .unwrap_or(method)
                        .to_string()
                } else {
                    method.to_string()
                };
                let result = reader_results
                    .lock()
                    .unwrap()
                    .get(&lookup)
                    .cloned()
                    .unwrap_or(Value::Null);
                let reply = serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result});
                if write_tx.send(reply).await.is_err() {
                    break;
                }
            }
        }
    });

    (
        transport,
        FakeServer {
            received,
            results,
            outbound: outbound_tx,
        },
    )
}

// ── editor doubles ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SinkCall {
    Show,
    Hide,
    Set { text: String, tooltip: String },
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub async fn wait_for(&self, pred: impl Fn(&[SinkCall]) -> bool) {
        wait_until(|| pred(&self.calls.lock().unwrap()), "status sink calls").await;
    }
}

impl StatusSink for RecordingSink {
    fn show(&self) {
        self.calls.lock().unwrap().push(SinkCall::Show);
    }

    fn hide(&self) {
        self.calls.lock().unwrap().push(SinkCall::Hide);
    }

    fn set_status(&self, text: &str, tooltip: &str) {
        self.calls.lock().unwrap().push(SinkCall::Set {
            text: text.to_string(),
            tooltip: tooltip.to_string(),
        });
    }
}

#[derive(Default)]
pub(crate) struct RecordingRunner {
    invocations: Mutex<Vec<(String, Value)>>,
}

impl RecordingRunner {
    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().unwrap().clone()
    }

    pub async fn wait_for(&self, count: usize) {
        wait_until(
            || self.invocations.lock().unwrap().len() >= count,
            "command invocations",
        )
        .await;
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str, data: Value) -> anyhow::Result<()> {
        self.invocations
            .lock()
            .unwrap()
            .push((command.to_string(), data));
        Ok(())
    }
}

/// Key-addressed config store; scopes are accepted but not distinguished,
/// which is all the tests need.
#[derive(Default)]
pub(crate) struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    reads: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn seed(&self, key: &str, value: Value) {
        self.values.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap().get(key).cloned()
    }

    /// How many times `key` has been read through the trait.
    pub fn reads_of(&self, key: &str) -> usize {
        self.reads
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.as_str() == key)
            .count()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, _scope: &Url, key: &str) -> Option<Value> {
        self.reads.lock().unwrap().push(key.to_string());
        self.values.lock().unwrap().get(key).cloned()
    }

    fn update(&self, _scope: &Url, key: &str, value: Value, _global: bool) -> anyhow::Result<()> {
        self.values.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingReports {
    payloads: Mutex<Vec<Value>>,
}

impl RecordingReports {
    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }

    pub async fn wait_for(&self, count: usize) {
        wait_until(
            || self.payloads.lock().unwrap().len() >= count,
            "api reports",
        )
        .await;
    }
}

impl ReportSink for RecordingReports {
    fn report(&self, params: Value) {
        self.payloads.lock().unwrap().push(params);
    }
}

/// Concrete handles kept alongside [`EditorHandles`] so tests can assert on
/// what the bridge did to the editor.
pub(crate) struct EditorDoubles {
    pub sink: Arc<RecordingSink>,
    pub runner: Arc<RecordingRunner>,
    pub store: Arc<MemoryStore>,
    pub reports: Arc<RecordingReports>,
}

pub(crate) fn test_editor() -> (EditorHandles, EditorDoubles) {
    let sink = Arc::new(RecordingSink::default());
    let runner = Arc::new(RecordingRunner::default());
    let store = Arc::new(MemoryStore::default());
    let reports = Arc::new(RecordingReports::default());

    let handles = EditorHandles {
        status: sink.clone(),
        commands: runner.clone(),
        config: store.clone(),
        reports: reports.clone(),
    };
    (
        handles,
        EditorDoubles {
            sink,
            runner,
            store,
            reports,
        },
    )
}
