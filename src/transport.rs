//! Transport session: one framed JSON-RPC channel to one server process.
//!
//! A reader task parses incoming frames and routes them — responses to the
//! pending-request map, server-originated requests to a method-not-found
//! reply, notifications to per-method subscriber channels. A writer task
//! serializes everything the client sends. [`Transport::spawn`] wires the
//! pair over a child process's stdio; [`Transport::from_streams`] wires it
//! over any byte streams, which is how the tests drive it.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::codec::{MessageReader, MessageWriter};
use crate::protocol::{self, method};

const REQUEST_TIMEOUT_SECS: u64 = 30;

const SHUTDOWN_GRACE_SECS: u64 = 2;

const WRITER_QUEUE_CAPACITY: usize = 64;

const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

enum Outbound {
    Frame(serde_json::Value),
    Stop,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>>;
type SubscriberMap =
    Arc<Mutex<HashMap<&'static str, mpsc::Sender<(&'static str, serde_json::Value)>>>>;

enum Inbound {
    Reply {
        id: u64,
        body: serde_json::Value,
    },
    Call {
        id: serde_json::Value,
        method: String,
    },
    Event {
        method: String,
        params: serde_json::Value,
    },
}

fn classify(frame: &serde_json::Value) -> Option<Inbound> {
    let id = frame.get("id");
    let method = frame
        .get("method")
        .and_then(|m| m.as_str())
        .map(String::from);
    let is_reply = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method, is_reply) {
        (Some(id), None, true) => Some(Inbound::Reply {
            id: id.as_u64()?,
            body: frame.clone(),
        }),
        (Some(id), Some(method), _) => Some(Inbound::Call {
            id: id.clone(),
            method,
        }),
        (None, Some(method), _) => Some(Inbound::Event {
            method,
            params: frame.get("params").cloned().unwrap_or(serde_json::Value::Null),
        }),
        _ => None,
    }
}

pub(crate) struct Transport {
    writer_tx: mpsc::Sender<Outbound>,
    next_id: u64,
    pending: PendingMap,
    subscribers: SubscriberMap,
    child: Option<Child>,
    /// True once the initialize handshake has completed. Shutdown skips the
    /// protocol goodbye when the transport never got that far.
    ready: bool,
    #[allow(dead_code)]
    reader_handle: tokio::task::JoinHandle<()>,
    #[allow(dead_code)]
    writer_handle: tokio::task::JoinHandle<()>,
}

impl Transport {
    /// Wire a transport over an arbitrary read/write pair.
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let subscribers: SubscriberMap = Arc::new(Mutex::new(HashMap::new()));

        let (writer_tx, mut writer_rx) = mpsc::channel::<Outbound>(WRITER_QUEUE_CAPACITY);
        let writer_pending = pending.clone();
        let writer_handle = tokio::spawn(async move {
            let mut sink = MessageWriter::new(writer);
            while let Some(outbound) = writer_rx.recv().await {
                match outbound {
                    Outbound::Frame(frame) => {
                        if let Err(e) = sink.send(&frame).await {
                            tracing::warn!("transport write error: {e:#}");
                            break;
                        }
                    }
                    Outbound::Stop => break,
                }
            }
            // A request whose frame never made it out must not sit waiting
            // for a reply that cannot come.
            writer_pending.lock().await.clear();
        });

        let reader_pending = pending.clone();
        let reader_subscribers = subscribers.clone();
        let reader_writer_tx = writer_tx.clone();
        let reader_handle = tokio::spawn(async move {
            let mut source = MessageReader::new(reader);
            loop {
                match source.next_message().await {
                    Ok(Some(frame)) => {
                        dispatch(frame, &reader_pending, &reader_subscribers, &reader_writer_tx)
                            .await;
                    }
                    Ok(None) => {
                        tracing::info!("language server closed its output stream");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("transport read error: {e:#}");
                        break;
                    }
                }
            }
            // Fail pending requests fast and close subscriber channels so
            // the attached tasks observe the loss of the server.
            reader_pending.lock().await.clear();
            reader_subscribers.lock().await.clear();
        });

        Self {
            writer_tx,
            next_id: 1,
            pending,
            subscribers,
            child: None,
            ready: false,
            reader_handle,
            writer_handle,
        }
    }

    /// Spawn the server process and wire the transport over its stdio.
    pub async fn spawn(command: &Path, args: &[String]) -> Result<Self> {
        let resolved = which::which(command)
            .with_context(|| format!("{} is not an executable command", command.display()))?;

        let mut child = Command::new(&resolved)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", resolved.display()))?;

        let stdout = child.stdout.take().context("child has no stdout")?;
        let stdin = child.stdin.take().context("child has no stdin")?;

        let mut transport = Self::from_streams(stdout, stdin);
        transport.child = Some(child);
        Ok(transport)
    }

    /// Run the initialize handshake. The transport is ready afterwards.
    pub async fn initialize(&mut self, root_uri: &str) -> Result<()> {
        let params = protocol::initialize_params(root_uri);
        self.request(method::INITIALIZE, Some(params))
            .await
            .context("initialize handshake")?;
        self.notify(method::INITIALIZED, Some(serde_json::json!({})))
            .await?;
        self.ready = true;
        Ok(())
    }

    /// Send a request and await the server's reply.
    ///
    /// An `error` reply and a timed-out round trip both surface as `Err`;
    /// the pending entry is removed on every failure path so repeated
    /// failures don't grow the map.
    pub async fn request(
        &mut self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = protocol::Request::new(id, method, params);
        let frame = serde_json::to_value(&request).context("serializing request")?;
        if self.writer_tx.send(Outbound::Frame(frame)).await.is_err() {
            self.pending.lock().await.remove(&id);
            bail!("transport writer closed");
        }

        let reply = match tokio::time::timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS), rx).await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                bail!("server connection lost before replying to {method}");
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                bail!("request {method} timed out");
            }
        };

        if let Some(error) = reply.get("error") {
            bail!(
                "server rejected {method}: {}",
                error["message"].as_str().unwrap_or("unknown error")
            );
        }
        Ok(reply.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Send a notification. Completes once the frame is queued for writing.
    pub async fn notify(
        &self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<()> {
        let notification = protocol::Notification::new(method, params);
        let frame = serde_json::to_value(&notification).context("serializing notification")?;
        self.writer_tx
            .send(Outbound::Frame(frame))
            .await
            .map_err(|_| anyhow::anyhow!("transport writer closed"))?;
        Ok(())
    }

    /// Subscribe one receiver to every method in `methods`.
    ///
    /// Frames for those methods arrive on the returned channel in the order
    /// the transport read them. One subscriber per method; a later subscribe
    /// for the same method replaces the earlier one.
    pub async fn subscribe(
        &self,
        methods: &[&'static str],
    ) -> mpsc::Receiver<(&'static str, serde_json::Value)> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let mut map = self.subscribers.lock().await;
        for &method in methods {
            map.insert(method, tx.clone());
        }
        rx
    }

    /// Gracefully shut the transport down. Consumes self.
    ///
    /// Sends the protocol goodbye only if the handshake ever completed, then
    /// stops the writer and reaps the child, killing it after a grace period.
    pub async fn shutdown(mut self) {
        if self.ready {
            match self.request(method::SHUTDOWN, None).await {
                Ok(_) => {
                    let _ = self.notify(method::EXIT, None).await;
                }
                Err(e) => tracing::debug!("shutdown request failed: {e:#}"),
            }
        }

        let _ = self.writer_tx.send(Outbound::Stop).await;

        if let Some(mut child) = self.child.take() {
            let reaped = tokio::time::timeout(
                Duration::from_secs(SHUTDOWN_GRACE_SECS),
                child.wait(),
            )
            .await;
            if reaped.is_err() {
                tracing::debug!("language server did not exit in time, killing");
                let _ = child.kill().await;
            }
        }
    }
}

async fn dispatch(
    frame: serde_json::Value,
    pending: &PendingMap,
    subscribers: &SubscriberMap,
    writer_tx: &mpsc::Sender<Outbound>,
) {
    let Some(inbound) = classify(&frame) else {
        tracing::trace!("ignoring malformed JSON-RPC frame");
        return;
    };

    match inbound {
        Inbound::Reply { id, body } => {
            let waiter = pending.lock().await.remove(&id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(body);
                }
                None => tracing::trace!(id, "reply for unknown request id"),
            }
        }
        Inbound::Call { id, method } => {
            // The server may block waiting on an answer, so always reply.
            tracing::debug!("server request {method} is unsupported, replying method not found");
            let reply = serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {
                    "code": -32601,
                    "message": format!("Method not found: {method}")
                }
            });
            let _ = writer_tx.send(Outbound::Frame(reply)).await;
        }
        Inbound::Event { method, params } => {
            let subscriber = {
                let map = subscribers.lock().await;
                map.get_key_value(method.as_str())
                    .map(|(name, tx)| (*name, tx.clone()))
            };
            match subscriber {
                Some((name, tx)) => {
                    if tx.send((name, params)).await.is_err() {
                        subscribers.lock().await.remove(name);
                    }
                }
                None => tracing::trace!("no subscriber for notification {method}"),
            }
        }
    }
}
