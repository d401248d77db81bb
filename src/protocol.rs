//! JSON-RPC frame types and the extension-protocol message set.

use serde::{Deserialize, Serialize};

/// Method names exchanged with the server. The `$/`-prefixed ones form the
/// extension protocol layered on top of the standard lifecycle messages.
pub(crate) mod method {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "initialized";
    pub const SHUTDOWN: &str = "shutdown";
    pub const EXIT: &str = "exit";
    pub const EXECUTE_COMMAND: &str = "workspace/executeCommand";

    pub const STATUS_SHOW: &str = "$/status/show";
    pub const STATUS_HIDE: &str = "$/status/hide";
    pub const STATUS_REPORT: &str = "$/status/report";
    pub const STATUS_CLICK: &str = "$/status/click";
    pub const STATUS_REFRESH: &str = "$/status/refresh";

    pub const COMMAND: &str = "$/command";
    pub const API_REPORT: &str = "$/api/report";
}

/// Server-side command names invoked through `workspace/executeCommand`.
pub(crate) const SET_CONFIG_COMMAND: &str = "lua.setConfig";
pub(crate) const GET_CONFIG_COMMAND: &str = "lua.getConfig";

#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// `$/status/report` payload. The server pushes display text verbatim.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatusReport {
    pub text: String,
    #[serde(default)]
    pub tooltip: String,
}

/// `$/command` payload: an editor command the server wants run.
#[derive(Debug, Deserialize)]
pub(crate) struct CommandInvocation {
    pub command: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

pub(crate) fn initialize_params(root_uri: &str) -> serde_json::Value {
    serde_json::json!({
        "processId": std::process::id(),
        "rootUri": root_uri,
        "capabilities": {
            "workspace": {
                "executeCommand": { "dynamicRegistration": false }
            }
        },
        "workspaceFolders": [{
            "uri": root_uri,
            "name": "workspace"
        }]
    })
}

pub(crate) fn execute_command_params(
    command: &str,
    arguments: Vec<serde_json::Value>,
) -> serde_json::Value {
    serde_json::json!({
        "command": command,
        "arguments": arguments,
    })
}
