//! The configuration bridge.
//!
//! Two distinct paths share the [`ConfigEdit`] batch format:
//!
//! - the remote path ships a whole batch to the server in one
//!   `workspace/executeCommand` round trip (`lua.setConfig` / `lua.getConfig`),
//!   for values the server applies itself;
//! - the local path ([`apply_local_edits`]) reads and writes the editor's own
//!   store directly, for changes the editor must react to without a round
//!   trip.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::editor::ConfigStore;
use crate::protocol::{self, method};
use crate::transport::Transport;

/// What to do at a configuration key. A closed sum: only `Prop` carries a
/// sub-field name, so a stray `prop` cannot leak onto the other shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigAction {
    /// Replace the value at the key.
    Set { value: Value },
    /// Treat the current value as an ordered sequence and append.
    Add { value: Value },
    /// Treat the current value as a mapping and set one sub-field.
    Prop { prop: String, value: Value },
}

/// One configuration change, scoped to a document or workspace folder.
#[derive(Debug, Clone)]
pub struct ConfigEdit {
    /// Dot-scoped configuration identifier, e.g. `Lua.runtime.version`.
    pub key: String,
    /// Which document or folder the change applies to.
    pub uri: Url,
    /// Apply to the global store instead of the folder-scoped one.
    pub global: bool,
    pub action: ConfigAction,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// Protocol-level record for one edit: `{action, prop?, key, value, uri,
/// global?}`, with `prop` present only for prop-actions.
#[derive(Serialize)]
struct WireEdit<'a> {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prop: Option<&'a str>,
    key: &'a str,
    value: &'a Value,
    uri: &'a str,
    #[serde(skip_serializing_if = "is_false")]
    global: bool,
}

impl<'a> WireEdit<'a> {
    fn new(edit: &'a ConfigEdit) -> Self {
        let (action, prop, value) = match &edit.action {
            ConfigAction::Set { value } => ("set", None, value),
            ConfigAction::Add { value } => ("add", None, value),
            ConfigAction::Prop { prop, value } => ("prop", Some(prop.as_str()), value),
        };
        Self {
            action,
            prop,
            key: &edit.key,
            value,
            uri: edit.uri.as_str(),
            global: edit.global,
        }
    }
}

/// Ship a batch of edits to the server in a single round trip.
pub(crate) async fn push_edits(transport: &mut Transport, edits: &[ConfigEdit]) -> Result<()> {
    let records = edits
        .iter()
        .map(|edit| serde_json::to_value(WireEdit::new(edit)))
        .collect::<Result<Vec<_>, _>>()
        .context("serializing configuration changes")?;

    let params = protocol::execute_command_params(protocol::SET_CONFIG_COMMAND, records);
    transport
        .request(method::EXECUTE_COMMAND, Some(params))
        .await?;
    Ok(())
}

/// Read one configuration value from the server, untyped.
pub(crate) async fn fetch_value(
    transport: &mut Transport,
    scope: &Url,
    key: &str,
) -> Result<Value> {
    let params = protocol::execute_command_params(
        protocol::GET_CONFIG_COMMAND,
        vec![serde_json::json!({"uri": scope.as_str(), "key": key})],
    );
    transport.request(method::EXECUTE_COMMAND, Some(params)).await
}

/// Apply a batch of edits directly to the editor's configuration store.
///
/// The prop cache is keyed by configuration key and lives for exactly this
/// one invocation: two prop-edits to the same key inside one batch coalesce
/// through it, while separate invocations always re-read the store.
pub fn apply_local_edits(store: &dyn ConfigStore, edits: &[ConfigEdit]) -> Result<()> {
    let mut prop_cache: HashMap<String, serde_json::Map<String, Value>> = HashMap::new();

    for edit in edits {
        match &edit.action {
            ConfigAction::Set { value } => {
                store.update(&edit.uri, &edit.key, value.clone(), edit.global)?;
            }
            ConfigAction::Add { value } => {
                let mut sequence = match store.get(&edit.uri, &edit.key) {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                sequence.push(value.clone());
                store.update(&edit.uri, &edit.key, Value::Array(sequence), edit.global)?;
            }
            ConfigAction::Prop { prop, value } => {
                let mapping = prop_cache.entry(edit.key.clone()).or_insert_with(|| {
                    match store.get(&edit.uri, &edit.key) {
                        Some(Value::Object(map)) => map,
                        _ => serde_json::Map::new(),
                    }
                });
                mapping.insert(prop.clone(), value.clone());
                store.update(
                    &edit.uri,
                    &edit.key,
                    Value::Object(mapping.clone()),
                    edit.global,
                )?;
            }
        }
    }
    Ok(())
}
