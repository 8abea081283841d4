use std::fs;
use std::io;
use std::path::Path;

use agentpack_core::{
    Error, MANAGED_SERVER_KEY, MCP_INPUTS_FIELD, MCP_SERVERS_FIELD, SETTINGS_AGENT_FILES_FIELD,
    SETTINGS_PARENT_FIELD,
};
use serde_json::{Map, Value};

use crate::fs_utils::remove_file_if_exists;
use crate::types::{McpEdit, SettingsEdit, SettingsEditMode};

/// Appends `agent_path` to the agent-files array, top-level or nested one
/// level under the `chat` key, whichever the document already uses. Never
/// coerces a non-array value and never introduces duplicates.
pub fn apply_settings_edit(path: &Path, agent_path: &str) -> Result<SettingsEdit, Error> {
    let mut doc = read_json_object(path)?;
    let mode = locate_settings_mode(&doc);

    match settings_slot(&doc, mode) {
        Some(Value::Array(items)) => {
            if items.iter().any(|item| item.as_str() == Some(agent_path)) {
                return Ok(SettingsEdit {
                    file: path.to_path_buf(),
                    agent_path: agent_path.to_string(),
                    mode,
                    added: false,
                });
            }
        }
        Some(_) => {
            return Err(Error::SettingsFieldNotArray {
                field: SETTINGS_AGENT_FILES_FIELD.to_string(),
                file: path.to_path_buf(),
            });
        }
        None => {}
    }

    let Some(array) = settings_slot_mut(&mut doc, mode, true) else {
        return Err(Error::SettingsFieldNotArray {
            field: SETTINGS_AGENT_FILES_FIELD.to_string(),
            file: path.to_path_buf(),
        });
    };
    array.push(Value::String(agent_path.to_string()));

    write_json_object(path, &doc)?;
    Ok(SettingsEdit {
        file: path.to_path_buf(),
        agent_path: agent_path.to_string(),
        mode,
        added: true,
    })
}

/// Removes exactly one occurrence of the recorded value from the array at
/// the recorded location. A missing file or array is an explicit error, not
/// a silent success; the caller decides what that means for the operation.
pub fn revert_settings_edit(edit: &SettingsEdit) -> Result<(), Error> {
    if !edit.added {
        return Ok(());
    }

    let Some(mut doc) = read_optional_json_object(&edit.file)? else {
        return Err(Error::ConfigMissing {
            file: edit.file.clone(),
        });
    };

    let Some(value) = settings_slot_mut_value(&mut doc, edit.mode) else {
        return Err(Error::SettingsFieldMissing {
            field: SETTINGS_AGENT_FILES_FIELD.to_string(),
            file: edit.file.clone(),
        });
    };
    let Some(array) = value.as_array_mut() else {
        return Err(Error::SettingsFieldNotArray {
            field: SETTINGS_AGENT_FILES_FIELD.to_string(),
            file: edit.file.clone(),
        });
    };
    let Some(position) = array
        .iter()
        .position(|item| item.as_str() == Some(edit.agent_path.as_str()))
    else {
        return Err(Error::SettingsEntryMissing {
            field: SETTINGS_AGENT_FILES_FIELD.to_string(),
            value: edit.agent_path.clone(),
            file: edit.file.clone(),
        });
    };
    array.remove(position);

    write_json_object(&edit.file, &doc)
}

/// Writes the managed server entry's command, preserving every unrelated
/// server and the `inputs` block. The `hadPrevious`/`previous` baseline is
/// carried forward from `previous` once recorded — the system's own earlier
/// write is never re-snapshotted as if the user had authored it.
pub fn apply_mcp_edit(
    path: &Path,
    command: &str,
    previous: Option<&McpEdit>,
) -> Result<McpEdit, Error> {
    let mut doc = read_json_object(path)?;

    match doc.get(MCP_SERVERS_FIELD) {
        None => {
            doc.insert(MCP_SERVERS_FIELD.to_string(), Value::Object(Map::new()));
        }
        Some(Value::Object(_)) => {}
        Some(_) => {
            return Err(Error::McpFieldNotObject {
                field: MCP_SERVERS_FIELD.to_string(),
                file: path.to_path_buf(),
            });
        }
    }
    if doc.get(MCP_INPUTS_FIELD).is_none() {
        doc.insert(MCP_INPUTS_FIELD.to_string(), Value::Object(Map::new()));
    }

    let Some(servers) = doc
        .get_mut(MCP_SERVERS_FIELD)
        .and_then(Value::as_object_mut)
    else {
        return Err(Error::McpFieldNotObject {
            field: MCP_SERVERS_FIELD.to_string(),
            file: path.to_path_buf(),
        });
    };

    let (had_previous, previous_value) = match previous {
        Some(prev) if prev.touched => (prev.had_previous, prev.previous.clone()),
        _ => match servers.get(MANAGED_SERVER_KEY) {
            Some(value) => (true, Some(value.clone())),
            None => (false, None),
        },
    };

    match servers.get_mut(MANAGED_SERVER_KEY) {
        Some(Value::Object(entry)) => {
            entry.insert("command".to_string(), Value::String(command.to_string()));
        }
        _ => {
            let mut entry = Map::new();
            entry.insert("type".to_string(), Value::String("stdio".to_string()));
            entry.insert("command".to_string(), Value::String(command.to_string()));
            servers.insert(MANAGED_SERVER_KEY.to_string(), Value::Object(entry));
        }
    }

    write_json_object(path, &doc)?;
    Ok(McpEdit {
        file: path.to_path_buf(),
        key: MANAGED_SERVER_KEY.to_string(),
        touched: true,
        had_previous,
        previous: previous_value,
    })
}

/// Restores the exact pre-management value of the managed key, or deletes
/// the key when there was none. A `servers` field that is present but not an
/// object surfaces as an error here too, never a silent skip.
pub fn revert_mcp_edit(edit: &McpEdit) -> Result<(), Error> {
    if !edit.touched {
        return Ok(());
    }

    let mut doc = match read_optional_json_object(&edit.file)? {
        Some(doc) => doc,
        None => {
            if edit.had_previous {
                return Err(Error::ConfigMissing {
                    file: edit.file.clone(),
                });
            }
            return Ok(());
        }
    };

    match doc.get_mut(MCP_SERVERS_FIELD) {
        Some(Value::Object(servers)) => {
            if edit.had_previous {
                servers.insert(edit.key.clone(), baseline_value(edit)?);
            } else {
                servers.shift_remove(&edit.key);
            }
        }
        Some(_) => {
            return Err(Error::McpFieldNotObject {
                field: MCP_SERVERS_FIELD.to_string(),
                file: edit.file.clone(),
            });
        }
        None => {
            if !edit.had_previous {
                return Ok(());
            }
            let mut servers = Map::new();
            servers.insert(edit.key.clone(), baseline_value(edit)?);
            doc.insert(MCP_SERVERS_FIELD.to_string(), Value::Object(servers));
        }
    }

    write_json_object(&edit.file, &doc)
}

fn baseline_value(edit: &McpEdit) -> Result<Value, Error> {
    edit.previous.clone().ok_or_else(|| Error::RevertFailed {
        detail: format!(
            "mcp baseline for key '{}' is missing its previous value",
            edit.key
        ),
    })
}

fn locate_settings_mode(doc: &Map<String, Value>) -> SettingsEditMode {
    if doc.contains_key(SETTINGS_AGENT_FILES_FIELD) {
        return SettingsEditMode::Direct;
    }
    let nested = doc
        .get(SETTINGS_PARENT_FIELD)
        .and_then(Value::as_object)
        .is_some_and(|parent| parent.contains_key(SETTINGS_AGENT_FILES_FIELD));
    if nested {
        SettingsEditMode::Nested
    } else {
        SettingsEditMode::Direct
    }
}

fn settings_slot<'a>(doc: &'a Map<String, Value>, mode: SettingsEditMode) -> Option<&'a Value> {
    match mode {
        SettingsEditMode::Direct => doc.get(SETTINGS_AGENT_FILES_FIELD),
        SettingsEditMode::Nested => doc
            .get(SETTINGS_PARENT_FIELD)?
            .as_object()?
            .get(SETTINGS_AGENT_FILES_FIELD),
    }
}

fn settings_slot_mut_value<'a>(
    doc: &'a mut Map<String, Value>,
    mode: SettingsEditMode,
) -> Option<&'a mut Value> {
    match mode {
        SettingsEditMode::Direct => doc.get_mut(SETTINGS_AGENT_FILES_FIELD),
        SettingsEditMode::Nested => doc
            .get_mut(SETTINGS_PARENT_FIELD)?
            .as_object_mut()?
            .get_mut(SETTINGS_AGENT_FILES_FIELD),
    }
}

/// Mutable access to the array slot, optionally creating an empty array at
/// the slot. Returns `None` when the slot holds a non-array value.
fn settings_slot_mut<'a>(
    doc: &'a mut Map<String, Value>,
    mode: SettingsEditMode,
    create: bool,
) -> Option<&'a mut Vec<Value>> {
    let slot = match mode {
        SettingsEditMode::Direct => {
            if create && !doc.contains_key(SETTINGS_AGENT_FILES_FIELD) {
                doc.insert(
                    SETTINGS_AGENT_FILES_FIELD.to_string(),
                    Value::Array(Vec::new()),
                );
            }
            doc.get_mut(SETTINGS_AGENT_FILES_FIELD)?
        }
        SettingsEditMode::Nested => {
            let parent = doc.get_mut(SETTINGS_PARENT_FIELD)?.as_object_mut()?;
            if create && !parent.contains_key(SETTINGS_AGENT_FILES_FIELD) {
                parent.insert(
                    SETTINGS_AGENT_FILES_FIELD.to_string(),
                    Value::Array(Vec::new()),
                );
            }
            parent.get_mut(SETTINGS_AGENT_FILES_FIELD)?
        }
    };
    slot.as_array_mut()
}

fn read_json_object(path: &Path) -> Result<Map<String, Value>, Error> {
    Ok(read_optional_json_object(path)?.unwrap_or_default())
}

fn read_optional_json_object(path: &Path) -> Result<Option<Map<String, Value>>, Error> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(Error::io(format!("failed to read {}", path.display()), err));
        }
    };

    if raw.trim().is_empty() {
        return Ok(Some(Map::new()));
    }

    let value: Value = serde_json::from_str(&raw).map_err(|err| Error::ConfigUnreadable {
        file: path.to_path_buf(),
        detail: err.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(Error::ConfigNotObject {
            file: path.to_path_buf(),
        }),
    }
}

/// Serializes the whole document back, pretty-printed, via a sibling temp
/// file and rename. Unrelated keys round-trip untouched; key order is
/// preserved by the order-preserving document model.
fn write_json_object(path: &Path, doc: &Map<String, Value>) -> Result<(), Error> {
    let mut payload = serde_json::to_string_pretty(doc).map_err(|err| Error::ConfigUnreadable {
        file: path.to_path_buf(),
        detail: err.to_string(),
    })?;
    payload.push('\n');

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config.json".to_string());
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    fs::write(&tmp, payload)
        .map_err(|err| Error::io(format!("failed to write {}", tmp.display()), err))?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = remove_file_if_exists(&tmp);
        return Err(Error::io(format!("failed to write {}", path.display()), err));
    }
    Ok(())
}
