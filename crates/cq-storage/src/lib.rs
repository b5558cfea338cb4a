//! Durable workspace persistence.
//!
//! Each named workspace is one flat key/value file holding the three source
//! buffers plus a save timestamp. Keys and values are hex-encoded per line,
//! so buffer content never interferes with the record format.

use cq_buffers::SourceSet;
use cq_core::EditorError;
use cq_core::EditorResult;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

const KEY_HTML: &str = "html";
const KEY_CSS: &str = "css";
const KEY_JS: &str = "js";
const KEY_TIMESTAMP: &str = "timestamp";

/// Durable storage configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageConfig {
    pub ephemeral_mode: bool,
}

/// A saved workspace: the three buffers plus when they were saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSnapshot {
    pub sources: SourceSet,
    pub timestamp_millis: u64,
}

/// Entry point for workspace persistence.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    pub config: StorageConfig,
    persistent_root: Option<PathBuf>,
}

impl WorkspaceStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            persistent_root: None,
        }
    }

    pub fn with_persistent_root(mut self, root: PathBuf) -> Self {
        self.persistent_root = Some(root);
        self
    }

    pub fn persistent_root(&self) -> Option<&Path> {
        self.persistent_root.as_deref()
    }

    pub fn store(
        &self,
        workspace: &str,
        sources: &SourceSet,
        timestamp_millis: u64,
    ) -> EditorResult<()> {
        let path = self.workspace_path(workspace)?;

        let mut map = BTreeMap::new();
        map.insert(KEY_HTML.to_owned(), sources.html.clone());
        map.insert(KEY_CSS.to_owned(), sources.css.clone());
        map.insert(KEY_JS.to_owned(), sources.js.clone());
        map.insert(KEY_TIMESTAMP.to_owned(), timestamp_millis.to_string());
        write_workspace_map(&path, &map)
    }

    /// Loads a workspace. A workspace that was never saved is `Ok(None)`,
    /// not an error.
    pub fn snapshot(&self, workspace: &str) -> EditorResult<Option<WorkspaceSnapshot>> {
        let path = self.workspace_path(workspace)?;
        if !path.exists() {
            return Ok(None);
        }

        let map = read_workspace_map(&path)?;
        let field = |key: &str| map.get(key).cloned().unwrap_or_default();

        let timestamp_millis = match map.get(KEY_TIMESTAMP) {
            Some(raw) => raw.parse::<u64>().map_err(|error| {
                EditorError::new(
                    "storage.workspace_timestamp_invalid",
                    format!("invalid timestamp in `{}`: {error}", path.display()),
                )
            })?,
            None => 0,
        };

        Ok(Some(WorkspaceSnapshot {
            sources: SourceSet {
                html: field(KEY_HTML),
                css: field(KEY_CSS),
                js: field(KEY_JS),
            },
            timestamp_millis,
        }))
    }

    pub fn remove(&self, workspace: &str) -> EditorResult<()> {
        let path = self.workspace_path(workspace)?;
        if !path.exists() {
            return Ok(());
        }

        fs::remove_file(&path).map_err(|error| {
            EditorError::new(
                "storage.workspace_remove_failed",
                format!(
                    "failed removing workspace file `{}`: {error}",
                    path.display()
                ),
            )
        })
    }

    fn workspace_path(&self, workspace: &str) -> EditorResult<PathBuf> {
        if self.config.ephemeral_mode {
            return Err(EditorError::new(
                "storage.persistence_disabled",
                "persistent storage is disabled in ephemeral mode",
            ));
        }

        let root = self.persistent_root.as_ref().ok_or_else(|| {
            EditorError::new(
                "storage.persistence_unconfigured",
                "persistent storage root is not configured",
            )
        })?;

        let name = sanitize_workspace_name(workspace);
        Ok(root.join("workspaces").join(format!("{name}.kv")))
    }
}

fn sanitize_workspace_name(input: &str) -> String {
    let mut out = String::new();
    for ch in input.trim().to_ascii_lowercase().chars() {
        if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }

    if out.is_empty() {
        "default".to_owned()
    } else {
        out
    }
}

fn read_workspace_map(path: &Path) -> EditorResult<BTreeMap<String, String>> {
    let content = fs::read_to_string(path).map_err(|error| {
        EditorError::new(
            "storage.workspace_read_failed",
            format!(
                "failed to read workspace file `{}`: {error}",
                path.display()
            ),
        )
    })?;

    let mut map = BTreeMap::new();
    for (index, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }

        let (key_hex, value_hex) = line.split_once('\t').ok_or_else(|| {
            EditorError::new(
                "storage.workspace_format_invalid",
                format!(
                    "invalid record format at `{}` line {}",
                    path.display(),
                    index + 1
                ),
            )
        })?;

        let key = decode_hex_string(key_hex)?;
        let value = decode_hex_string(value_hex)?;
        map.insert(key, value);
    }

    Ok(map)
}

fn write_workspace_map(path: &Path, map: &BTreeMap<String, String>) -> EditorResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| {
            EditorError::new(
                "storage.workspace_dir_create_failed",
                format!(
                    "failed to create workspace directory `{}`: {error}",
                    parent.display()
                ),
            )
        })?;
    }

    let mut encoded = String::new();
    for (key, value) in map {
        encoded.push_str(&encode_hex_string(key));
        encoded.push('\t');
        encoded.push_str(&encode_hex_string(value));
        encoded.push('\n');
    }

    fs::write(path, encoded).map_err(|error| {
        EditorError::new(
            "storage.workspace_write_failed",
            format!(
                "failed to write workspace file `{}`: {error}",
                path.display()
            ),
        )
    })
}

fn encode_hex_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len().saturating_mul(2));
    for byte in value.as_bytes() {
        out.push(hex_char(byte >> 4));
        out.push(hex_char(byte & 0x0f));
    }
    out
}

fn decode_hex_string(value: &str) -> EditorResult<String> {
    if !value.len().is_multiple_of(2) {
        return Err(EditorError::new(
            "storage.workspace_hex_invalid",
            "hex field length must be even",
        ));
    }

    let mut bytes = Vec::with_capacity(value.len() / 2);
    let chars: Vec<char> = value.chars().collect();
    let mut index = 0_usize;
    while index < chars.len() {
        let high = decode_hex_nibble(chars[index])?;
        let low = decode_hex_nibble(chars[index + 1])?;
        bytes.push((high << 4) | low);
        index += 2;
    }

    String::from_utf8(bytes).map_err(|error| {
        EditorError::new(
            "storage.workspace_utf8_invalid",
            format!("workspace field is not valid UTF-8: {error}"),
        )
    })
}

fn hex_char(value: u8) -> char {
    match value {
        0..=9 => (b'0' + value) as char,
        10..=15 => (b'a' + (value - 10)) as char,
        _ => '0',
    }
}

fn decode_hex_nibble(ch: char) -> EditorResult<u8> {
    match ch {
        '0'..='9' => Ok((ch as u8) - b'0'),
        'a'..='f' => Ok((ch as u8) - b'a' + 10),
        'A'..='F' => Ok((ch as u8) - b'A' + 10),
        _ => Err(EditorError::new(
            "storage.workspace_hex_invalid",
            format!("invalid hex character `{ch}`"),
        )),
    }
}
