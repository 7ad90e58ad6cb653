//! Provtrace recording.
//!
//! # Responsibility
//! - Keep a textual `provtrace v3` log of kernel operations.
//! - Render values with C-style escaping so each event stays on one line.
//!
//! # Invariants
//! - The first two lines are always the format header and `create myself`.
//! - Lines are appended in the order operations completed.

use crate::model::handle::Handle;
use crate::model::pnode::Version;
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

pub const TRACE_FORMAT_HEADER: &str = "format provtrace v3";
const SELF_NAME: &str = "myself";

/// Append-only provtrace buffer.
#[derive(Debug)]
pub struct ProvTrace {
    lines: Mutex<Vec<String>>,
}

impl Default for ProvTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvTrace {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(vec![
                TRACE_FORMAT_HEADER.to_string(),
                format!("create {SELF_NAME}"),
            ]),
        }
    }

    /// `phony <new> <adjacent|myself>`
    pub fn record_phony(&self, node: Handle, adjacent: Option<Handle>) {
        self.push(format!("phony {node} {}", subject_name(adjacent)));
    }

    /// `freeze <handle>`
    pub fn record_freeze(&self, node: Handle) {
        self.push(format!("freeze {node}"));
    }

    /// `add <source> <key> -> <target> <version>`
    pub fn record_xref(&self, source: Handle, key: &str, target: Handle, version: Version) {
        self.push(format!("add {source} {key} -> {target} {version}"));
    }

    /// `add <source> <key> :: "<escaped value>"`
    pub fn record_str(&self, source: Handle, key: &str, value: &str) {
        self.push(format!("add {source} {key} :: {}", escape_string(value)));
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Renders the trace with one event per line and a trailing newline.
    pub fn render(&self) -> String {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();
        for line in lines.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    fn push(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }
}

fn subject_name(handle: Option<Handle>) -> String {
    match handle {
        Some(handle) => handle.to_string(),
        None => SELF_NAME.to_string(),
    }
}

/// Quotes `value` and escapes control, quote, backslash and non-ASCII bytes.
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for byte in value.bytes() {
        match byte {
            0x07 => out.push_str("\\a"),
            0x08 => out.push_str("\\b"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            0x0b => out.push_str("\\v"),
            0x0c => out.push_str("\\f"),
            b'\r' => out.push_str("\\r"),
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            32..=126 => out.push(byte as char),
            other => {
                let _ = write!(out, "\\{other:03o}");
            }
        }
    }
    out.push('"');
    out
}
