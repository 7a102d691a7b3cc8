//! Shared fixtures for the store scenario tests.
#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use statetree_store::{ModuleDef, Store, Value};
use tracing::subscriber::DefaultGuard;

/// In-memory sink for `tracing` output.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }
}

pub struct LogWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            buffer: self.buffer.clone(),
        }
    }
}

/// Route every event on this thread into a fresh capture until the guard
/// is dropped.
pub fn capture_logs() -> (LogCapture, DefaultGuard) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}

pub fn json(value: serde_json::Value) -> Value {
    Value::from(value)
}

/// Add `by` to the integer field `key` of `state`.
pub fn bump(state: &mut Value, key: &str, by: i64) {
    if let Some(field) = state.field_mut(key) {
        *field = Value::from(field.as_i64().unwrap_or(0) + by);
    }
}

pub fn int_field(state: &Value, key: &str) -> i64 {
    state.field(key).and_then(Value::as_i64).unwrap_or(0)
}

/// `{count: 0}` with `increment`, `add(n)` and a `double` getter.
pub fn counter_module() -> ModuleDef {
    ModuleDef::new()
        .state(json(serde_json::json!({"count": 0})))
        .mutation("increment", |state, _| bump(state, "count", 1))
        .mutation("add", |state, payload| {
            bump(state, "count", payload.as_i64().unwrap_or(0))
        })
        .getter("double", |state, _, _, _| {
            Value::from(int_field(state, "count") * 2)
        })
}

pub fn count(store: &Store) -> i64 {
    int_field(&store.state(), "count")
}
