//! Hooks the core consumes from its host: edit and reload gates, a tracing
//! sink and cooperative cancellation.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use crate::{culture::CultureKey, entity::ResourceEntity, error::Error};

/// Gates consulted before destructive or file-creating operations.
pub trait ResourceHost: Send + Sync {
    /// Called before a language file is created on demand or a read-only
    /// file is made writable. Returning false rejects the edit.
    fn begin_editing(&self, entity: &ResourceEntity, culture: &CultureKey) -> bool {
        let _ = (entity, culture);
        true
    }

    /// Called before unsaved changes are discarded by a reload.
    fn reloading(&self) -> bool {
        true
    }
}

/// A host that allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl ResourceHost for AllowAll {}

/// A host that denies every gate. Useful for read-only tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl ResourceHost for DenyAll {
    fn begin_editing(&self, _entity: &ResourceEntity, _culture: &CultureKey) -> bool {
        false
    }

    fn reloading(&self) -> bool {
        false
    }
}

/// Sink for failures and progress the core reports instead of owning any UI.
pub trait Tracer: Send + Sync {
    fn trace_error(&self, message: &str);
    fn trace_warning(&self, message: &str);
    fn write_line(&self, message: &str);
}

/// Forwards to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn trace_error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn trace_warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn write_line(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLevel {
    Error,
    Warning,
    Info,
}

/// Keeps every message in memory, and forwards them to `tracing` as well.
#[derive(Debug, Default)]
pub struct MemoryTracer {
    messages: Mutex<Vec<(TraceLevel, String)>>,
}

impl MemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(TraceLevel, String)> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Messages of one level only.
    pub fn messages_at(&self, level: TraceLevel) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message)
            .collect()
    }

    fn push(&self, level: TraceLevel, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, message.to_string()));
        }
    }
}

impl Tracer for MemoryTracer {
    fn trace_error(&self, message: &str) {
        LogTracer.trace_error(message);
        self.push(TraceLevel::Error, message);
    }

    fn trace_warning(&self, message: &str) {
        LogTracer.trace_warning(message);
        self.push(TraceLevel::Warning, message);
    }

    fn write_line(&self, message: &str) {
        LogTracer.write_line(message);
        self.push(TraceLevel::Info, message);
    }
}

/// Cooperative cancellation flag, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Returns [`Error::Canceled`] once [`CancellationToken::cancel`] was called.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_canceled() {
            Err(Error::Canceled)
        } else {
            Ok(())
        }
    }
}
