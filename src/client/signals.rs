//! Signals from the request layer to the UI layer.

use crate::error_kind::ApiErrorKind;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Events the UI must react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// The session was cleared after an `auth`/`forbidden` response; navigate to login.
    LoginRequired {
        kind: ApiErrorKind,
        status: Option<u16>,
    },
}

/// Destination for [`SessionSignal`]s (router, event bus, ...).
#[async_trait]
pub trait SessionSignalSink: Send + Sync {
    async fn emit(&self, signal: SessionSignal);
}

/// Drops every signal.
pub struct NoopSignalSink;

#[async_trait]
impl SessionSignalSink for NoopSignalSink {
    async fn emit(&self, _signal: SessionSignal) {}
}

pub fn noop_sink() -> Arc<dyn SessionSignalSink> {
    Arc::new(NoopSignalSink)
}

/// Records signals in memory, for testing.
#[derive(Default)]
pub struct InMemorySignalSink {
    signals: RwLock<Vec<SessionSignal>>,
}

impl InMemorySignalSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<SessionSignal> {
        self.signals
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.signals.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionSignalSink for InMemorySignalSink {
    async fn emit(&self, signal: SessionSignal) {
        self.signals
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(signal);
    }
}
