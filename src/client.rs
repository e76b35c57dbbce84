//! Authenticated request facade.
//!
//! Developer-friendly goal: keep the public surface small and predictable.
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
pub mod error_classification;
pub mod request;
pub mod signals;
mod validation;

pub use builder::ApiClientBuilder;
pub use core::ApiClient;
pub use error_classification::{classify, classify_kind, FailureSignal};
pub use request::{CompletionPredicate, RequestDescriptor};
pub use signals::{noop_sink, InMemorySignalSink, NoopSignalSink, SessionSignal, SessionSignalSink};
