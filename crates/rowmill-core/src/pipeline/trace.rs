//! Pipeline tracing boundary.
//!
//! Tracing is optional, injected by the caller, and must not affect
//! execution semantics.

///
/// PipelineTraceSink
///

pub trait PipelineTraceSink: Send + Sync {
    fn on_event(&self, event: PipelineTraceEvent);
}

///
/// PipelineTraceEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PipelineTraceEvent {
    Start {
        stages: u32,
    },
    /// A materializing stage finished buffering and re-emitting.
    StageMaterialized {
        action: String,
        rows: u64,
    },
    /// A row-scoped action failed on one row and was contained.
    ActionFailure {
        action: String,
        message: String,
    },
    Cancelled {
        rows_seen: u64,
    },
    Finish {
        rows_in: u64,
        rows_out: u64,
    },
}

///
/// TraceHandle
///
/// Thin wrapper over the injected sink so call sites stay quiet when no
/// sink is configured.
///

#[derive(Clone, Copy, Default)]
pub(crate) struct TraceHandle {
    sink: Option<&'static dyn PipelineTraceSink>,
}

impl TraceHandle {
    pub(crate) const fn new(sink: Option<&'static dyn PipelineTraceSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn emit(&self, event: PipelineTraceEvent) {
        if let Some(sink) = self.sink {
            sink.on_event(event);
        }
    }
}

impl std::fmt::Debug for TraceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceHandle")
            .field("attached", &self.sink.is_some())
            .finish()
    }
}
