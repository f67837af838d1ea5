//! Optional progress events emitted by the orchestrator, modeled on
//! `wrapper_events::NormalizedWrapperEvent`'s `kind`/`context` split. Exposed
//! as an opt-in callback parameter on `analyze`, never a global observer
//! (spec §9 "Event emission").

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum GeminiBridgeEventKind {
    AnalysisStart,
    AnalysisComplete,
    CacheHit,
    Output,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiBridgeEventContext {
    pub request_id: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiBridgeEvent {
    pub kind: GeminiBridgeEventKind,
    pub context: GeminiBridgeEventContext,
}

impl GeminiBridgeEvent {
    pub(crate) fn new(
        kind: GeminiBridgeEventKind,
        request_id: impl Into<String>,
        detail: Option<String>,
    ) -> Self {
        Self {
            kind,
            context: GeminiBridgeEventContext {
                request_id: request_id.into(),
                detail,
            },
        }
    }
}

/// A caller-supplied sink invoked synchronously at each progress point.
/// A plain function pointer rather than a channel type keeps this crate
/// decoupled from any particular async runtime's channel — a caller needing
/// a channel closes over `Sender::send` inside the closure.
pub type EventSink<'a> = &'a (dyn Fn(GeminiBridgeEvent) + Send + Sync);
