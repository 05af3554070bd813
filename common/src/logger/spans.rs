use tracing::{Span, field};

use super::TraceId;

/// Root span for one user operation or event-loop message.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "op",
        name = %name,
        trace_id = %trace_id.as_str(),
        user = field::Empty,
        generation = field::Empty
    )
}

/// Child span (inherits trace_id from the enclosing root span).
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!("step", name = %name, tier = field::Empty)
}
