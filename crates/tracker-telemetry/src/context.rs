//! Per-request correlation span.

use tracing::span::EnteredSpan;
use tracing::Span;

/// Carries the identifiers that correlate log lines for a single
/// `track()` call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    profile_id: Option<String>,
    operation: Option<String>,
}

impl RequestContext {
    /// Start a context for `request_id`.
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            profile_id: None,
            operation: None,
        }
    }

    /// Start a context with a freshly generated request id.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// Attach the operation name (e.g. `"track"`).
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Attach the profile id, once resolved.
    #[must_use]
    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    /// Build the `tracing::Span` for this context. Entering it scopes
    /// every log line emitted inside to this request.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "track",
            request_id = %self.request_id,
            profile_id = self.profile_id.as_deref().unwrap_or("-"),
            operation = self.operation.as_deref().unwrap_or("-"),
        )
    }

    /// Enter the span, returning a guard that exits it on drop.
    #[must_use]
    pub fn enter(&self) -> RequestGuard {
        RequestGuard {
            _span: self.span().entered(),
        }
    }
}

/// Guard returned by [`RequestContext::enter`]; exits the span on drop.
pub struct RequestGuard {
    _span: EnteredSpan,
}
