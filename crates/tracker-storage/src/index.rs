//! Logical index names and context-aware alias resolution (`spec.md` §6).

use std::fmt;

/// The logical document streams the tracking core persists into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    /// Sessions.
    Session,
    /// Profiles.
    Profile,
    /// Events.
    Event,
    /// Console-log records.
    ConsoleLog,
    /// Debug-info records.
    DebugInfo,
    /// Routing rules.
    Rule,
    /// Segment definitions.
    Segment,
    /// Flow/workflow definitions.
    Flow,
    /// Event sources.
    Source,
    /// Event-type tag metadata.
    EventTag,
}

impl Index {
    const fn slug(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Profile => "profile",
            Self::Event => "event",
            Self::ConsoleLog => "console-log",
            Self::DebugInfo => "debug-info",
            Self::Rule => "rule",
            Self::Segment => "segment",
            Self::Flow => "flow",
            Self::Source => "source",
            Self::EventTag => "event-tag",
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// Which alias set a deployment resolves index names against
/// (`spec.md` §6 "production vs staging server context").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexContext {
    /// Production alias set.
    Production,
    /// Staging alias set.
    Staging,
}

/// Resolves a logical [`Index`] to its write alias for the active
/// [`IndexContext`].
#[derive(Debug, Clone, Copy)]
pub struct IndexNaming {
    context: IndexContext,
}

impl IndexNaming {
    /// Build a resolver for `context`.
    #[must_use]
    pub fn new(context: IndexContext) -> Self {
        Self { context }
    }

    /// The write alias for `index` in this naming's context, e.g.
    /// `tracardi-event-production` / `tracardi-event-staging`.
    #[must_use]
    pub fn write_alias(&self, index: Index) -> String {
        let suffix = match self.context {
            IndexContext::Production => "production",
            IndexContext::Staging => "staging",
        };
        format!("tracardi-{}-{suffix}", index.slug())
    }
}
