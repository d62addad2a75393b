//! Line-oriented scope tracking for patch rules.
//!
//! A [`ScopeTracker`] walks a file one line at a time and answers three
//! questions for the rule driving it:
//!
//! - is the cursor inside the region the rule edits?
//! - has this tool already patched the file (the edit marker was seen)?
//! - has the rule already emitted its marker during this rewrite?
//!
//! The tracker never parses the language; it only looks at trimmed text.

/// Predicate over a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMatcher {
    /// Line contains the needle anywhere
    Contains(&'static str),
    /// Line equals the needle after trimming surrounding whitespace
    TrimmedEquals(&'static str),
    /// Line starts with the needle after trimming surrounding whitespace
    TrimmedStartsWith(&'static str),
}

impl LineMatcher {
    pub fn matches(&self, line: &str) -> bool {
        match self {
            LineMatcher::Contains(needle) => line.contains(needle),
            LineMatcher::TrimmedEquals(needle) => line.trim() == *needle,
            LineMatcher::TrimmedStartsWith(needle) => line.trim().starts_with(needle),
        }
    }
}

/// How a scope ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeExit {
    /// First line that trims to `}`
    ClosingBrace,
    /// Line that trims to `}` once nested `{` / `}` lines balance out
    BalancedBrace,
}

/// Where the edit marker counts as "already patched".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPolicy {
    /// Marker anywhere in the file
    Anywhere,
    /// Marker only counts on lines inside the scope
    InScope,
}

/// Enter/exit predicates for a scoped rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeSpec {
    pub enter: LineMatcher,
    pub exit: ScopeExit,
}

/// Mutable per-rewrite state. Created fresh for every file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeState {
    pub in_scope: bool,
    pub marker_detected: bool,
    pub marker_added: bool,
    pub depth: i32,
}

/// What the tracker observed about the line it was just fed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineEvent {
    /// Line lies inside the scope (entering and closing lines included)
    pub in_scope: bool,
    /// Scope opened on this line
    pub entered: bool,
    /// Scope closed on this line
    pub exited: bool,
    /// Brace depth after this line (balanced scopes only)
    pub depth: i32,
}

#[derive(Debug, Clone)]
pub struct ScopeTracker {
    scope: Option<ScopeSpec>,
    marker_policy: MarkerPolicy,
    marker: String,
    state: ScopeState,
}

impl ScopeTracker {
    pub fn new(
        scope: Option<ScopeSpec>,
        marker_policy: MarkerPolicy,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            scope,
            marker_policy,
            marker: marker.into(),
            state: ScopeState::default(),
        }
    }

    /// Advance the state machine by one line.
    pub fn observe(&mut self, line: &str) -> LineEvent {
        let mut event = LineEvent::default();

        if let Some(spec) = &self.scope {
            if !self.state.in_scope && spec.enter.matches(line) {
                self.state.in_scope = true;
                self.state.depth = 0;
                event.entered = true;
            }
        }

        let marker_visible = match self.marker_policy {
            MarkerPolicy::Anywhere => true,
            MarkerPolicy::InScope => self.state.in_scope,
        };
        if marker_visible && line.contains(self.marker.as_str()) {
            self.state.marker_detected = true;
        }

        if let Some(spec) = &self.scope {
            if self.state.in_scope {
                event.in_scope = true;
                let trimmed = line.trim();
                match spec.exit {
                    ScopeExit::ClosingBrace => {
                        if trimmed == "}" {
                            event.exited = true;
                        }
                    }
                    ScopeExit::BalancedBrace => {
                        if trimmed == "{" {
                            self.state.depth += 1;
                        } else if trimmed == "}" {
                            self.state.depth -= 1;
                            if self.state.depth == 0 {
                                event.exited = true;
                            }
                        }
                    }
                }
                event.depth = self.state.depth;
                if event.exited {
                    self.state.in_scope = false;
                    self.state.depth = 0;
                }
            }
        }

        event
    }

    /// Record that the rule emitted its marker.
    pub fn mark_added(&mut self) {
        self.state.marker_added = true;
    }

    pub fn state(&self) -> &ScopeState {
        &self.state
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }
}
