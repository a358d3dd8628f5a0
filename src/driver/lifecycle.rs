//! Query lifecycle: Idle → QuerySent → ResultsPending → Drained → Idle.

/// Where a connection is in its current query's result-retrieval cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryState {
    #[default]
    Idle,
    /// A submission entry point succeeded.
    QuerySent,
    /// At least one result has been fetched.
    ResultsPending,
    /// The terminal null result was observed; the cache is being cleared.
    Drained,
}

impl QueryState {
    /// Record a successful send. Returns false if the previous query was
    /// never drained.
    pub(crate) fn on_sent(&mut self) -> bool {
        let was_idle = *self == QueryState::Idle;
        *self = QueryState::QuerySent;
        was_idle
    }

    pub(crate) fn on_result(&mut self) {
        *self = QueryState::ResultsPending;
    }

    /// Record the terminal null result. Returns true when this is the
    /// transition into `Drained` (and the cache must be cleared); repeated
    /// terminal signals while idle return false.
    pub(crate) fn on_terminal(&mut self) -> bool {
        match self {
            QueryState::QuerySent | QueryState::ResultsPending => {
                *self = QueryState::Drained;
                true
            }
            QueryState::Idle | QueryState::Drained => false,
        }
    }

    pub(crate) fn on_cleared(&mut self) {
        *self = QueryState::Idle;
    }
}
