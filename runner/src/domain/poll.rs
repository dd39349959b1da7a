/// Outcome of one probe of a bounded polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState<T> {
    /// Target not reached yet; probe again on the next tick.
    Waiting,
    /// Target reached; the loop resolves with the value.
    Satisfied(T),
    /// The bound elapsed before the target was reached.
    TimedOut,
}

impl<T> PollState<T> {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Waiting)
    }

    /// The resolved value, if any.
    pub fn into_satisfied(self) -> Option<T> {
        match self {
            PollState::Satisfied(value) => Some(value),
            PollState::Waiting | PollState::TimedOut => None,
        }
    }
}

impl<T> From<Option<T>> for PollState<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(PollState::Waiting, PollState::Satisfied)
    }
}
