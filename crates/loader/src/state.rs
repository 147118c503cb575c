use log::debug;
use std::fmt;

/// Where a run is. `Failed` can follow any state and is always followed by
/// `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Configured,
    Connected,
    FormatCreated,
    TableCreated,
    StageCreated,
    Loaded,
    Closed,
    Failed,
}

impl PipelineState {
    /// The state a successful step moves to.
    pub fn next(self) -> Option<PipelineState> {
        use PipelineState::*;
        match self {
            Init => Some(Configured),
            Configured => Some(Connected),
            Connected => Some(FormatCreated),
            FormatCreated => Some(TableCreated),
            TableCreated => Some(StageCreated),
            StageCreated => Some(Loaded),
            Loaded | Failed => Some(Closed),
            Closed => None,
        }
    }

    pub fn can_move_to(self, to: PipelineState) -> bool {
        match to {
            PipelineState::Failed => !matches!(self, PipelineState::Closed | PipelineState::Failed),
            _ => self.next() == Some(to),
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Ordered record of the states a run passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrace {
    states: Vec<PipelineState>,
}

impl Default for StateTrace {
    fn default() -> Self {
        Self {
            states: vec![PipelineState::Init],
        }
    }
}

impl StateTrace {
    pub fn current(&self) -> PipelineState {
        self.states
            .last()
            .copied()
            .unwrap_or(PipelineState::Init)
    }

    /// Record a move. Returns false, recording nothing, for an illegal one.
    pub fn advance(&mut self, to: PipelineState) -> bool {
        let from = self.current();
        if !from.can_move_to(to) {
            debug!("ignoring illegal transition {} -> {}", from, to);
            return false;
        }
        debug!("{} -> {}", from, to);
        self.states.push(to);
        true
    }

    /// Move to `Failed` then `Closed` from wherever the run is.
    pub fn fail_and_close(&mut self) {
        self.advance(PipelineState::Failed);
        self.advance(PipelineState::Closed);
    }

    pub fn states(&self) -> &[PipelineState] {
        &self.states
    }

    pub fn into_states(self) -> Vec<PipelineState> {
        self.states
    }
}
