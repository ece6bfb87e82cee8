//! Mock Endpoint State Management
//!
//! Tracks accepted runs and their scripted state progressions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use wes_protocol::{RunRequest, RunState};

/// Progression used when none is configured
pub const DEFAULT_PROGRESSION: [RunState; 3] = [RunState::Queued, RunState::Running, RunState::Complete];

/// A run accepted by the mock endpoint
#[derive(Debug, Clone)]
pub struct MockRun {
    pub run_id: String,
    /// Request as received
    pub request: RunRequest,
    /// States reported by successive status queries; the last one repeats
    pub progression: Vec<RunState>,
    /// Index of the next state to report
    pub cursor: usize,
    /// Held runs keep reporting their current state
    pub held: bool,
    pub created_at: DateTime<Utc>,
}

impl MockRun {
    pub fn new(run_id: String, request: RunRequest, progression: Vec<RunState>) -> Self {
        Self {
            run_id,
            request,
            progression,
            cursor: 0,
            held: false,
            created_at: Utc::now(),
        }
    }

    /// State the next status query will report, without advancing
    pub fn current(&self) -> RunState {
        self.progression
            .get(self.cursor)
            .or_else(|| self.progression.last())
            .copied()
            .unwrap_or(RunState::Unknown)
    }

    /// Report the current state and step forward
    pub fn advance(&mut self) -> RunState {
        let state = self.current();
        if !self.held && self.cursor + 1 < self.progression.len() {
            self.cursor += 1;
        }
        state
    }

    /// Pin the run to a single state
    pub fn set_state(&mut self, state: RunState) {
        self.progression = vec![state];
        self.cursor = 0;
    }
}

/// Mutable mock endpoint state
#[derive(Debug)]
pub struct MockState {
    /// Runs keyed by run id
    pub runs: BTreeMap<String, MockRun>,
    /// Run ids in acceptance order
    pub started: Vec<String>,
    /// Progression given to newly accepted runs
    pub default_progression: Vec<RunState>,
    /// Number of status queries answered or failed
    pub status_calls: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            runs: BTreeMap::new(),
            started: Vec::new(),
            default_progression: DEFAULT_PROGRESSION.to_vec(),
            status_calls: 0,
        }
    }
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly accepted run
    pub fn accept(&mut self, run_id: String, request: RunRequest) {
        let run = MockRun::new(run_id.clone(), request, self.default_progression.clone());
        self.started.push(run_id.clone());
        self.runs.insert(run_id, run);
    }

    pub fn get(&self, run_id: &str) -> Option<&MockRun> {
        self.runs.get(run_id)
    }

    pub fn get_mut(&mut self, run_id: &str) -> Option<&mut MockRun> {
        self.runs.get_mut(run_id)
    }
}
