/// Consecutive empty extractions after which a run gives up.
pub const STAGNATION_LIMIT: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Failed {
        reason: String,
    },
    Stopped,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::Completed | RunPhase::Failed { .. } | RunPhase::Stopped
        )
    }
}

/// Final report of a single-target run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub phase: RunPhase,
    pub total_records: usize,
    pub last_page: Option<u32>,
}

impl RunOutcome {
    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            RunPhase::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Counters and phase of one paginated run. Transitions out of `Running`
/// happen once; later calls are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageRunState {
    current_page: Option<u32>,
    max_page: Option<u32>,
    total_records: usize,
    stagnation_count: u32,
    phase: RunPhase,
}

impl PageRunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) -> bool {
        if self.phase != RunPhase::Idle {
            return false;
        }
        self.phase = RunPhase::Running;
        true
    }

    pub fn is_running(&self) -> bool {
        self.phase == RunPhase::Running
    }

    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    pub fn current_page(&self) -> Option<u32> {
        self.current_page
    }

    pub fn max_page(&self) -> Option<u32> {
        self.max_page
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn stagnation_count(&self) -> u32 {
        self.stagnation_count
    }

    pub fn record_page_info(&mut self, current_page: Option<u32>, max_page: Option<u32>) {
        self.current_page = current_page;
        self.max_page = max_page;
    }

    /// Counts one extraction attempt. `None` means the attempt failed.
    ///
    /// Returns `false` once the stagnation guard has ended the run.
    pub fn record_extraction(&mut self, found: Option<usize>) -> bool {
        if !self.is_running() {
            return false;
        }
        match found {
            Some(count) if count > 0 => {
                self.total_records += count;
                self.stagnation_count = 0;
            }
            _ => {
                self.stagnation_count += 1;
                if self.stagnation_count >= STAGNATION_LIMIT {
                    self.fail(format!(
                        "no records extracted in {} consecutive attempts",
                        self.stagnation_count
                    ));
                    return false;
                }
            }
        }
        true
    }

    pub fn complete(&mut self) {
        self.finish(RunPhase::Completed);
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.finish(RunPhase::Failed {
            reason: reason.into(),
        });
    }

    pub fn stop(&mut self) {
        self.finish(RunPhase::Stopped);
    }

    pub fn outcome(&self) -> Option<RunOutcome> {
        self.phase.is_terminal().then(|| RunOutcome {
            phase: self.phase.clone(),
            total_records: self.total_records,
            last_page: self.current_page,
        })
    }

    fn finish(&mut self, phase: RunPhase) {
        if self.is_running() {
            self.phase = phase;
        }
    }
}
