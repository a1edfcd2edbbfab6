#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use linkqueue_engine::{
    BreakScheduler, BreakSettings, DurableWakeTimer, EngineError, ExtractionPort, KeepAwake,
    OrchestratorParts, PacingSettings, PageExtraction, PageInfo, ProfileTarget, QueueOrchestrator,
    RecordSaver, ScrapedProfile, SharedQueue, Storage,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub fn fast_pacing() -> PacingSettings {
    PacingSettings {
        page_delay_min: Duration::from_millis(1),
        page_delay_max: Duration::from_millis(3),
        ready_budget: Duration::from_millis(10),
        navigation_settle: Duration::from_millis(1),
    }
}

pub fn short_breaks() -> BreakSettings {
    BreakSettings {
        min: Duration::from_millis(5),
        max: Duration::from_millis(15),
        poll_interval: Duration::from_millis(2),
    }
}

#[derive(Default)]
struct PortState {
    current_url: String,
    page: usize,
    navigations: Vec<String>,
    notifications: Vec<bool>,
    closed: bool,
}

impl PortState {
    fn check_open(&self) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::TargetClosed("browser window closed".into()));
        }
        Ok(())
    }
}

/// Port over a fake site: each URL has a list of pages, each page a number
/// of profiles.
#[derive(Default)]
pub struct ScriptedPort {
    pages: HashMap<String, Vec<usize>>,
    broken: HashSet<String>,
    profile_targets: HashMap<String, ProfileTarget>,
    extract_delay: Duration,
    closed_after: Option<usize>,
    state: Mutex<PortState>,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(mut self, url: &str, pages: &[usize]) -> Self {
        self.pages.insert(url.to_string(), pages.to_vec());
        self
    }

    /// Page info fails on this URL.
    pub fn with_broken(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }

    pub fn with_profile(mut self, profile_url: &str, connections_url: &str, name: &str) -> Self {
        self.profile_targets.insert(
            profile_url.to_string(),
            ProfileTarget {
                connections_url: connections_url.to_string(),
                profile_name: Some(name.to_string()),
            },
        );
        self
    }

    pub fn with_extract_delay(mut self, delay: Duration) -> Self {
        self.extract_delay = delay;
        self
    }

    /// The browser goes away once `navigations` navigations have happened.
    pub fn with_closed_after(mut self, navigations: usize) -> Self {
        self.closed_after = Some(navigations);
        self
    }

    /// Closes the browser now; every later call fails.
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn notifications(&self) -> Vec<bool> {
        self.state.lock().unwrap().notifications.clone()
    }

    fn page_count(&self, url: &str) -> usize {
        self.pages.get(url).map_or(1, Vec::len)
    }
}

#[async_trait]
impl ExtractionPort for ScriptedPort {
    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        if self
            .closed_after
            .is_some_and(|limit| state.navigations.len() >= limit)
        {
            state.closed = true;
        }
        state.check_open()?;
        state.current_url = url.to_string();
        state.page = 0;
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn page_info(&self) -> Result<PageInfo, EngineError> {
        let state = self.state.lock().unwrap();
        state.check_open()?;
        if self.broken.contains(&state.current_url) {
            return Err(EngineError::ExtractionFailed("no results list".into()));
        }
        Ok(PageInfo {
            current_page: Some(state.page as u32 + 1),
            max_page: Some(self.page_count(&state.current_url) as u32),
        })
    }

    async fn wait_until_ready(&self, _budget: Duration) -> Result<(), EngineError> {
        Ok(())
    }

    async fn extract_current_page(&self) -> Result<PageExtraction, EngineError> {
        if !self.extract_delay.is_zero() {
            tokio::time::sleep(self.extract_delay).await;
        }
        let state = self.state.lock().unwrap();
        state.check_open()?;
        let count = self
            .pages
            .get(&state.current_url)
            .and_then(|pages| pages.get(state.page).copied())
            .unwrap_or(0);
        let slug: String = state
            .current_url
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let profiles = (0..count)
            .map(|i| ScrapedProfile {
                name: format!("Person {}-{}", state.page, i),
                url: format!("https://www.linkedin.com/in/{slug}-{}-{i}/", state.page),
                mutual_connections: String::new(),
            })
            .collect();
        Ok(PageExtraction {
            profiles,
            source_connection: Some("Page Source".to_string()),
        })
    }

    async fn is_last_page(&self) -> Result<bool, EngineError> {
        let state = self.state.lock().unwrap();
        state.check_open()?;
        Ok(state.page + 1 >= self.page_count(&state.current_url))
    }

    async fn perform_pacing_action(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn advance_page(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.check_open()?;
        if state.page + 1 < self.page_count(&state.current_url) {
            state.page += 1;
            Ok(())
        } else {
            Err(EngineError::ExtractionFailed("next button not found".into()))
        }
    }

    async fn resolve_profile_target(&self) -> Result<ProfileTarget, EngineError> {
        let state = self.state.lock().unwrap();
        state.check_open()?;
        self.profile_targets
            .get(&state.current_url)
            .cloned()
            .ok_or_else(|| EngineError::ExtractionFailed("connections link not found".into()))
    }

    async fn set_notifications(&self, enabled: bool) -> Result<(), EngineError> {
        self.state.lock().unwrap().notifications.push(enabled);
        Ok(())
    }
}

/// Counts acquire/release calls.
#[derive(Default)]
pub struct CountingKeepAwake {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl CountingKeepAwake {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeepAwake for CountingKeepAwake {
    async fn acquire(&self) -> Result<(), EngineError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> Result<(), EngineError> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub storage: Storage,
    pub port: Arc<ScriptedPort>,
    pub keep_awake: Arc<CountingKeepAwake>,
    pub saver: Arc<RecordSaver>,
    pub orchestrator: QueueOrchestrator,
}

pub async fn harness(port: ScriptedPort) -> Harness {
    harness_with(Storage::in_memory(), port, short_breaks()).await
}

pub async fn harness_with(storage: Storage, port: ScriptedPort, breaks: BreakSettings) -> Harness {
    let port = Arc::new(port);
    let keep_awake = Arc::new(CountingKeepAwake::default());
    let queue = SharedQueue::load(storage.clone()).await.unwrap();
    let saver = Arc::new(RecordSaver::new(storage.clone()));
    let (timer, fired) = DurableWakeTimer::new(storage.clone());
    let scheduler = Arc::new(BreakScheduler::new(queue.clone(), Arc::new(timer)));
    Arc::clone(&scheduler).listen(fired);

    let orchestrator = QueueOrchestrator::new(OrchestratorParts {
        queue,
        port: port.clone(),
        saver: saver.clone(),
        breaks: scheduler,
        keep_awake: keep_awake.clone(),
        pacing: fast_pacing(),
        break_settings: breaks,
    });
    Harness {
        storage,
        port,
        keep_awake,
        saver,
        orchestrator,
    }
}
