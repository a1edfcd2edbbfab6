use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use engine_logging::{engine_info, engine_warn};
use linkqueue_core::{update, AppState, Msg};
use linkqueue_engine::{
    default_export_name, ensure_dir, ChannelPort, Command, CommandChannel, EngineSettings,
    ExtractionPort, FileStore, QueueService, RecordUploader, RestUploader, ServiceDeps, Storage,
    UploadSettings,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::browser::BrowserSession;
use super::config::{self, AppConfig, LogTarget};
use super::console::{self, ConsoleInput, HELP};
use super::effects::EffectRunner;
use super::render::render;

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: PathBuf,
    pub state_dir: Option<PathBuf>,
    pub log: Option<LogTarget>,
    pub headless: bool,
}

impl RunOptions {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.state_dir {
            config.state_dir = dir.clone();
        }
        if let Some(target) = self.log {
            config.log.destination = target;
        }
        if self.headless {
            config.browser.headless = true;
        }
    }
}

pub async fn run(options: RunOptions) -> anyhow::Result<()> {
    let mut config = config::load(&options.config)?;
    options.apply(&mut config);
    engine_logging::initialize(
        config.log.destination.into(),
        engine_logging::parse_level(&config.log.level),
        &config.log.file,
    );

    ensure_dir(&config.state_dir)?;
    let storage = Storage::new(Arc::new(FileStore::open(config.state_file()).await?));
    let settings = storage.load_settings().await;

    let session = BrowserSession::launch(&config.browser).await?;
    let port: Arc<dyn ExtractionPort> = Arc::new(ChannelPort::new(CommandChannel::new(
        Arc::new(session.target()),
        config.channel,
    )));
    let mut browser_closed = session.closed();

    let service = QueueService::start(
        ServiceDeps {
            storage,
            port: port.clone(),
            keep_awake: Arc::new(session.keep_awake()),
            uploader: uploader_for(&config.upload)?,
        },
        EngineSettings {
            pacing: config.pacing,
            breaks: config.breaks,
        },
    )
    .await?;
    let handle = service.spawn();
    engine_info!("Service ready, state in {:?}", config.state_dir);

    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel();
    let runner = EffectRunner::new(handle.clone(), msg_tx);
    let mut state = AppState::new(config.site_host.clone()).with_settings(settings);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker =
        tokio::time::interval(Duration::from_millis(config.poll_interval_ms.max(100)));

    println!("{HELP}");
    loop {
        let msg = tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let now = Utc::now();
                match console::parse_line(&line, now, &default_export_name(now)) {
                    ConsoleInput::Msg(msg) => msg,
                    ConsoleInput::QuickExtract => {
                        runner.quick_extract(port.clone());
                        continue;
                    }
                    ConsoleInput::SinglePage { start } => {
                        runner.dispatch(if start {
                            Command::StartSinglePage
                        } else {
                            Command::StopSinglePage
                        });
                        continue;
                    }
                    ConsoleInput::Help => {
                        println!("{HELP}");
                        continue;
                    }
                    ConsoleInput::Quit => break,
                    ConsoleInput::Invalid(text) => Msg::CommandFailed(text),
                }
            }
            Ok(()) = browser_closed.changed() => {
                engine_warn!("Browser closed; stopping automation");
                for command in [Command::StopQueue, Command::StopSinglePage] {
                    if let Err(err) = handle.send(command).await {
                        engine_warn!("Could not stop after browser closed: {}", err);
                    }
                }
                println!("Browser closed; automation stopped.");
                break;
            }
            _ = ticker.tick() => Msg::Tick,
            Some(msg) = msg_rx.recv() => msg,
            _ = tokio::signal::ctrl_c() => break,
        };
        state = dispatch(state, msg, &runner);
    }

    engine_info!("Shutting down; an unfinished queue resumes on next start");
    session.close().await;
    Ok(())
}

fn dispatch(state: AppState, msg: Msg, runner: &EffectRunner) -> AppState {
    let (mut state, effects) = update(state, msg);
    runner.enqueue(effects);
    if state.consume_dirty() {
        println!("{}", render(&state.view(), Utc::now()));
    }
    state
}

fn uploader_for(settings: &UploadSettings) -> anyhow::Result<Option<Arc<dyn RecordUploader>>> {
    if !settings.is_configured() {
        engine_warn!("Upload endpoint not configured; push is disabled");
        return Ok(None);
    }
    let uploader: Arc<dyn RecordUploader> = Arc::new(RestUploader::new(settings.clone())?);
    Ok(Some(uploader))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_override_config_file() {
        let mut config = AppConfig::default();
        RunOptions {
            config: PathBuf::from("linkqueue.ron"),
            state_dir: Some(PathBuf::from("/tmp/lq")),
            log: Some(LogTarget::Both),
            headless: true,
        }
        .apply(&mut config);

        assert_eq!(config.state_dir, PathBuf::from("/tmp/lq"));
        assert_eq!(config.log.destination, LogTarget::Both);
        assert!(config.browser.headless);
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let mut config = AppConfig::default();
        config.browser.headless = true;
        RunOptions::default().apply(&mut config);
        assert_eq!(config, {
            let mut expected = AppConfig::default();
            expected.browser.headless = true;
            expected
        });
    }

    #[test]
    fn unconfigured_upload_disables_push() {
        assert!(uploader_for(&UploadSettings::default()).unwrap().is_none());
    }
}
