//! Chrome DevTools remote target: one long-lived work page that hosts the
//! listener script, plus a blank page for keep-awake audio.

use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::Page;
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use futures::StreamExt;
use linkqueue_engine::{EngineError, KeepAwake, RemoteTarget, TargetError};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::config::BrowserConfig;

const LISTENER_SCRIPT: &str = include_str!("../../assets/listener.js");

const KEEP_AWAKE_ON: &str = r#"(() => {
  if (window.__linkqueueAudio) { return true; }
  const ctx = new (window.AudioContext || window.webkitAudioContext)();
  const osc = ctx.createOscillator();
  const gain = ctx.createGain();
  gain.gain.value = 0;
  osc.connect(gain).connect(ctx.destination);
  osc.start();
  window.__linkqueueAudio = ctx;
  return true;
})()"#;

const KEEP_AWAKE_OFF: &str = r#"(() => {
  if (window.__linkqueueAudio) { window.__linkqueueAudio.close(); window.__linkqueueAudio = null; }
  return true;
})()"#;

pub struct BrowserSession {
    pub browser: Browser,
    pub page: Page,
    /// Blank page that only holds the silent audio context. It never
    /// navigates, so the context outlives every queue item.
    audio_page: Page,
    closed: watch::Receiver<bool>,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch(config: &BrowserConfig) -> anyhow::Result<Self> {
        let mut builder = CdpConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--autoplay-policy=no-user-gesture-required");
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }
        if let Some(profile) = &config.profile_dir {
            builder = builder.user_data_dir(profile);
        }
        let cdp_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        engine_info!("Launching browser (headless={})", config.headless);
        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .context("Failed to launch browser")?;
        let (closed_tx, closed) = watch::channel(false);
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    engine_debug!("Browser handler error: {}", err);
                }
            }
            engine_warn!("Browser connection ended");
            let _ = closed_tx.send(true);
        });

        let page = browser
            .new_page(config.start_url.as_str())
            .await
            .context("Failed to open start page")?;
        let audio_page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open keep-awake page")?;
        // Leave the user looking at the work page, not the blank one.
        if let Err(err) = page.bring_to_front().await {
            engine_debug!("Could not focus start page: {}", err);
        }
        Ok(Self {
            browser,
            page,
            audio_page,
            closed,
            handler,
        })
    }

    pub fn target(&self) -> CdpTarget {
        CdpTarget {
            page: self.page.clone(),
            closed: self.closed.clone(),
        }
    }

    pub fn keep_awake(&self) -> AudioKeepAwake {
        AudioKeepAwake {
            target: CdpTarget {
                page: self.audio_page.clone(),
                closed: self.closed.clone(),
            },
        }
    }

    /// Flips to `true` once the browser connection is gone.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.clone()
    }

    pub async fn close(mut self) {
        if !*self.closed.borrow() {
            if let Err(err) = self.browser.close().await {
                engine_error!("Browser did not close cleanly: {}", err);
            }
        }
        self.handler.abort();
    }
}

/// `RemoteTarget` over the work page.
#[derive(Clone)]
pub struct CdpTarget {
    page: Page,
    closed: watch::Receiver<bool>,
}

impl CdpTarget {
    async fn eval(&self, expression: String) -> Result<Value, TargetError> {
        if *self.closed.borrow() {
            return Err(TargetError::Closed);
        }
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| transport_error(*self.closed.borrow(), e))?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }
}

/// A failed call on a dead connection reports the target as closed.
fn transport_error(closed: bool, err: impl std::fmt::Display) -> TargetError {
    if closed {
        TargetError::Closed
    } else {
        TargetError::Transport(err.to_string())
    }
}

/// Expression that hands `request` to the listener, or yields null when the
/// document has none.
pub fn dispatch_expression(request: &Value) -> String {
    format!(
        "(() => {{ const l = window.__linkqueueListener; return l ? l.handle({request}) : null; }})()"
    )
}

#[async_trait]
impl RemoteTarget for CdpTarget {
    async fn deliver(&self, request: Value) -> Result<Value, TargetError> {
        let reply = self.eval(dispatch_expression(&request)).await?;
        if reply.is_null() {
            return Err(TargetError::NoListener);
        }
        Ok(reply)
    }

    async fn inject_listener(&self) -> Result<(), TargetError> {
        self.eval(LISTENER_SCRIPT.to_string()).await.map(|_| ())
    }

    async fn navigate(&self, url: &str) -> Result<(), TargetError> {
        if *self.closed.borrow() {
            return Err(TargetError::Closed);
        }
        self.page
            .goto(url)
            .await
            .map_err(|e| transport_error(*self.closed.borrow(), e))?;
        Ok(())
    }
}

/// Silent audio on the session's blank page keeps the host from sleeping.
#[derive(Clone)]
pub struct AudioKeepAwake {
    target: CdpTarget,
}

#[async_trait]
impl KeepAwake for AudioKeepAwake {
    async fn acquire(&self) -> Result<(), EngineError> {
        self.target
            .eval(KEEP_AWAKE_ON.to_string())
            .await
            .map(|_| ())
            .map_err(|e| EngineError::RemoteUnavailable(e.to_string()))
    }

    async fn release(&self) -> Result<(), EngineError> {
        self.target
            .eval(KEEP_AWAKE_OFF.to_string())
            .await
            .map(|_| ())
            .map_err(|e| EngineError::RemoteUnavailable(e.to_string()))
    }
}
