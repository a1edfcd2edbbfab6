use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use engine_logging::{engine_info, engine_warn};
use linkqueue_core::{Effect, Msg};
use linkqueue_engine::{
    records_from_extraction, Command, ExtractionPort, ServiceHandle, ServiceReply,
};
use tokio::sync::mpsc;

/// Turns console effects into service commands and feeds the replies back
/// as messages.
#[derive(Clone)]
pub struct EffectRunner {
    handle: ServiceHandle,
    msg_tx: mpsc::UnboundedSender<Msg>,
}

impl EffectRunner {
    pub fn new(handle: ServiceHandle, msg_tx: mpsc::UnboundedSender<Msg>) -> Self {
        Self { handle, msg_tx }
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            if let Effect::RefreshStatus = effect {
                self.refresh();
                continue;
            }
            let command = command_for(effect);
            engine_info!("Sending {}", command.name());
            self.dispatch(command);
        }
    }

    /// Sends a command that has no console effect, such as single-page runs.
    pub fn dispatch(&self, command: Command) {
        let handle = self.handle.clone();
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let name = command.name();
            let msg = match handle.send(command).await {
                Ok(reply) => Msg::CommandSucceeded(describe_reply(name, &reply)),
                Err(err) => {
                    engine_warn!("{} failed: {}", name, err);
                    Msg::CommandFailed(err.to_string())
                }
            };
            let _ = msg_tx.send(msg);
        });
    }

    /// Extracts whatever the remote page shows right now and saves it.
    pub fn quick_extract(&self, port: Arc<dyn ExtractionPort>) {
        let runner = self.clone();
        tokio::spawn(async move {
            match port.extract_current_page().await {
                Ok(extraction) => {
                    let records = records_from_extraction(&extraction, None, Utc::now());
                    engine_info!("Quick extraction found {} profiles", records.len());
                    runner.dispatch(Command::SaveQuickExtraction(records));
                }
                Err(err) => {
                    engine_warn!("Quick extraction failed: {}", err);
                    let _ = runner.msg_tx.send(Msg::CommandFailed(err.to_string()));
                }
            }
        });
    }

    fn refresh(&self) {
        let handle = self.handle.clone();
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            match handle.status().await {
                Ok(status) => {
                    let _ = msg_tx.send(Msg::StatusReceived(status));
                }
                Err(err) => engine_warn!("Status refresh failed: {}", err),
            }
        });
    }
}

pub fn command_for(effect: Effect) -> Command {
    match effect {
        Effect::StartQueue { items } => Command::StartQueue(items),
        Effect::StopQueue => Command::StopQueue,
        Effect::ClearQueue => Command::ClearQueue,
        Effect::SkipBreak => Command::SkipBreak,
        Effect::SetBreakEndTime { at } => Command::SetBreakEndTime(at),
        Effect::ReorderQueue {
            items,
            current_index,
        } => Command::ReorderQueue {
            items,
            current_index: Some(current_index),
        },
        Effect::JumpTo { index } => Command::JumpToQueueItem(index),
        Effect::Delete { index } => Command::DeleteQueueItem(index),
        Effect::ExportCsv { path } => Command::ExportCsv(PathBuf::from(path)),
        Effect::PushToDatabase => Command::PushToDatabase,
        Effect::SaveSettings(settings) => Command::UpdateSettings(settings),
        Effect::RefreshStatus => Command::GetQueueStatus,
    }
}

pub fn describe_reply(command: &str, reply: &ServiceReply) -> String {
    match reply {
        ServiceReply::Started { first_index } => {
            format!("Queue started at item {}", first_index + 1)
        }
        ServiceReply::Saved(summary) => format!(
            "Saved {} new, {} updated, {} duplicates",
            summary.saved, summary.updated, summary.duplicates
        ),
        ServiceReply::Deleted(item) => format!("Removed: {}", item.display_name()),
        ServiceReply::Pushed { count } => format!("Pushed {count} records"),
        ServiceReply::Exported(summary) => format!(
            "Exported {} records to {}",
            summary.record_count,
            summary.output_path.display()
        ),
        ServiceReply::Settings(settings) => format!(
            "Notifications {}, queue list {}",
            if settings.show_notifications { "on" } else { "off" },
            if settings.queue_expanded { "shown" } else { "folded" }
        ),
        ServiceReply::Done | ServiceReply::Status(_) => format!("{command} done"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use linkqueue_core::{QueueError, QueueItem, SaveSummary, Settings};
    use linkqueue_engine::{EngineError, ExportSummary};
    use pretty_assertions::assert_eq;

    #[test]
    fn reorder_effect_carries_the_pointer() {
        let items = vec![QueueItem::new("https://www.linkedin.com/in/a/", true, None)];
        let command = command_for(Effect::ReorderQueue {
            items: items.clone(),
            current_index: 0,
        });
        match command {
            Command::ReorderQueue {
                items: sent,
                current_index,
            } => {
                assert_eq!(sent, items);
                assert_eq!(current_index, Some(0));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn effects_map_one_to_one() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(command_for(Effect::SetBreakEndTime { at }).name(), "setBreakEndTime");
        assert_eq!(command_for(Effect::Delete { index: 2 }).name(), "deleteQueueItem");
        assert_eq!(
            command_for(Effect::SaveSettings(Settings::default())).name(),
            "updateSettings"
        );
        match command_for(Effect::ExportCsv {
            path: "out.csv".into(),
        }) {
            Command::ExportCsv(path) => assert_eq!(path, PathBuf::from("out.csv")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn replies_read_as_sentences() {
        let summary = SaveSummary {
            saved: 2,
            updated: 1,
            duplicates: 0,
        };
        assert_eq!(
            describe_reply("saveQuickExtraction", &ServiceReply::Saved(summary)),
            "Saved 2 new, 1 updated, 0 duplicates"
        );
        assert_eq!(
            describe_reply(
                "exportCsv",
                &ServiceReply::Exported(ExportSummary {
                    record_count: 3,
                    output_path: PathBuf::from("c.csv"),
                })
            ),
            "Exported 3 records to c.csv"
        );
        assert_eq!(describe_reply("stopQueue", &ServiceReply::Done), "stopQueue done");
        assert_eq!(
            describe_reply(
                "updateSettings",
                &ServiceReply::Settings(Settings {
                    show_notifications: false,
                    queue_expanded: true,
                })
            ),
            "Notifications off, queue list shown"
        );
        assert_eq!(
            EngineError::Queue(QueueError::NoPendingItems).to_string(),
            QueueError::NoPendingItems.to_string()
        );
    }
}
