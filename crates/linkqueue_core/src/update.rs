use chrono::Duration;

use crate::view_model::StatusKind;
use crate::{move_item, parse_queue_input, without_known_urls, AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::UrlsPasted(raw) => {
            if raw.trim().is_empty() {
                return (state, Vec::new());
            }
            state.stage_input(&raw);
            Vec::new()
        }
        Msg::StartClicked => start_queue(&mut state),
        Msg::StopClicked => {
            state.set_status(StatusKind::Working, "Stopping queue");
            vec![Effect::StopQueue]
        }
        Msg::ClearClicked => {
            if state.items().is_empty() {
                Vec::new()
            } else {
                state.set_status(StatusKind::Working, "Clearing queue");
                vec![Effect::ClearQueue]
            }
        }
        Msg::SkipBreakClicked => vec![Effect::SkipBreak],
        Msg::BreakMinutesEntered { minutes, now } => {
            match Duration::try_minutes(minutes).filter(|_| minutes >= 1) {
                Some(delta) => vec![Effect::SetBreakEndTime { at: now + delta }],
                None => {
                    state.set_status(StatusKind::Error, "Break must be at least one minute");
                    Vec::new()
                }
            }
        }
        Msg::MoveRequested { from, to } => {
            if from == to {
                return (state, Vec::new());
            }
            let current = state.snapshot().queue.current_index();
            match move_item(state.items(), from, to, current) {
                Ok((items, current_index)) => {
                    state.apply_local_order(items.clone(), current_index);
                    vec![Effect::ReorderQueue {
                        items,
                        current_index,
                    }]
                }
                Err(err) => {
                    state.set_status(StatusKind::Error, err.to_string());
                    Vec::new()
                }
            }
        }
        Msg::JumpRequested(index) => match state.items().get(index) {
            Some(item) => {
                let name = item.display_name().to_string();
                state.set_status(StatusKind::Working, format!("Jumping to: {name}"));
                vec![Effect::JumpTo { index }]
            }
            None => {
                state.set_status(StatusKind::Error, format!("No queue item at {index}"));
                Vec::new()
            }
        },
        Msg::DeleteRequested(index) => match state.items().get(index) {
            Some(item) => {
                let name = item.display_name().to_string();
                state.set_status(StatusKind::Working, format!("Removing: {name}"));
                vec![Effect::Delete { index }]
            }
            None => {
                state.set_status(StatusKind::Error, format!("No queue item at {index}"));
                Vec::new()
            }
        },
        Msg::ExportRequested { path } => {
            state.set_status(StatusKind::Working, "Generating CSV");
            vec![Effect::ExportCsv { path }]
        }
        Msg::PushRequested => {
            state.set_status(StatusKind::Working, "Pushing records");
            vec![Effect::PushToDatabase]
        }
        Msg::NotificationsToggled => {
            let mut settings = state.settings();
            settings.show_notifications = !settings.show_notifications;
            state.set_settings(settings);
            vec![Effect::SaveSettings(settings)]
        }
        Msg::QueueExpandToggled => {
            let mut settings = state.settings();
            settings.queue_expanded = !settings.queue_expanded;
            state.set_settings(settings);
            vec![Effect::SaveSettings(settings)]
        }
        Msg::StatusReceived(snapshot) => {
            state.apply_snapshot(snapshot);
            Vec::new()
        }
        Msg::CommandSucceeded(text) => {
            state.set_status(StatusKind::Ready, text);
            vec![Effect::RefreshStatus]
        }
        Msg::CommandFailed(text) => {
            state.set_status(StatusKind::Error, text);
            vec![Effect::RefreshStatus]
        }
        Msg::Tick => vec![Effect::RefreshStatus],
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn start_queue(state: &mut AppState) -> Vec<Effect> {
    if state.snapshot().queue.is_running() {
        state.set_status(StatusKind::Error, "Queue already running");
        return Vec::new();
    }

    let mut items = state.items().to_vec();
    if !state.staged_input().trim().is_empty() {
        let parsed = parse_queue_input(state.staged_input(), state.site_host());
        if parsed.is_empty() {
            state.set_status(StatusKind::Error, "No valid URLs found");
            return Vec::new();
        }
        let unique = without_known_urls(&items, parsed);
        if unique.is_empty() {
            state.take_staged_input();
            state.set_status(StatusKind::Error, "All URLs already in queue");
            return Vec::new();
        }
        items.extend(unique);
        state.take_staged_input();
    }

    if items.is_empty() {
        state.set_status(StatusKind::Error, "Please enter URLs to process");
        return Vec::new();
    }

    state.set_status(
        StatusKind::Working,
        format!("Starting queue ({} URLs)", items.len()),
    );
    vec![Effect::StartQueue { items: Some(items) }]
}
