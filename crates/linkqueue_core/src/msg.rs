use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User pasted one or more URL lines; they are staged until start.
    UrlsPasted(String),
    /// User asked to start (or resume) the queue.
    StartClicked,
    /// User asked to stop the queue.
    StopClicked,
    /// User asked to clear the whole queue.
    ClearClicked,
    /// User asked to end the current break now.
    SkipBreakClicked,
    /// User set the break to end `minutes` from `now`.
    BreakMinutesEntered { minutes: i64, now: DateTime<Utc> },
    /// User dragged an item from one position to another.
    MoveRequested { from: usize, to: usize },
    /// User asked to (re)run the item at this index next.
    JumpRequested(usize),
    /// User removed the item at this index.
    DeleteRequested(usize),
    /// User asked for a CSV export to this path.
    ExportRequested { path: String },
    /// User asked to upload all records.
    PushRequested,
    /// User toggled in-page notifications.
    NotificationsToggled,
    /// User folded or unfolded the queue list.
    QueueExpandToggled,
    /// Fresh snapshot from the orchestrator.
    StatusReceived(crate::QueueStatus),
    /// A command round-tripped successfully.
    CommandSucceeded(String),
    /// A command was rejected or failed.
    CommandFailed(String),
    /// Poll tick.
    Tick,
    /// Fallback for unrecognized input.
    NoOp,
}
