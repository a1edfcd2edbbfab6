//! Linkqueue core: queue model, record merging, run state and the console
//! state machine. Everything here is synchronous and side-effect free.
mod effect;
mod input;
mod item;
mod msg;
mod page_run;
mod queue;
mod record;
mod reorder;
mod state;
mod status;
mod update;
mod view_model;

pub use effect::Effect;
pub use input::{parse_queue_input, profile_name_from_url, source_from_search_url, without_known_urls};
pub use item::{ItemId, ItemOutcome, ItemStatus, QueueItem};
pub use msg::Msg;
pub use page_run::{PageRunState, RunOutcome, RunPhase, STAGNATION_LIMIT};
pub use queue::{Queue, QueueError};
pub use record::{ExtractedRecord, RecordKey, RecordSet, SaveSummary, SECOND_DEGREE};
pub use reorder::{adjusted_pointer, move_item};
pub use state::AppState;
pub use status::{QueueStatus, Settings};
pub use update::update;
pub use view_model::{AppViewModel, ItemRowView, StatusKind, StatusLine};
