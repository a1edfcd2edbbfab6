use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ItemId, ItemOutcome, ItemStatus, QueueItem};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue already running")]
    AlreadyRunning,
    #[error("no pending items to process")]
    NoPendingItems,
    #[error("invalid index {index} (queue has {len} items)")]
    InvalidIndex { index: usize, len: usize },
    #[error("invalid break end time: must be in the future")]
    InvalidBreakTime,
}

/// Ordered work list plus the pointer the orchestrator advances.
///
/// Every mutation goes through a method here so the pointer rules live in
/// one place; the engine persists a clone after each call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Queue {
    items: Vec<QueueItem>,
    current_index: usize,
    is_running: bool,
    break_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    next_id: ItemId,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<QueueItem>) -> Self {
        let mut queue = Self::new();
        queue.adopt_items(items);
        queue
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_item(&self) -> Option<&QueueItem> {
        self.items.get(self.current_index)
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn break_end_time(&self) -> Option<DateTime<Utc>> {
        self.break_end_time
    }

    pub fn is_on_break(&self, now: DateTime<Utc>) -> bool {
        self.break_end_time.is_some_and(|end| now < end)
    }

    pub fn item_by_id(&self, id: ItemId) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// First index at or after `start` whose item is not completed.
    pub fn next_pending_from(&self, start: usize) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, item)| item.needs_work())
            .map(|(index, _)| index)
    }

    /// Validates and enters the running state, optionally replacing the items.
    ///
    /// Returns the index of the first item to process.
    pub fn begin(&mut self, items: Option<Vec<QueueItem>>) -> Result<usize, QueueError> {
        if self.is_running {
            return Err(QueueError::AlreadyRunning);
        }
        if let Some(items) = items {
            self.adopt_items(items);
        }
        let first = self.next_pending_from(0).ok_or(QueueError::NoPendingItems)?;
        self.current_index = first;
        self.is_running = true;
        Ok(first)
    }

    /// Marks the item under the pointer as processing and returns a copy of it.
    pub fn mark_processing(&mut self) -> Option<QueueItem> {
        let item = self.items.get_mut(self.current_index)?;
        item.status = ItemStatus::Processing;
        item.error = None;
        Some(item.clone())
    }

    /// Applies an outcome to the item with `id`, wherever it sits now.
    ///
    /// Returns `false` when the item was deleted while it was being processed.
    pub fn apply_outcome(&mut self, id: ItemId, outcome: ItemOutcome) -> bool {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        match outcome {
            ItemOutcome::Completed {
                profiles_found,
                source_name,
            } => {
                item.status = ItemStatus::Completed;
                item.profiles_found = profiles_found;
                item.error = None;
                if source_name.is_some() {
                    item.source_name = source_name;
                }
            }
            ItemOutcome::Failed { error } => {
                item.status = ItemStatus::Failed;
                item.error = Some(error);
            }
            ItemOutcome::Interrupted => {
                item.status = ItemStatus::Pending;
            }
        }
        true
    }

    pub fn set_source_name(&mut self, id: ItemId, name: impl Into<String>) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
            item.source_name = Some(name.into());
        }
    }

    /// Moves the pointer to the next item needing work after an item finished.
    ///
    /// A pending item under the pointer (placed there by `jump`) is taken as-is.
    pub fn advance(&mut self) -> Option<usize> {
        if self
            .current_item()
            .is_some_and(|item| item.status == ItemStatus::Pending)
        {
            return Some(self.current_index);
        }
        let next = self.next_pending_from(self.current_index + 1)?;
        self.current_index = next;
        Some(next)
    }

    /// Leaves the running state. Any item still marked processing goes back
    /// to pending so a later start revisits it.
    pub fn halt(&mut self) {
        self.is_running = false;
        self.break_end_time = None;
        for item in &mut self.items {
            if item.status == ItemStatus::Processing {
                item.status = ItemStatus::Pending;
            }
        }
    }

    pub fn set_break_end(&mut self, end: Option<DateTime<Utc>>) {
        self.break_end_time = end;
    }

    pub fn jump(&mut self, index: usize) -> Result<(), QueueError> {
        self.check_index(index)?;
        self.items[index].status = ItemStatus::Pending;
        self.items[index].error = None;
        self.current_index = index;
        Ok(())
    }

    pub fn delete(&mut self, index: usize) -> Result<QueueItem, QueueError> {
        self.check_index(index)?;
        let removed = self.items.remove(index);
        if index < self.current_index {
            self.current_index -= 1;
        }
        Ok(removed)
    }

    /// Replaces the list and pointer wholesale. The caller computes the
    /// pointer (see [`crate::move_item`]).
    pub fn reorder(
        &mut self,
        items: Vec<QueueItem>,
        current_index: Option<usize>,
    ) -> Result<(), QueueError> {
        if let Some(index) = current_index {
            if index >= items.len() && !(items.is_empty() && index == 0) {
                return Err(QueueError::InvalidIndex {
                    index,
                    len: items.len(),
                });
            }
        }
        self.adopt_items(items);
        if let Some(index) = current_index {
            self.current_index = index;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.current_index = 0;
        self.is_running = false;
        self.break_end_time = None;
    }

    fn check_index(&self, index: usize) -> Result<(), QueueError> {
        if index >= self.items.len() {
            return Err(QueueError::InvalidIndex {
                index,
                len: self.items.len(),
            });
        }
        Ok(())
    }

    /// Installs `items`, keeping their ids when unique and assigning fresh ids
    /// to new or clashing entries.
    fn adopt_items(&mut self, mut items: Vec<QueueItem>) {
        let highest = items.iter().map(|item| item.id).max().unwrap_or(0);
        self.next_id = self.next_id.max(highest);

        let mut seen = HashSet::with_capacity(items.len());
        for item in &mut items {
            if item.id == 0 || !seen.insert(item.id) {
                self.next_id += 1;
                item.id = self.next_id;
                seen.insert(item.id);
            }
        }
        self.items = items;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str) -> QueueItem {
        QueueItem::new(url, false, None)
    }

    #[test]
    fn adopt_assigns_unique_ids_and_keeps_existing_ones() {
        let mut existing = item("a");
        existing.id = 7;
        let mut clash = item("b");
        clash.id = 7;
        let queue = Queue::with_items(vec![existing, clash, item("c")]);

        let ids: Vec<_> = queue.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![7, 8, 9]);
    }

    #[test]
    fn advance_prefers_jumped_item_under_pointer() {
        let mut queue = Queue::with_items(vec![item("a"), item("b"), item("c")]);
        queue.begin(None).unwrap();
        let processing = queue.mark_processing().unwrap();
        queue.jump(2).unwrap();
        queue.apply_outcome(processing.id, ItemOutcome::Failed { error: "x".into() });

        assert_eq!(queue.advance(), Some(2));
    }
}
