use crate::{QueueError, QueueItem};

/// Where the pointer lands after moving the item at `from` to `to`.
///
/// The pointer follows its item: moving the current item carries the pointer
/// along, moving an earlier item past it shifts it down, moving a later item
/// in front of it shifts it up.
pub fn adjusted_pointer(from: usize, to: usize, current: usize) -> usize {
    if from == current {
        to
    } else if from < current && to >= current {
        current - 1
    } else if from > current && to <= current {
        current + 1
    } else {
        current
    }
}

/// Moves one item and returns the new list with the corrected pointer, ready
/// to hand to the orchestrator's reorder command.
pub fn move_item(
    items: &[QueueItem],
    from: usize,
    to: usize,
    current: usize,
) -> Result<(Vec<QueueItem>, usize), QueueError> {
    for index in [from, to] {
        if index >= items.len() {
            return Err(QueueError::InvalidIndex {
                index,
                len: items.len(),
            });
        }
    }

    let mut reordered = items.to_vec();
    let moved = reordered.remove(from);
    reordered.insert(to, moved);
    Ok((reordered, adjusted_pointer(from, to, current)))
}
