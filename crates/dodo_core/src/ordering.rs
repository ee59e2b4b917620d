//! Pure ordering engine for dense zero-based positions.
//!
//! # Responsibility
//! - Assign and repair `order` values across a subset of entities.
//! - Compute new orderings from drag-style move requests.
//!
//! # Invariants
//! - Output sequences always carry a contiguous `0..N-1` order assignment.
//! - No function performs I/O or touches entities outside its input.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Entities that carry a dense `order` position.
pub trait Orderable {
    fn order(&self) -> i64;
    fn set_order(&mut self, order: i64);
}

/// Errors from ordering computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingError {
    /// The move source index is outside `[0, len - 1]`.
    IndexOutOfRange { index: usize, len: usize },
}

impl Display for OrderingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
        }
    }
}

impl Error for OrderingError {}

/// Assigns `order = index` for each item in sequence order.
pub fn renumber<T: Orderable>(mut items: Vec<T>) -> Vec<T> {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_order(index as i64);
    }
    items
}

/// Moves the item at `from` to position `to` and renumbers the result.
///
/// `from` must address an existing item; `to` is clamped to the valid range
/// so minor drag overshoot does not fail the whole operation.
pub fn move_item<T: Orderable>(
    mut items: Vec<T>,
    from: usize,
    to: usize,
) -> Result<Vec<T>, OrderingError> {
    let len = items.len();
    if from >= len {
        return Err(OrderingError::IndexOutOfRange { index: from, len });
    }

    let moved = items.remove(from);
    let target = to.min(len - 1);
    items.insert(target, moved);
    Ok(renumber(items))
}

/// Returns the next append-at-end order value for the given subset.
pub fn next_order<T: Orderable>(items: &[T]) -> i64 {
    items
        .iter()
        .map(Orderable::order)
        .max()
        .map_or(0, |max| max + 1)
}

/// Inserts `item` at `index` (clamped to `[0, len]`) and renumbers.
pub fn insert_at<T: Orderable>(mut items: Vec<T>, item: T, index: usize) -> Vec<T> {
    let target = index.min(items.len());
    items.insert(target, item);
    renumber(items)
}

#[cfg(test)]
mod tests {
    use super::{insert_at, move_item, next_order, renumber, Orderable, OrderingError};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Row {
        label: &'static str,
        order: i64,
    }

    impl Orderable for Row {
        fn order(&self) -> i64 {
            self.order
        }

        fn set_order(&mut self, order: i64) {
            self.order = order;
        }
    }

    fn rows(labels: &[&'static str]) -> Vec<Row> {
        labels
            .iter()
            .enumerate()
            .map(|(index, label)| Row {
                label,
                order: index as i64,
            })
            .collect()
    }

    fn labels(items: &[Row]) -> Vec<&'static str> {
        items.iter().map(|row| row.label).collect()
    }

    #[test]
    fn renumber_repairs_gaps_and_duplicates() {
        let items = vec![
            Row {
                label: "a",
                order: 4,
            },
            Row {
                label: "b",
                order: 4,
            },
            Row {
                label: "c",
                order: 9,
            },
        ];
        let renumbered = renumber(items);
        let orders: Vec<i64> = renumbered.iter().map(Orderable::order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn move_item_shifts_and_renumbers() {
        let moved = move_item(rows(&["a", "b", "c"]), 0, 2).unwrap();
        assert_eq!(labels(&moved), vec!["b", "c", "a"]);
        let orders: Vec<i64> = moved.iter().map(Orderable::order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn move_item_to_self_is_identity() {
        let moved = move_item(rows(&["a", "b", "c"]), 1, 1).unwrap();
        assert_eq!(labels(&moved), vec!["a", "b", "c"]);
        let orders: Vec<i64> = moved.iter().map(Orderable::order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn move_item_clamps_overshot_target() {
        let moved = move_item(rows(&["a", "b", "c"]), 0, 99).unwrap();
        assert_eq!(labels(&moved), vec!["b", "c", "a"]);
    }

    #[test]
    fn move_item_rejects_bad_source_index() {
        let err = move_item(rows(&["a", "b"]), 2, 0).unwrap_err();
        assert_eq!(err, OrderingError::IndexOutOfRange { index: 2, len: 2 });
    }

    #[test]
    fn next_order_is_zero_for_empty_subset() {
        assert_eq!(next_order::<Row>(&[]), 0);
    }

    #[test]
    fn next_order_is_max_plus_one_even_with_gaps() {
        let items = vec![
            Row {
                label: "a",
                order: 0,
            },
            Row {
                label: "b",
                order: 7,
            },
        ];
        assert_eq!(next_order(&items), 8);
    }

    #[test]
    fn insert_at_clamps_and_renumbers() {
        let inserted = insert_at(
            rows(&["a", "b"]),
            Row {
                label: "x",
                order: 0,
            },
            99,
        );
        assert_eq!(labels(&inserted), vec!["a", "b", "x"]);
        let orders: Vec<i64> = inserted.iter().map(Orderable::order).collect();
        assert_eq!(orders, vec![0, 1, 2]);

        let inserted = insert_at(
            rows(&["a", "b"]),
            Row {
                label: "x",
                order: 0,
            },
            1,
        );
        assert_eq!(labels(&inserted), vec!["a", "x", "b"]);
    }
}
