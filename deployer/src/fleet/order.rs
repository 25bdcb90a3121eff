//! Chained multi-key ordering

use std::cmp::Ordering;

/// Single-key less-than predicate
pub type LessFn<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Sorts using an ordered list of less-than functions.
///
/// The first function that distinguishes two elements decides their order; ties fall
/// through to the next function and the last one is applied unconditionally.
pub struct OrderedBy<T> {
    less: Vec<LessFn<T>>,
}

impl<T> OrderedBy<T> {
    pub fn new(less: Vec<LessFn<T>>) -> Self {
        Self { less }
    }

    /// Append another key to the chain
    pub fn then(mut self, less: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        self.less.push(Box::new(less));
        self
    }

    pub fn compare(&self, p: &T, q: &T) -> Ordering {
        let Some((last, keys)) = self.less.split_last() else {
            return Ordering::Equal;
        };
        for less in keys {
            if less(p, q) {
                return Ordering::Less;
            }
            if less(q, p) {
                return Ordering::Greater;
            }
        }
        if last(p, q) {
            Ordering::Less
        } else if last(q, p) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    pub fn sort(&self, items: &mut [T]) {
        items.sort_by(|p, q| self.compare(p, q));
    }
}

/// Start a chain with its primary key
pub fn ordered_by<T>(less: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> OrderedBy<T> {
    OrderedBy::new(vec![Box::new(less)])
}
