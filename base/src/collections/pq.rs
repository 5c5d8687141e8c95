//! A priority queue served by class.
//!
//! The lowest class number is the highest priority.  Items of the same
//! class come out in the order they were pushed.  Each push returns a
//! ticket by which the item can later be removed.
use std::cmp::Ordering;
use std::fmt::{self, Debug, Formatter};

use keyed_priority_queue::KeyedPriorityQueue;

pub type Ticket = u64;

struct Entry<T> {
    class: u64,
    ticket: Ticket,
    item: T,
}

impl<T> Entry<T> {
    fn rank(&self) -> (u64, Ticket) {
        (self.class, self.ticket)
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reversed, since [`KeyedPriorityQueue`] serves the greatest
/// priority first.
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.rank().cmp(&self.rank())
    }
}

pub struct ClassQueue<T> {
    entries: KeyedPriorityQueue<Ticket, Entry<T>>,
    next_ticket: Ticket,
}

impl<T> ClassQueue<T> {
    #[must_use]
    pub fn new() -> ClassQueue<T> {
        ClassQueue {
            entries: KeyedPriorityQueue::new(),
            next_ticket: 0,
        }
    }

    pub fn push(&mut self, class: u64, item: T) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.entries.push(ticket, Entry { class, ticket, item });
        ticket
    }

    /// The item which [`ClassQueue::pop`] would return.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.entries.peek().map(|(_, e)| &e.item)
    }

    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop().map(|(_, e)| e.item)
    }

    pub fn remove(&mut self, ticket: Ticket) -> Option<T> {
        self.entries.remove(&ticket).map(|e| e.item)
    }

    /// The ticket of the highest priority item satisfying `wanted`.
    pub fn first_matching<F>(&self, mut wanted: F) -> Option<Ticket>
    where
        F: FnMut(u64, &T) -> bool,
    {
        self.entries
            .iter()
            .filter(|(_, e)| wanted(e.class, &e.item))
            .max_by(|(_, l), (_, r)| l.cmp(r))
            .map(|(ticket, _)| *ticket)
    }

    pub fn any<F>(&self, mut wanted: F) -> bool
    where
        F: FnMut(u64, &T) -> bool,
    {
        self.entries.iter().any(|(_, e)| wanted(e.class, &e.item))
    }

    /// Remove every item for which `discard` returns true.
    pub fn discard_if<F>(&mut self, mut discard: F)
    where
        F: FnMut(u64, &T) -> bool,
    {
        let doomed: Vec<Ticket> = self
            .entries
            .iter()
            .filter(|(_, e)| discard(e.class, &e.item))
            .map(|(ticket, _)| *ticket)
            .collect();
        for ticket in doomed {
            self.entries.remove(&ticket);
        }
    }

    /// All items, highest priority first.
    #[must_use]
    pub fn in_order(&self) -> Vec<&T> {
        let mut entries: Vec<&Entry<T>> = self.entries.iter().map(|(_, e)| e).collect();
        entries.sort_by(|l, r| r.cmp(l));
        entries.into_iter().map(|e| &e.item).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for ClassQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> Debug for ClassQueue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.in_order()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let mut q: ClassQueue<&str> = ClassQueue::default();
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        assert_eq!(q.peek(), None);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_lowest_class_first() {
        let mut q = ClassQueue::new();
        q.push(25, "quantum timer");
        q.push(8, "reference violation");
        q.push(14, "invalid instruction");
        assert_eq!(q.peek(), Some(&"reference violation"));
        assert_eq!(q.pop(), Some("reference violation"));
        assert_eq!(q.pop(), Some("invalid instruction"));
        assert_eq!(q.pop(), Some("quantum timer"));
        assert!(q.is_empty());
    }

    #[test]
    fn test_same_class_in_push_order() {
        let mut q = ClassQueue::new();
        q.push(20, 'a');
        q.push(20, 'b');
        q.push(19, 'c');
        q.push(20, 'd');
        assert_eq!(q.in_order(), vec![&'c', &'a', &'b', &'d']);
    }

    #[test]
    fn test_remove_by_ticket() {
        let mut q = ClassQueue::new();
        let first = q.push(8, 1);
        q.push(9, 2);
        assert_eq!(q.remove(first), Some(1));
        assert_eq!(q.remove(first), None);
        assert_eq!(q.pop(), Some(2));
    }

    #[test]
    fn test_first_matching() {
        let mut q = ClassQueue::new();
        q.push(8, 'x');
        let wanted = q.push(12, 'y');
        q.push(12, 'y');
        assert_eq!(q.first_matching(|_, item| *item == 'y'), Some(wanted));
        assert_eq!(q.first_matching(|class, _| class > 12), None);
        assert!(q.any(|class, _| class == 8));
    }

    #[test]
    fn test_discard_if() {
        let mut q = ClassQueue::new();
        for class in [19, 8, 25, 14] {
            q.push(class, class);
        }
        q.discard_if(|class, _| class > 14);
        assert_eq!(q.in_order(), vec![&8, &14]);
        q.clear();
        assert!(q.is_empty());
    }
}
