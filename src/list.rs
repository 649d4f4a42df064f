//! Holds the [`TaskList`] type and methods
//!
//! A task list is a doubly linked list threaded through the task slots of a
//! single core. The links live in the slots themselves, and refer to other
//! slots by index, so a slot can only ever be in one list at a time.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// The next/previous links embedded in each list member
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Links {
    pub(crate) next: Option<usize>,
    pub(crate) prev: Option<usize>,
}

impl Links {
    /// Links that point nowhere
    pub const fn new() -> Links {
        Links {
            next: None,
            prev: None,
        }
    }
}

/// Something that can be threaded onto a [`TaskList`]
pub trait Linked {
    /// Get the links
    fn links(&self) -> &Links;

    /// Get the links, mutably
    fn links_mut(&mut self) -> &mut Links;
}

impl Linked for Links {
    fn links(&self) -> &Links {
        self
    }

    fn links_mut(&mut self) -> &mut Links {
        self
    }
}

/// An intrusive list of slot indices, in scheduling order
///
/// `head.prev` and `tail.next` are always `None`. A list with one member has
/// `head == tail`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskList {
    head: Option<usize>,
    tail: Option<usize>,
}

impl TaskList {
    /// Make an empty list
    pub const fn new() -> TaskList {
        TaskList {
            head: None,
            tail: None,
        }
    }

    /// The first slot in the list
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// The last slot in the list
    #[cfg(test)]
    pub fn tail(&self) -> Option<usize> {
        self.tail
    }

    /// Does the list have no members?
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Append slot `idx` to the end of the list
    pub fn push_back<T: Linked>(&mut self, nodes: &mut [T], idx: usize) {
        match self.tail {
            Some(tail) => {
                nodes[tail].links_mut().next = Some(idx);
                *nodes[idx].links_mut() = Links {
                    next: None,
                    prev: Some(tail),
                };
                self.tail = Some(idx);
            }
            None => {
                *nodes[idx].links_mut() = Links::new();
                self.head = Some(idx);
                self.tail = Some(idx);
            }
        }
    }

    /// Unlink slot `idx` from this list
    ///
    /// The slot must be a member of this list. Removing anything else is a
    /// scheduler bug: it panics in debug builds and does nothing otherwise.
    pub fn remove<T: Linked>(&mut self, nodes: &mut [T], idx: usize) {
        let Links { next, prev } = *nodes[idx].links();
        let is_head = self.head == Some(idx);
        let is_tail = self.tail == Some(idx);
        let is_member = (is_head || prev.is_some()) && (is_tail || next.is_some());
        debug_assert!(is_member, "slot {} is not in this task list", idx);
        if !is_member {
            return;
        }

        if is_head {
            self.head = next;
        } else if let Some(prev) = prev {
            nodes[prev].links_mut().next = next;
        }

        if is_tail {
            self.tail = prev;
        } else if let Some(next) = next {
            nodes[next].links_mut().prev = prev;
        }

        *nodes[idx].links_mut() = Links::new();
    }

    /// Walk the list from head to tail
    pub fn iter<'a, T: Linked>(&self, nodes: &'a [T]) -> Iter<'a, T> {
        Iter {
            nodes,
            cursor: self.head,
        }
    }

    /// Is slot `idx` a member of this list?
    pub fn contains<T: Linked>(&self, nodes: &[T], idx: usize) -> bool {
        self.iter(nodes).any(|member| member == idx)
    }
}

/// Iterator over the slot indices in a [`TaskList`]
pub struct Iter<'a, T> {
    nodes: &'a [T],
    cursor: Option<usize>,
}

impl<T: Linked> Iterator for Iter<'_, T> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let idx = self.cursor?;
        self.cursor = self.nodes[idx].links().next;
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(list: &TaskList, nodes: &[Links]) -> Vec<usize> {
        list.iter(nodes).collect()
    }

    fn build(count: usize) -> (TaskList, [Links; 6]) {
        let mut nodes = [Links::new(); 6];
        let mut list = TaskList::new();
        for idx in 0..count {
            list.push_back(&mut nodes, idx);
        }
        (list, nodes)
    }

    #[test]
    fn push_back_keeps_insertion_order() {
        let (list, nodes) = build(4);
        assert_eq!(collect(&list, &nodes), [0, 1, 2, 3]);
        assert_eq!(list.head(), Some(0));
        assert_eq!(list.tail(), Some(3));
        assert_eq!(nodes[0].prev, None);
        assert_eq!(nodes[3].next, None);
    }

    #[test]
    fn singleton_has_head_equal_to_tail() {
        let (mut list, mut nodes) = build(1);
        assert_eq!(list.head(), list.tail());
        list.remove(&mut nodes, 0);
        assert!(list.is_empty());
        assert_eq!(list.tail(), None);
    }

    #[test]
    fn push_then_remove_restores_list_at_every_position() {
        for len in 0..5 {
            let (before, before_nodes) = build(len);
            let mut list = before;
            let mut nodes = before_nodes;
            list.push_back(&mut nodes, 5);
            list.remove(&mut nodes, 5);
            assert_eq!(list, before, "len {len}");
            assert_eq!(nodes, before_nodes, "len {len}");
        }
    }

    #[test]
    fn remove_head_tail_and_interior() {
        let (mut list, mut nodes) = build(5);

        list.remove(&mut nodes, 0);
        assert_eq!(collect(&list, &nodes), [1, 2, 3, 4]);
        assert_eq!(nodes[1].prev, None);

        list.remove(&mut nodes, 4);
        assert_eq!(collect(&list, &nodes), [1, 2, 3]);
        assert_eq!(nodes[3].next, None);

        list.remove(&mut nodes, 2);
        assert_eq!(collect(&list, &nodes), [1, 3]);
        assert_eq!(nodes[1].next, Some(3));
        assert_eq!(nodes[3].prev, Some(1));
        assert!(!list.contains(&nodes, 2));
    }

    #[test]
    fn removed_slot_can_join_another_list() {
        let (mut ready, mut nodes) = build(3);
        let mut delayed = TaskList::new();
        ready.remove(&mut nodes, 1);
        delayed.push_back(&mut nodes, 1);
        assert_eq!(collect(&ready, &nodes), [0, 2]);
        assert_eq!(collect(&delayed, &nodes), [1]);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn removing_a_stranger_panics_in_debug() {
        let (mut list, mut nodes) = build(3);
        list.remove(&mut nodes, 5);
    }
}

// End of File
