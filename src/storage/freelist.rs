//! # Slot-Id Allocation
//!
//! This module implements `SlotAllocator`, the constant-time allocator for
//! a table's slot ids. Freed ids are reused before fresh ids are minted, so
//! deleting and re-inserting rows never grows the data file.
//!
//! ## Data Structure
//!
//! One growable vector of entries, each holding `(prev, next, allocated)`
//! where the links are signed indices into the same vector and `-1` is the
//! null link. Two entries are reserved as intrusive list heads:
//!
//! ```text
//! index 0: head of the free list
//! index 1: head of the live list
//! index 2..: one entry per slot id; public id = physical index - 2
//! ```
//!
//! Allocation pops the head of the free list (or appends a fresh entry) and
//! pushes it onto the head of the live list; freeing is the reverse. Both
//! lists therefore iterate most-recently-inserted first, and `allocate`
//! returns the most recently freed id when any exists.
//!
//! ## Invariants
//!
//! - Every non-head entry is on exactly one of the two lists.
//! - The `allocated` flag always agrees with list membership.
//! - `live_count() + free list length == total ids ever created`.
//!
//! ## Rehydration
//!
//! [`SlotAllocator::from_bitmap`] rebuilds an allocator from the per-slot
//! allocation flags of a data file: allocate N ids in order, then free
//! every id whose flag is clear, in order. The resulting reuse behavior is
//! identical to an allocator that lived through that history.

/// Null link inside the entry vector.
const NIL: i32 = -1;

/// Physical index of the free-list head.
const FREE_HEAD: usize = 0;

/// Physical index of the live-list head.
const LIVE_HEAD: usize = 1;

/// Reserved head entries before the first real id.
const ID_BASE: usize = 2;

#[derive(Debug, Clone, Copy)]
struct SlotEntry {
    prev: i32,
    next: i32,
    allocated: bool,
}

impl SlotEntry {
    fn head() -> Self {
        Self {
            prev: NIL,
            next: NIL,
            allocated: false,
        }
    }
}

/// O(1) allocator for non-negative slot ids with reuse of freed ids.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    entries: Vec<SlotEntry>,
    live_count: usize,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self {
            entries: vec![SlotEntry::head(), SlotEntry::head()],
            live_count: 0,
        }
    }

    /// Rebuilds an allocator whose id space is `[0, bitmap.len())` with
    /// live/free status matching the bitmap.
    pub fn from_bitmap(bitmap: &[bool]) -> Self {
        let mut allocator = Self::new();
        allocator.entries.reserve(bitmap.len());
        for _ in bitmap {
            allocator.allocate();
        }
        for (id, &live) in bitmap.iter().enumerate() {
            if !live {
                allocator.free(id as u32);
            }
        }
        allocator
    }

    /// Total ids ever created (live + free).
    pub fn len(&self) -> usize {
        self.entries.len() - ID_BASE
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of currently live ids.
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Allocates an id: the most recently freed one if any, else a fresh
    /// id one past the previous maximum. O(1).
    pub fn allocate(&mut self) -> u32 {
        if self.entries[FREE_HEAD].next == NIL {
            let fresh = self.entries.len() as i32;
            self.entries.push(SlotEntry {
                prev: FREE_HEAD as i32,
                next: NIL,
                allocated: false,
            });
            self.entries[FREE_HEAD].next = fresh;
        }

        // detach the first free entry
        let index = self.entries[FREE_HEAD].next;
        let after = self.entries[index as usize].next;
        self.entries[FREE_HEAD].next = after;
        if after != NIL {
            self.entries[after as usize].prev = FREE_HEAD as i32;
        }

        // push it onto the head of the live list
        let live_next = self.entries[LIVE_HEAD].next;
        self.entries[index as usize] = SlotEntry {
            prev: LIVE_HEAD as i32,
            next: live_next,
            allocated: true,
        };
        if live_next != NIL {
            self.entries[live_next as usize].prev = index;
        }
        self.entries[LIVE_HEAD].next = index;

        self.live_count += 1;
        index as u32 - ID_BASE as u32
    }

    /// Frees an id, making it the next one `allocate` returns.
    ///
    /// Out-of-range and already-free ids are a no-op; returns whether the
    /// id was actually freed. O(1).
    pub fn free(&mut self, id: u32) -> bool {
        if !self.is_allocated(id) {
            return false;
        }
        let index = (id as usize + ID_BASE) as i32;

        // unlink from the live list
        let prev = self.entries[index as usize].prev;
        let next = self.entries[index as usize].next;
        self.entries[prev as usize].next = next;
        if next != NIL {
            self.entries[next as usize].prev = prev;
        }

        // push onto the head of the free list
        let free_next = self.entries[FREE_HEAD].next;
        self.entries[index as usize] = SlotEntry {
            prev: FREE_HEAD as i32,
            next: free_next,
            allocated: false,
        };
        if free_next != NIL {
            self.entries[free_next as usize].prev = index;
        }
        self.entries[FREE_HEAD].next = index;

        self.live_count -= 1;
        true
    }

    /// Whether `id` is currently allocated. Out-of-range ids are not.
    pub fn is_allocated(&self, id: u32) -> bool {
        let index = id as usize + ID_BASE;
        index < self.entries.len() && self.entries[index].allocated
    }

    /// Iterates live ids, most recently allocated first.
    pub fn live_ids(&self) -> ListIter<'_> {
        ListIter {
            entries: &self.entries,
            cursor: self.entries[LIVE_HEAD].next,
        }
    }

    /// Iterates free ids, most recently freed first.
    pub fn free_ids(&self) -> ListIter<'_> {
        ListIter {
            entries: &self.entries,
            cursor: self.entries[FREE_HEAD].next,
        }
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over one of the allocator's intrusive lists.
#[derive(Debug)]
pub struct ListIter<'a> {
    entries: &'a [SlotEntry],
    cursor: i32,
}

impl Iterator for ListIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.cursor == NIL {
            return None;
        }
        let index = self.cursor as usize;
        self.cursor = self.entries[index].next;
        Some(index as u32 - ID_BASE as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_count_up_from_zero() {
        let mut alloc = SlotAllocator::new();

        assert_eq!(alloc.allocate(), 0);
        assert_eq!(alloc.allocate(), 1);
        assert_eq!(alloc.allocate(), 2);
        assert_eq!(alloc.len(), 3);
        assert_eq!(alloc.live_count(), 3);
    }

    #[test]
    fn allocate_reuses_most_recently_freed() {
        let mut alloc = SlotAllocator::new();
        for _ in 0..4 {
            alloc.allocate();
        }

        alloc.free(1);
        alloc.free(3);

        assert_eq!(alloc.allocate(), 3);
        assert_eq!(alloc.allocate(), 1);
        assert_eq!(alloc.allocate(), 4);
    }

    #[test]
    fn free_of_unknown_or_free_id_is_a_noop() {
        let mut alloc = SlotAllocator::new();
        alloc.allocate();

        assert!(!alloc.free(7));
        assert!(alloc.free(0));
        assert!(!alloc.free(0));
        assert_eq!(alloc.live_count(), 0);
    }

    #[test]
    fn is_allocated_agrees_with_live_iteration() {
        let mut alloc = SlotAllocator::new();
        for _ in 0..5 {
            alloc.allocate();
        }
        alloc.free(2);
        alloc.free(0);

        let live: Vec<u32> = alloc.live_ids().collect();
        for id in 0..5 {
            assert_eq!(alloc.is_allocated(id), live.contains(&id));
        }
    }

    #[test]
    fn live_iteration_is_most_recent_first() {
        let mut alloc = SlotAllocator::new();
        alloc.allocate();
        alloc.allocate();
        alloc.allocate();

        let live: Vec<u32> = alloc.live_ids().collect();

        assert_eq!(live, vec![2, 1, 0]);
    }

    #[test]
    fn reused_id_moves_to_the_head_of_the_live_list() {
        let mut alloc = SlotAllocator::new();
        alloc.allocate();
        alloc.allocate();
        alloc.allocate();

        alloc.free(1);
        assert_eq!(alloc.allocate(), 1);

        let live: Vec<u32> = alloc.live_ids().collect();
        assert_eq!(live, vec![1, 2, 0]);
    }

    #[test]
    fn every_id_is_on_exactly_one_list() {
        let mut alloc = SlotAllocator::new();
        for _ in 0..8 {
            alloc.allocate();
        }
        alloc.free(3);
        alloc.free(5);
        alloc.free(0);
        alloc.allocate();

        let live: Vec<u32> = alloc.live_ids().collect();
        let free: Vec<u32> = alloc.free_ids().collect();

        assert_eq!(live.len() + free.len(), alloc.len());
        for id in &free {
            assert!(!live.contains(id));
        }
    }

    #[test]
    fn from_bitmap_matches_allocation_history() {
        let alloc = SlotAllocator::from_bitmap(&[true, false, true]);

        assert!(alloc.is_allocated(0));
        assert!(!alloc.is_allocated(1));
        assert!(alloc.is_allocated(2));
        assert_eq!(alloc.len(), 3);
        assert_eq!(alloc.live_count(), 2);
    }

    #[test]
    fn from_bitmap_reuses_cleared_ids_first() {
        let mut alloc = SlotAllocator::from_bitmap(&[true, false, true]);

        assert_eq!(alloc.allocate(), 1);
        assert_eq!(alloc.allocate(), 3);
    }

    #[test]
    fn from_bitmap_frees_in_order_so_reuse_is_reversed() {
        let mut alloc = SlotAllocator::from_bitmap(&[false, true, false]);

        // ids 0 and 2 were freed in order; the most recently freed wins
        assert_eq!(alloc.allocate(), 2);
        assert_eq!(alloc.allocate(), 0);
    }

    #[test]
    fn empty_allocator_iterates_nothing() {
        let alloc = SlotAllocator::new();

        assert_eq!(alloc.live_ids().count(), 0);
        assert_eq!(alloc.free_ids().count(), 0);
        assert!(alloc.is_empty());
    }
}
