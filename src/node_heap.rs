//! A binary min-heap over grid cell indices that supports changing the priority of an element
//! already in the heap.
//!
//! The heap does not store priorities. The planner that owns the per-cell arrays implements
//! [HeapKeyed], the heap reads the *current* key of a cell whenever it compares two cells and
//! writes the slot a cell occupies back into the planner's arrays. A planner changes a key by
//! first writing the new cost into its own arrays and then calling [IndexedHeap::update] with
//! the slot of the cell.
use crate::error::EmptyQueueError;

/// Slot stored for cells that are not in the heap.
pub const NOT_IN_HEAP: usize = usize::MAX;

/// Access to the keys and heap slots of the items of an [IndexedHeap].
pub trait HeapKeyed {
    type Key: Ord + Copy;

    fn key(&self, item: usize) -> Self::Key;
    fn heap_ix(&self, item: usize) -> usize;
    fn set_heap_ix(&mut self, item: usize, slot: usize);
}

#[derive(Clone, Debug, Default)]
pub struct IndexedHeap {
    arr: Vec<usize>,
}

impl IndexedHeap {
    pub fn new() -> IndexedHeap {
        IndexedHeap { arr: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> IndexedHeap {
        IndexedHeap {
            arr: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.arr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arr.is_empty()
    }

    /// Empties the heap, keeping its allocation for the next search.
    pub fn clear(&mut self) {
        self.arr.clear();
    }

    /// The item with the smallest key.
    pub fn peek(&self) -> Option<usize> {
        self.arr.first().copied()
    }

    /// The backing array in heap order.
    pub fn items(&self) -> &[usize] {
        &self.arr
    }

    pub fn contains<K: HeapKeyed>(&self, keys: &K, item: usize) -> bool {
        let slot = keys.heap_ix(item);
        slot < self.arr.len() && self.arr[slot] == item
    }

    /// Adds an item and returns the slot it ends up in.
    pub fn insert<K: HeapKeyed>(&mut self, keys: &mut K, item: usize) -> usize {
        debug_assert!(!self.contains(keys, item), "item {item} inserted twice");
        self.arr.push(item);
        let slot = self.arr.len() - 1;
        keys.set_heap_ix(item, slot);
        self.sift_up(keys, slot)
    }

    /// Removes and returns the item with the smallest key.
    pub fn pop<K: HeapKeyed>(&mut self, keys: &mut K) -> Result<usize, EmptyQueueError> {
        if self.arr.is_empty() {
            return Err(EmptyQueueError);
        }
        let root = self.arr.swap_remove(0);
        keys.set_heap_ix(root, NOT_IN_HEAP);
        if let Some(&moved) = self.arr.first() {
            keys.set_heap_ix(moved, 0);
            self.sift_down(keys, 0);
        }
        Ok(root)
    }

    /// Restores the heap order after the key of the item in `slot` was changed by the owner.
    /// The item moves up if it is now smaller than its parent and down otherwise.
    pub fn update<K: HeapKeyed>(&mut self, keys: &mut K, slot: usize) -> usize {
        debug_assert!(slot < self.arr.len(), "slot {slot} is outside the heap");
        debug_assert_eq!(keys.heap_ix(self.arr[slot]), slot, "heap slot out of sync");
        if slot > 0 {
            let parent = (slot - 1) / 2;
            if keys.key(self.arr[slot]) < keys.key(self.arr[parent]) {
                return self.sift_up(keys, slot);
            }
        }
        self.sift_down(keys, slot)
    }

    fn sift_up<K: HeapKeyed>(&mut self, keys: &mut K, mut ix: usize) -> usize {
        while ix > 0 {
            let parent = (ix - 1) / 2;
            if keys.key(self.arr[ix]) < keys.key(self.arr[parent]) {
                self.swap(keys, ix, parent);
                ix = parent;
            } else {
                break;
            }
        }
        ix
    }

    fn sift_down<K: HeapKeyed>(&mut self, keys: &mut K, mut ix: usize) -> usize {
        let len = self.arr.len();
        loop {
            let left = 2 * ix + 1;
            let right = left + 1;
            let mut lesser = ix;
            if left < len && keys.key(self.arr[left]) < keys.key(self.arr[lesser]) {
                lesser = left;
            }
            if right < len && keys.key(self.arr[right]) < keys.key(self.arr[lesser]) {
                lesser = right;
            }
            if lesser == ix {
                return ix;
            }
            self.swap(keys, ix, lesser);
            ix = lesser;
        }
    }

    fn swap<K: HeapKeyed>(&mut self, keys: &mut K, a: usize, b: usize) {
        self.arr.swap(a, b);
        keys.set_heap_ix(self.arr[a], a);
        keys.set_heap_ix(self.arr[b], b);
    }

    /// Checks heap order and that every item knows its own slot.
    pub fn check_invariants<K: HeapKeyed>(&self, keys: &K) -> bool {
        self.arr.iter().enumerate().all(|(slot, &item)| {
            let ordered = slot == 0 || keys.key(self.arr[(slot - 1) / 2]) <= keys.key(item);
            ordered && keys.heap_ix(item) == slot
        })
    }
}
