//! Heap allocation table
//!
//! `new` allocates downward from the end of the heap region. Freed blocks are
//! kept as tombstones so a second `delete` of the same address is reported as
//! a double free instead of an unknown pointer.

use indexmap::IndexMap;

use super::object::ObjectId;
use super::value::Address;

/// State of a heap block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Allocated,
    Tombstone,
}

/// One `new` allocation
#[derive(Debug, Clone)]
pub struct HeapBlock {
    pub object: ObjectId,
    pub size: u64,
    pub state: BlockState,
}

/// Why a `delete` was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    DoubleFree,
    NotAllocated,
}

#[derive(Debug, Clone)]
pub struct Heap {
    start: Address,
    end: Address,
    /// Lowest address handed out so far
    bottom: Address,
    /// Blocks in allocation order
    blocks: IndexMap<Address, HeapBlock>,
}

impl Heap {
    pub fn new(start: Address, end: Address) -> Self {
        Heap {
            start,
            end,
            bottom: end,
            blocks: IndexMap::new(),
        }
    }

    /// Reserve `size` bytes below the current bottom. Returns `None` when the
    /// heap region is exhausted.
    pub fn reserve(&mut self, size: u64) -> Option<Address> {
        let size = size.max(1);
        let address = self.bottom.checked_sub(size).filter(|a| *a >= self.start)?;
        self.bottom = address;
        Some(address)
    }

    pub fn record(&mut self, address: Address, object: ObjectId, size: u64) {
        self.blocks.insert(
            address,
            HeapBlock {
                object,
                size,
                state: BlockState::Allocated,
            },
        );
    }

    /// Mark the block at `address` freed and return its object
    pub fn free(&mut self, address: Address) -> Result<ObjectId, FreeError> {
        match self.blocks.get_mut(&address) {
            Some(block) if block.state == BlockState::Allocated => {
                block.state = BlockState::Tombstone;
                Ok(block.object)
            }
            Some(_) => Err(FreeError::DoubleFree),
            None => Err(FreeError::NotAllocated),
        }
    }

    pub fn block(&self, address: Address) -> Option<&HeapBlock> {
        self.blocks.get(&address)
    }

    /// Blocks that were never freed, in allocation order
    pub fn live_blocks(&self) -> impl Iterator<Item = (Address, &HeapBlock)> {
        self.blocks
            .iter()
            .filter(|(_, block)| block.state == BlockState::Allocated)
            .map(|(address, block)| (*address, block))
    }

    pub fn bytes_in_use(&self) -> u64 {
        self.live_blocks().map(|(_, block)| block.size).sum()
    }

    pub fn range(&self) -> (Address, Address) {
        (self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocates_downward() {
        let mut heap = Heap::new(1000, 2000);
        let a = heap.reserve(8);
        let b = heap.reserve(4);
        assert_eq!(a, Some(1992));
        assert_eq!(b, Some(1988));
    }

    #[test]
    fn test_exhaustion() {
        let mut heap = Heap::new(1000, 1010);
        assert!(heap.reserve(8).is_some());
        assert!(heap.reserve(8).is_none());
    }

    #[test]
    fn test_double_free_detected() {
        let mut heap = Heap::new(0, 100);
        let address = heap.reserve(4).unwrap_or_default();
        heap.record(address, ObjectId(3), 4);
        assert_eq!(heap.free(address), Ok(ObjectId(3)));
        assert_eq!(heap.free(address), Err(FreeError::DoubleFree));
        assert_eq!(heap.free(5), Err(FreeError::NotAllocated));
        assert_eq!(heap.live_blocks().count(), 0);
    }
}
