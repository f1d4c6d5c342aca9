//! Simulation configuration
//!
//! [`MemoryLayout`] fixes the address ranges of the four memory regions and
//! [`SimulationConfig`] bundles it with the driver limits. Both have sensible
//! defaults; the binary maps its command-line flags onto them.

/// Address ranges of the static, stack, heap and temporary regions
///
/// ```text
/// 0 ........ static_end ........ stack_end ........ heap_end  +100  temporaries
/// | statics |   stack (grows →)  |  heap (← grows)  |          |  ...
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    pub capacity: u64,
    pub static_start: u64,
    pub static_capacity: u64,
    pub stack_start: u64,
    pub stack_capacity: u64,
    pub heap_start: u64,
    pub heap_end: u64,
    pub temporary_start: u64,
    pub temporary_capacity: u64,
}

/// Gap left between the heap end and the temporary region
const TEMPORARY_GAP: u64 = 100;

/// Bytes reserved at the bottom of static storage so no object sits at address 0
const NULL_GUARD: u64 = 4;

impl MemoryLayout {
    pub const DEFAULT_CAPACITY: u64 = 100_000;

    /// Derive the region boundaries from a total capacity
    pub fn with_capacity(capacity: u64) -> Self {
        let static_start = 0;
        let static_capacity = capacity / 10;
        let stack_start = static_start + static_capacity;
        let stack_capacity = (capacity - static_capacity) / 2;
        let heap_start = stack_start + stack_capacity;
        let heap_end = capacity;
        MemoryLayout {
            capacity,
            static_start,
            static_capacity,
            stack_start,
            stack_capacity,
            heap_start,
            heap_end,
            temporary_start: heap_end + TEMPORARY_GAP,
            temporary_capacity: Self::DEFAULT_CAPACITY,
        }
    }

    /// First address handed out to a static object
    pub fn first_static_address(&self) -> u64 {
        self.static_start + NULL_GUARD
    }

    pub fn static_end(&self) -> u64 {
        self.static_start + self.static_capacity
    }

    pub fn stack_end(&self) -> u64 {
        self.stack_start + self.stack_capacity
    }

    pub fn temporary_end(&self) -> u64 {
        self.temporary_start + self.temporary_capacity
    }

    /// Total number of addressable bytes backing the layout
    pub fn total_bytes(&self) -> usize {
        self.temporary_end() as usize
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

/// Driver settings for a [`crate::simulation::Simulation`]
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub layout: MemoryLayout,
    /// `run_to_end` stops with a step-limit outcome after this many steps
    pub max_steps: usize,
    /// Copy consumed input into the output buffer, like a terminal echo
    pub echo_input: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            layout: MemoryLayout::default(),
            max_steps: 1_000_000,
            echo_input: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_regions() {
        let layout = MemoryLayout::default();
        assert_eq!(layout.static_capacity, 10_000);
        assert_eq!(layout.stack_start, 10_000);
        assert_eq!(layout.stack_capacity, 45_000);
        assert_eq!(layout.heap_start, 55_000);
        assert_eq!(layout.heap_end, 100_000);
        assert_eq!(layout.temporary_start, 100_100);
        assert_eq!(layout.first_static_address(), 4);
    }

    #[test]
    fn test_regions_do_not_overlap() {
        let layout = MemoryLayout::with_capacity(4_000);
        assert!(layout.static_end() <= layout.stack_start);
        assert!(layout.stack_end() <= layout.heap_start);
        assert!(layout.heap_end < layout.temporary_start);
    }
}
