// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Fixed-size lock-free pools for clip commands and timer commands (spec
//! section 5, "Pool discipline"). Since both command types are plain `Copy`
//! value records with no heap allocation of their own, a bounded SPSC ring
//! doubles as the pool: "drawing from the pool" is pushing a value onto the
//! ring, and "returning to the pool" is the audio thread draining it.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

/// Default pool capacity, matching the "typically 1024 entries" guidance.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// A single-producer-single-consumer pool of fixed capacity. `push` never
/// blocks or allocates; a full pool returns `Err(value)` so the caller can
/// bump a pool-exhaustion counter and drop the value.
pub struct CommandPool<T> {
    producer: HeapProducer<T>,
    consumer: HeapConsumer<T>,
}

impl<T> CommandPool<T> {
    pub fn new(capacity: usize) -> CommandPool<T> {
        let ring = HeapRb::<T>::new(capacity);
        let (producer, consumer) = ring.split();
        CommandPool { producer, consumer }
    }

    /// Attempts to enqueue a value. Returns the value back on failure so the
    /// caller can record a pool-exhaustion drop without losing it for logging.
    pub fn push(&mut self, value: T) -> Result<(), T> {
        self.producer.push(value)
    }

    pub fn pop(&mut self) -> Option<T> {
        self.consumer.pop()
    }

    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.producer.capacity().into()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn push_and_pop_preserve_order() {
        let mut pool: CommandPool<u32> = CommandPool::new(4);
        pool.push(1).unwrap();
        pool.push(2).unwrap();
        assert_eq!(pool.pop(), Some(1));
        assert_eq!(pool.pop(), Some(2));
        assert_eq!(pool.pop(), None);
    }

    #[test]
    fn push_fails_without_blocking_when_full() {
        let mut pool: CommandPool<u32> = CommandPool::new(2);
        pool.push(1).unwrap();
        pool.push(2).unwrap();
        assert_eq!(pool.push(3), Err(3));
    }
}
