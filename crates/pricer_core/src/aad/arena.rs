//! Block arena with stable positions and mark/rewind checkpoints.
//!
//! Elements are stored in a list of fixed-capacity blocks. A block is never
//! reallocated once handed out, so every [`Position`] stays valid until the
//! arena is rewound past it or cleared. Rewinding keeps the blocks allocated
//! for reuse, which is what makes per-path tape replay cheap.

/// Location of an element inside an [`Arena`].
///
/// Positions are ordered by insertion: an element recorded later always
/// compares greater than one recorded earlier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// Block index.
    pub block: usize,
    /// Slot inside the block.
    pub slot: usize,
}

impl Position {
    /// Start of an arena.
    pub const START: Position = Position { block: 0, slot: 0 };

    /// Position of the element immediately after this one in the same block.
    #[inline]
    pub fn next(self) -> Position {
        Position {
            block: self.block,
            slot: self.slot + 1,
        }
    }
}

/// Growable block storage.
///
/// # Examples
///
/// ```
/// use pricer_core::aad::Arena;
///
/// let mut arena = Arena::new(2);
/// let a = arena.emplace_back(1.0);
/// arena.set_mark();
/// arena.emplace_back(2.0);
/// arena.emplace_back(3.0);
/// assert_eq!(arena.len(), 3);
///
/// arena.rewind_to_mark();
/// assert_eq!(arena.len(), 1);
/// assert_eq!(*arena.get(a), 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct Arena<T> {
    blocks: Vec<Vec<T>>,
    block_size: usize,
    current: usize,
    mark: Position,
}

impl<T> Arena<T> {
    /// Creates an arena whose blocks hold `block_size` elements.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero.
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "block_size must be positive");
        Self {
            blocks: vec![Vec::with_capacity(block_size)],
            block_size,
            current: 0,
            mark: Position::START,
        }
    }

    /// Elements per regular block.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks currently allocated (used or kept for reuse).
    #[inline]
    pub fn allocated_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Stores `value` and returns its position.
    #[inline]
    pub fn emplace_back(&mut self, value: T) -> Position {
        if self.remaining() == 0 {
            self.advance(1);
        }
        let block = &mut self.blocks[self.current];
        let slot = block.len();
        block.push(value);
        Position {
            block: self.current,
            slot,
        }
    }

    /// Position one past the last stored element.
    #[inline]
    pub fn end_position(&self) -> Position {
        Position {
            block: self.current,
            slot: self.blocks[self.current].len(),
        }
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        self.blocks[..=self.current].iter().map(Vec::len).sum()
    }

    /// Returns true when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.current == 0 && self.blocks[0].is_empty()
    }

    /// Returns true when `pos` refers to a stored element.
    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        pos.block <= self.current && pos.slot < self.blocks[pos.block].len()
    }

    /// Element at `pos`.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is not a live position.
    #[inline]
    pub fn get(&self, pos: Position) -> &T {
        &self.blocks[pos.block][pos.slot]
    }

    /// Mutable element at `pos`.
    #[inline]
    pub fn get_mut(&mut self, pos: Position) -> &mut T {
        &mut self.blocks[pos.block][pos.slot]
    }

    /// `n` contiguous elements starting at `pos`.
    #[inline]
    pub fn slice(&self, pos: Position, n: usize) -> &[T] {
        &self.blocks[pos.block][pos.slot..pos.slot + n]
    }

    /// Mutable view of `n` contiguous elements starting at `pos`.
    #[inline]
    pub fn slice_mut(&mut self, pos: Position, n: usize) -> &mut [T] {
        &mut self.blocks[pos.block][pos.slot..pos.slot + n]
    }

    /// Removes the last `n` elements of the current block.
    ///
    /// Used to give back the unused tail of the most recent multi-slot
    /// reservation.
    ///
    /// # Panics
    ///
    /// Panics if the current block holds fewer than `n` elements.
    pub fn pop(&mut self, n: usize) {
        let block = &mut self.blocks[self.current];
        assert!(n <= block.len(), "cannot pop past the start of a block");
        block.truncate(block.len() - n);
    }

    /// Saves the current end position as the checkpoint.
    #[inline]
    pub fn set_mark(&mut self) {
        self.mark = self.end_position();
    }

    /// Checkpoint saved by [`Arena::set_mark`].
    #[inline]
    pub fn mark(&self) -> Position {
        self.mark
    }

    /// Drops everything recorded after the checkpoint. Blocks are kept.
    pub fn rewind_to_mark(&mut self) {
        let mark = self.mark;
        for block in &mut self.blocks[mark.block + 1..=self.current] {
            block.clear();
        }
        self.blocks[mark.block].truncate(mark.slot);
        self.current = mark.block;
    }

    /// Drops every element and resets the checkpoint. Blocks are kept.
    pub fn rewind(&mut self) {
        for block in &mut self.blocks[..=self.current] {
            block.clear();
        }
        self.current = 0;
        self.mark = Position::START;
    }

    /// Drops every element and releases all blocks but one.
    pub fn clear(&mut self) {
        self.blocks = vec![Vec::with_capacity(self.block_size)];
        self.current = 0;
        self.mark = Position::START;
    }

    /// Applies `f` to every stored element.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut T)) {
        for block in &mut self.blocks[..=self.current] {
            block.iter_mut().for_each(&mut f);
        }
    }

    /// Iterates over every stored element in insertion order.
    ///
    /// The iterator is double ended, so `.rev()` walks the arena backward.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Position, &T)> + '_ {
        self.range(Position::START, self.end_position())
    }

    /// Iterates over the elements in `[from, to)`.
    pub fn range(
        &self,
        from: Position,
        to: Position,
    ) -> impl DoubleEndedIterator<Item = (Position, &T)> + '_ {
        let last = to.block.min(self.current);
        (from.block..=last).flat_map(move |b| {
            let block = &self.blocks[b];
            let start = if b == from.block { from.slot } else { 0 };
            let end = if b == to.block {
                to.slot.min(block.len())
            } else {
                block.len()
            };
            let start = start.min(end);
            block[start..end]
                .iter()
                .enumerate()
                .map(move |(i, v)| (Position { block: b, slot: start + i }, v))
        })
    }

    /// Walks backward from the end and returns the first element matching
    /// `pred`.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<Position> {
        self.iter().rev().find(|(_, v)| pred(v)).map(|(p, _)| p)
    }

    #[inline]
    fn remaining(&self) -> usize {
        let block = &self.blocks[self.current];
        block.capacity() - block.len()
    }

    /// Moves the cursor to a block with room for `n` contiguous elements.
    fn advance(&mut self, n: usize) {
        self.current += 1;
        let capacity = n.max(self.block_size);
        if self.current == self.blocks.len() {
            self.blocks.push(Vec::with_capacity(capacity));
        } else if self.blocks[self.current].capacity() < n {
            self.blocks[self.current] = Vec::with_capacity(capacity);
        }
    }
}

impl<T: Default + Clone> Arena<T> {
    /// Reserves `n` contiguous default-valued elements and returns the
    /// position of the first.
    ///
    /// A reservation never straddles two blocks. When it does not fit in the
    /// current block the cursor moves to a fresh one, allocating an
    /// oversized block if `n` exceeds the block size.
    pub fn emplace_back_multi(&mut self, n: usize) -> Position {
        if n > self.remaining() {
            self.advance(n);
        }
        let block = &mut self.blocks[self.current];
        let slot = block.len();
        block.resize(slot + n, T::default());
        Position {
            block: self.current,
            slot,
        }
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new(16_384)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_grows_across_blocks() {
        let mut arena = Arena::new(4);
        let positions: Vec<_> = (0..10).map(|i| arena.emplace_back(i)).collect();
        assert_eq!(arena.len(), 10);
        assert_eq!(arena.allocated_blocks(), 3);
        for (i, pos) in positions.iter().enumerate() {
            assert_eq!(*arena.get(*pos), i);
        }
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_multi_never_straddles_blocks() {
        let mut arena: Arena<f64> = Arena::new(4);
        arena.emplace_back(1.0);
        arena.emplace_back(2.0);
        let pos = arena.emplace_back_multi(3);
        assert_eq!(pos, Position { block: 1, slot: 0 });
        assert_eq!(arena.slice(pos, 3), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_multi_oversized_block() {
        let mut arena: Arena<f64> = Arena::new(4);
        let pos = arena.emplace_back_multi(10);
        arena.slice_mut(pos, 10)[9] = 7.0;
        assert_eq!(arena.slice(pos, 10)[9], 7.0);
        let next = arena.emplace_back(1.0);
        assert!(next > pos);
    }

    #[test]
    fn test_rewind_to_mark_keeps_prefix_and_blocks() {
        let mut arena = Arena::new(2);
        arena.emplace_back(1);
        arena.emplace_back(2);
        arena.emplace_back(3);
        arena.set_mark();
        for i in 0..7 {
            arena.emplace_back(10 + i);
        }
        let blocks = arena.allocated_blocks();
        arena.rewind_to_mark();
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.allocated_blocks(), blocks);
        let values: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 2, 3]);

        arena.emplace_back(4);
        let values: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rewind_and_clear() {
        let mut arena = Arena::new(2);
        for i in 0..5 {
            arena.emplace_back(i);
        }
        arena.rewind();
        assert!(arena.is_empty());
        assert_eq!(arena.allocated_blocks(), 3);
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.allocated_blocks(), 1);
    }

    #[test]
    fn test_iterator_is_bidirectional() {
        let mut arena = Arena::new(3);
        for i in 0..8 {
            arena.emplace_back(i);
        }
        let forward: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        let mut backward: Vec<_> = arena.iter().rev().map(|(_, v)| *v).collect();
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_range_and_find() {
        let mut arena = Arena::new(3);
        let positions: Vec<_> = (0..8).map(|i| arena.emplace_back(i)).collect();
        let slice: Vec<_> = arena
            .range(positions[2], positions[6])
            .map(|(_, v)| *v)
            .collect();
        assert_eq!(slice, vec![2, 3, 4, 5]);
        assert_eq!(arena.find(|v| v % 3 == 0), Some(positions[6]));
        assert_eq!(arena.find(|v| *v > 100), None);
    }

    #[test]
    fn test_pop_returns_tail() {
        let mut arena: Arena<u8> = Arena::new(8);
        let pos = arena.emplace_back_multi(5);
        arena.pop(2);
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.end_position(), Position { block: pos.block, slot: 3 });
    }
}
