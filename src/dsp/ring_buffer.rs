//! Ring buffer: fixed-capacity circular storage shared by every delay-based effect.
//!
//! All reads and writes are indexed modulo the capacity, so callers can address
//! cells relative to the write cursor with plain (possibly negative) arithmetic.
//! The buffer never grows while processing; only `resize` reallocates, and that
//! happens on the control side before a stream starts.

/// A fixed-capacity circular buffer with a write cursor.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    cells: Box<[T]>,
    cursor: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a buffer of `capacity` cells, all set to `T::default()`.
    ///
    /// A zero capacity is bumped to one cell so modulo indexing stays defined.
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![T::default(); capacity.max(1)].into_boxed_slice(),
            cursor: 0,
        }
    }

    /// Number of cells.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Current write cursor, always in `0..capacity`.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    fn index(&self, pos: isize) -> usize {
        pos.rem_euclid(self.cells.len() as isize) as usize
    }

    /// Read the cell at `pos` (modulo capacity).
    #[inline]
    pub fn read(&self, pos: isize) -> T {
        self.cells[self.index(pos)]
    }

    /// Overwrite the cell at `pos` (modulo capacity).
    #[inline]
    pub fn write(&mut self, pos: isize, value: T) {
        let i = self.index(pos);
        self.cells[i] = value;
    }

    /// Read the cell `delay` positions behind the write cursor.
    #[inline]
    pub fn read_behind(&self, delay: usize) -> T {
        self.read(self.cursor as isize - delay as isize)
    }

    /// Read the cell under the write cursor (the oldest value once the buffer has wrapped).
    #[inline]
    pub fn current(&self) -> T {
        self.cells[self.cursor]
    }

    /// Write at the cursor without moving it.
    #[inline]
    pub fn write_current(&mut self, value: T) {
        self.cells[self.cursor] = value;
    }

    /// Move the cursor one cell forward, wrapping at the end.
    #[inline]
    pub fn advance(&mut self) {
        self.cursor += 1;
        if self.cursor == self.cells.len() {
            self.cursor = 0;
        }
    }

    /// Write at the cursor and advance.
    #[inline]
    pub fn push(&mut self, value: T) {
        self.write_current(value);
        self.advance();
    }

    /// Copy the contents into `out` in chronological order (oldest first).
    ///
    /// `out` must be exactly `capacity` long; extra or missing cells are ignored.
    pub fn copy_chronological(&self, out: &mut [T]) {
        let (newer, older) = self.cells.split_at(self.cursor);
        let split = older.len().min(out.len());
        out[..split].copy_from_slice(&older[..split]);
        let rest = (out.len() - split).min(newer.len());
        out[split..split + rest].copy_from_slice(&newer[..rest]);
    }

    /// Zero every cell and rewind the cursor.
    pub fn clear(&mut self) {
        self.cells.fill(T::default());
        self.cursor = 0;
    }

    /// Reallocate to a new capacity. Contents are cleared.
    pub fn resize(&mut self, capacity: usize) {
        self.cells = vec![T::default(); capacity.max(1)].into_boxed_slice();
        self.cursor = 0;
    }
}
