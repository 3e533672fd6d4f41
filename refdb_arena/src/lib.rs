//! Region allocator backing every variable-length catalog field.
//!
//! An [`Arena`] owns a list of large blocks and bump-allocates byte ranges out of them. Records
//! never own their strings or arrays; they store [`ArenaStr`] / [`ArenaSlice`] views, which are
//! plain offsets and can only be turned back into data through the `&Arena` that produced them.
//! There is no per-allocation free: the arena, and with it every range it handed out, goes away
//! in one piece when it is dropped.
#![deny(unsafe_code)]

use std::marker::PhantomData;

/// Default block size: 1 MiB
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// A byte range inside an [`Arena`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ArenaRange {
    block: u32,
    offset: u32,
    len: u32,
}

impl ArenaRange {
    pub const EMPTY: Self = Self {
        block: 0,
        offset: 0,
        len: 0,
    };

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A UTF-8 string stored in an [`Arena`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ArenaStr(ArenaRange);

impl ArenaStr {
    pub const EMPTY: Self = Self(ArenaRange::EMPTY);

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn range(&self) -> ArenaRange {
        self.0
    }
}

/// A fixed-size value that can live in an [`Arena`] array.
///
/// Values are stored little endian regardless of host or file byte order.
pub trait ArenaValue: Copy {
    const SIZE: usize;

    fn load(bytes: &[u8]) -> Self;
    fn store(&self, out: &mut [u8]);
}

macro_rules! arena_value {
    ($($t:ty),*) => {
        $(
            impl ArenaValue for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn load(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$t>::from_le_bytes(raw)
                }

                fn store(&self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

arena_value!(u8, u16, u32, i32, u64, f32);

/// A typed array stored in an [`Arena`]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ArenaSlice<T> {
    range: ArenaRange,
    _type: PhantomData<T>,
}

impl<T> Clone for ArenaSlice<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaSlice<T> {}

impl<T> Default for ArenaSlice<T> {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl<T> ArenaSlice<T> {
    pub const EMPTY: Self = Self {
        range: ArenaRange::EMPTY,
        _type: PhantomData,
    };
}

impl<T: ArenaValue> ArenaSlice<T> {
    /// Wrap a range previously filled with `T` values
    pub fn from_range(range: ArenaRange) -> Self {
        debug_assert_eq!(range.len() % T::SIZE.max(1), 0);
        Self {
            range,
            _type: PhantomData,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.range.len() / T::SIZE.max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn range(&self) -> ArenaRange {
        self.range
    }
}

/// Iterator over the values of an [`ArenaSlice`]
#[derive(Debug, Clone)]
pub struct ArenaIter<'a, T> {
    bytes: std::slice::ChunksExact<'a, u8>,
    _type: PhantomData<T>,
}

impl<T: ArenaValue> Iterator for ArenaIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.bytes.next().map(T::load)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.bytes.size_hint()
    }
}

impl<T: ArenaValue> ExactSizeIterator for ArenaIter<'_, T> {}

/// A bump allocator over large, never-moving blocks
#[derive(Debug)]
pub struct Arena {
    blocks: Vec<Box<[u8]>>,
    block_size: usize,
    /// Index of the block small requests are bumped from
    current: Option<usize>,
    /// Bytes used in the current block
    used: usize,
    allocated: usize,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// Create an arena with a custom block size.
    ///
    /// # Panics
    ///
    /// If `block_size` is zero or does not fit in a `u32`.
    pub fn with_block_size(block_size: usize) -> Self {
        assert!(
            block_size > 0 && u32::try_from(block_size).is_ok(),
            "arena block size must be in 1..=u32::MAX"
        );
        Self {
            blocks: Vec::new(),
            block_size,
            current: None,
            used: 0,
            allocated: 0,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes handed out so far
    pub fn allocated_bytes(&self) -> usize {
        self.allocated
    }

    /// Bytes reserved across all blocks
    pub fn capacity_bytes(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }

    fn push_block(&mut self, size: usize) -> usize {
        self.blocks.push(vec![0u8; size].into_boxed_slice());
        self.blocks.len() - 1
    }

    /// Reserve `len` zeroed bytes.
    ///
    /// The returned range stays valid, and its bytes stay at the same address, until the arena
    /// is dropped.
    ///
    /// # Panics
    ///
    /// If `len` does not fit in a `u32`.
    pub fn allocate(&mut self, len: usize) -> (ArenaRange, &mut [u8]) {
        if len == 0 {
            return (ArenaRange::EMPTY, &mut []);
        }
        assert!(
            u32::try_from(len).is_ok(),
            "arena allocation larger than 4 GiB"
        );
        let len32 = len as u32;

        let (block, offset) = if len > self.block_size {
            // oversized requests get a block of their own, the bump block stays current
            (self.push_block(len), 0)
        } else {
            let block = match self.current {
                Some(block) if self.block_size - self.used >= len => block,
                _ => {
                    let block = self.push_block(self.block_size);
                    self.current = Some(block);
                    self.used = 0;
                    block
                }
            };
            let offset = self.used;
            self.used += len;
            (block, offset)
        };
        self.allocated += len;

        let range = ArenaRange {
            block: block as u32,
            offset: offset as u32,
            len: len32,
        };
        (range, &mut self.blocks[block][offset..offset + len])
    }

    pub fn alloc_bytes(&mut self, bytes: &[u8]) -> ArenaRange {
        let (range, buf) = self.allocate(bytes.len());
        buf.copy_from_slice(bytes);
        range
    }

    pub fn alloc_str(&mut self, s: &str) -> ArenaStr {
        ArenaStr(self.alloc_bytes(s.as_bytes()))
    }

    pub fn alloc_slice<T: ArenaValue>(&mut self, values: &[T]) -> ArenaSlice<T> {
        let (range, buf) = self.allocate(values.len() * T::SIZE);
        for (v, out) in values.iter().zip(buf.chunks_exact_mut(T::SIZE.max(1))) {
            v.store(out);
        }
        ArenaSlice::from_range(range)
    }

    /// Adopt a range that was filled with UTF-8 by the caller.
    ///
    /// Returns `None` if the bytes are not valid UTF-8.
    pub fn str_from_range(&self, range: ArenaRange) -> Option<ArenaStr> {
        std::str::from_utf8(self.bytes(range)).ok()?;
        Some(ArenaStr(range))
    }

    pub fn bytes(&self, range: ArenaRange) -> &[u8] {
        if range.is_empty() {
            return &[];
        }
        let start = range.offset as usize;
        let bytes = self
            .blocks
            .get(range.block as usize)
            .and_then(|b| b.get(start..start + range.len()));
        debug_assert!(bytes.is_some(), "range {range:?} does not belong to this arena");
        bytes.unwrap_or_default()
    }

    fn bytes_mut(&mut self, range: ArenaRange) -> &mut [u8] {
        if range.is_empty() {
            return &mut [];
        }
        let start = range.offset as usize;
        self.blocks
            .get_mut(range.block as usize)
            .and_then(|b| b.get_mut(start..start + range.len()))
            .unwrap_or_default()
    }

    pub fn str(&self, s: ArenaStr) -> &str {
        std::str::from_utf8(self.bytes(s.0)).unwrap_or_default()
    }

    pub fn slice<T: ArenaValue>(&self, s: ArenaSlice<T>) -> ArenaIter<'_, T> {
        ArenaIter {
            bytes: self.bytes(s.range).chunks_exact(T::SIZE.max(1)),
            _type: PhantomData,
        }
    }

    /// Rewrite every element of `slice` in place
    pub fn map_slice<T, F>(&mut self, slice: ArenaSlice<T>, mut f: F)
    where
        T: ArenaValue,
        F: FnMut(T) -> T,
    {
        let size = T::SIZE.max(1);
        for out in self.bytes_mut(slice.range).chunks_exact_mut(size) {
            f(T::load(out)).store(out);
        }
    }

    /// Keep only the elements matching `keep`, compacting them to the front of the slice.
    ///
    /// Memory is not returned to the arena. Returns the number of removed elements.
    pub fn retain_slice<T, F>(&mut self, slice: &mut ArenaSlice<T>, mut keep: F) -> usize
    where
        T: ArenaValue,
        F: FnMut(T) -> bool,
    {
        let size = T::SIZE.max(1);
        let bytes = self.bytes_mut(slice.range);
        let total = bytes.len() / size;
        let mut kept = 0;
        for i in 0..total {
            let v = T::load(&bytes[i * size..]);
            if keep(v) {
                v.store(&mut bytes[kept * size..]);
                kept += 1;
            }
        }
        slice.range.len = (kept * size) as u32;
        if kept == 0 {
            slice.range = ArenaRange::EMPTY;
        }
        total - kept
    }
}
