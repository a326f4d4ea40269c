//! K-way merge over sorted cell sources
//!
//! ```text
//! MergingIterator
//!     ├─→ Min-heap of (cell, source index)
//!     └─→ Vec<CellSource>, index 0 = highest priority
//! ```
//!
//! Sources are ordered by recency: the active memtable first, then frozen
//! memtables newest first, then segments by descending sequence. When two
//! sources hold a cell with an identical key the lower index wins and the
//! other copy is skipped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::cell::Cell;
use crate::error::Result;

/// A sorted stream of cells
pub type CellSource = Box<dyn Iterator<Item = Result<Cell>> + Send>;

/// Wrap an already sorted vector as a source
pub fn memory_source(cells: Vec<Cell>) -> CellSource {
    Box::new(cells.into_iter().map(Ok))
}

/// Heap entry ordered by key (reversed) then source index (reversed)
struct HeapEntry {
    cell: Cell,
    source: usize,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cell
            .key
            .cmp(&self.cell.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for HeapEntry {}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cell.key == other.cell.key && self.source == other.source
    }
}

/// Merges sorted sources into one sorted, de-duplicated stream
///
/// The first error from any source ends the stream.
pub struct MergingIterator {
    sources: Vec<CellSource>,
    heap: BinaryHeap<HeapEntry>,
    primed: bool,
    failed: bool,
}

impl MergingIterator {
    pub fn new(sources: Vec<CellSource>) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(sources.len()),
            sources,
            primed: false,
            failed: false,
        }
    }

    /// Pull the next cell of `source` into the heap
    fn advance(&mut self, source: usize) -> Result<()> {
        if let Some(next) = self.sources[source].next() {
            self.heap.push(HeapEntry {
                cell: next?,
                source,
            });
        }
        Ok(())
    }

    fn step(&mut self) -> Result<Option<Cell>> {
        if !self.primed {
            self.primed = true;
            for source in 0..self.sources.len() {
                self.advance(source)?;
            }
        }

        let top = match self.heap.pop() {
            Some(top) => top,
            None => return Ok(None),
        };
        self.advance(top.source)?;

        // Shadowed copies of the same key from lower-priority sources
        while let Some(dup) = self.heap.peek() {
            if dup.cell.key != top.cell.key {
                break;
            }
            let source = dup.source;
            self.heap.pop();
            self.advance(source)?;
        }

        Ok(Some(top.cell))
    }
}

impl Iterator for MergingIterator {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.step() {
            Ok(cell) => cell.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Groups a sorted cell stream into rows
pub struct RowGroups<I> {
    inner: I,
    /// First cell of the next row, already pulled from `inner`
    carry: Option<Cell>,
    failed: bool,
}

impl<I> RowGroups<I>
where
    I: Iterator<Item = Result<Cell>>,
{
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            carry: None,
            failed: false,
        }
    }
}

impl<I> Iterator for RowGroups<I>
where
    I: Iterator<Item = Result<Cell>>,
{
    /// (row key, every cell of the row in canonical order)
    type Item = Result<(Vec<u8>, Vec<Cell>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let first = match self.carry.take() {
            Some(cell) => cell,
            None => match self.inner.next()? {
                Ok(cell) => cell,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            },
        };

        let row = first.row().to_vec();
        let mut cells = vec![first];
        loop {
            match self.inner.next() {
                Some(Ok(cell)) if cell.row() == row.as_slice() => cells.push(cell),
                Some(Ok(cell)) => {
                    self.carry = Some(cell);
                    break;
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                None => break,
            }
        }

        Some(Ok((row, cells)))
    }
}
