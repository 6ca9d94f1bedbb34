use bytes::Bytes;

use peerdrop_protocol::{CHUNK_SIZE, CHUNKS_PER_BLOCK};

// ---------------------------------------------------------------------------
// ChunkPlanner
// ---------------------------------------------------------------------------

/// Maps block indices and chunk counters onto byte ranges of the file.
///
/// Pure arithmetic over a fixed geometry. The default geometry is the
/// protocol's build-time constants; both peers must use the same one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlanner {
    chunk_size: usize,
    chunks_per_block: usize,
}

impl Default for ChunkPlanner {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            chunks_per_block: CHUNKS_PER_BLOCK,
        }
    }
}

impl ChunkPlanner {
    /// Creates a planner with a custom geometry.
    ///
    /// # Panics
    /// Panics if either value is zero.
    pub fn new(chunk_size: usize, chunks_per_block: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        assert!(chunks_per_block > 0, "chunks per block must be positive");
        Self {
            chunk_size,
            chunks_per_block,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunks_per_block(&self) -> usize {
        self.chunks_per_block
    }

    /// Bytes covered by one block.
    pub fn block_size(&self) -> u64 {
        (self.chunk_size as u64) * (self.chunks_per_block as u64)
    }

    /// Half-open byte range of block `index`, not clamped to any file size.
    pub fn block_range(&self, index: u64) -> (u64, u64) {
        let start = index.saturating_mul(self.block_size());
        (start, start.saturating_add(self.block_size()))
    }

    /// Byte range of block `index` clamped to `file_size`.
    ///
    /// Returns `None` when the block starts at or past the end of the file.
    pub fn clamped_block_range(&self, index: u64, file_size: u64) -> Option<(u64, u64)> {
        let (start, end) = self.block_range(index);
        if start >= file_size {
            return None;
        }
        Some((start, end.min(file_size)))
    }

    /// Number of chunk messages needed for a file: `ceil(file_size / chunk_size)`.
    pub fn total_chunks(&self, file_size: u64) -> u64 {
        file_size.div_ceil(self.chunk_size as u64)
    }

    /// Number of block requests needed for a file.
    pub fn total_blocks(&self, file_size: u64) -> u64 {
        file_size.div_ceil(self.block_size())
    }

    /// Zero-based block containing the `chunk_index`-th chunk (counting from 1).
    pub fn block_of_chunk(&self, chunk_index: u64) -> u64 {
        chunk_index.saturating_sub(1) / self.chunks_per_block as u64
    }

    /// Returns `true` when the `chunk_index`-th received chunk (counting from 1)
    /// closes a block: at every positive multiple of the block length, and at
    /// the final chunk of the file even when that block is short.
    pub fn is_last_chunk_of_block(&self, total: u64, chunk_index: u64) -> bool {
        chunk_index == total
            || (chunk_index != 0 && chunk_index % self.chunks_per_block as u64 == 0)
    }

    /// Splits a block into chunk-sized slices; the last one may be shorter.
    pub fn split_into_chunks(&self, block: Bytes) -> Chunks {
        Chunks {
            block,
            chunk_size: self.chunk_size,
            offset: 0,
        }
    }
}

/// Lazy iterator over the chunk slices of one block.
///
/// Slices share the block's buffer. Cloning the iterator before consuming it
/// replays the same sequence.
#[derive(Debug, Clone)]
pub struct Chunks {
    block: Bytes,
    chunk_size: usize,
    offset: usize,
}

impl Iterator for Chunks {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.offset >= self.block.len() {
            return None;
        }
        let end = (self.offset + self.chunk_size).min(self.block.len());
        let chunk = self.block.slice(self.offset..end);
        self.offset = end;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.block.len() - self.offset).div_ceil(self.chunk_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks {}

#[cfg(test)]
mod tests {
    use super::*;

    const C: u64 = 4;
    const K: u64 = 3;

    fn small() -> ChunkPlanner {
        ChunkPlanner::new(C as usize, K as usize)
    }

    #[test]
    fn default_uses_protocol_constants() {
        let p = ChunkPlanner::default();
        assert_eq!(p.chunk_size(), CHUNK_SIZE);
        assert_eq!(p.chunks_per_block(), CHUNKS_PER_BLOCK);
        assert_eq!(p.block_size(), 1_024_000);
    }

    #[test]
    fn total_chunks_is_ceiling() {
        let p = small();
        assert_eq!(p.total_chunks(0), 0);
        assert_eq!(p.total_chunks(1), 1);
        assert_eq!(p.total_chunks(C - 1), 1);
        assert_eq!(p.total_chunks(C), 1);
        assert_eq!(p.total_chunks(C + 1), 2);
        assert_eq!(p.total_chunks(C * K), K);
        assert_eq!(p.total_chunks(C * K + 1), K + 1);
    }

    #[test]
    fn total_chunks_default_geometry() {
        let p = ChunkPlanner::default();
        assert_eq!(p.total_chunks(16_000), 1);
        assert_eq!(p.total_chunks(16_001), 2);
        assert_eq!(p.total_chunks(10_000_000), 625);
    }

    #[test]
    fn block_ranges_are_contiguous() {
        let p = small();
        assert_eq!(p.block_range(0), (0, C * K));
        for i in 0..20 {
            let (start, end) = p.block_range(i);
            assert_eq!(start, i * C * K);
            assert_eq!(end, start + C * K);
            assert_eq!(p.block_range(i + 1).0, end);
        }
    }

    #[test]
    fn clamped_block_range() {
        let p = small();
        assert_eq!(p.clamped_block_range(0, 5), Some((0, 5)));
        assert_eq!(p.clamped_block_range(1, C * K + 1), Some((C * K, C * K + 1)));
        assert_eq!(p.clamped_block_range(1, C * K), None);
        assert_eq!(p.clamped_block_range(0, 0), None);
    }

    #[test]
    fn total_blocks() {
        let p = small();
        assert_eq!(p.total_blocks(0), 0);
        assert_eq!(p.total_blocks(1), 1);
        assert_eq!(p.total_blocks(C * K), 1);
        assert_eq!(p.total_blocks(C * K + 1), 2);
    }

    #[test]
    fn last_chunk_at_multiples_of_block() {
        let p = small();
        let total = 100;
        for i in 1..total {
            assert_eq!(p.is_last_chunk_of_block(total, i), i % K == 0, "chunk {i}");
        }
    }

    #[test]
    fn last_chunk_at_total() {
        let p = small();
        assert!(p.is_last_chunk_of_block(4, 4));
        assert!(p.is_last_chunk_of_block(1, 1));
        assert!(p.is_last_chunk_of_block(K, K));
    }

    #[test]
    fn zero_is_not_a_block_boundary() {
        let p = small();
        assert!(!p.is_last_chunk_of_block(10, 0));
    }

    #[test]
    fn block_of_chunk_counts_from_one() {
        let p = small();
        assert_eq!(p.block_of_chunk(1), 0);
        assert_eq!(p.block_of_chunk(K), 0);
        assert_eq!(p.block_of_chunk(K + 1), 1);
        assert_eq!(p.block_of_chunk(2 * K), 1);
    }

    #[test]
    fn split_full_block() {
        let p = small();
        let block = Bytes::from((0u8..12).collect::<Vec<_>>());
        let chunks: Vec<_> = p.split_into_chunks(block).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(&chunks[0][..], &[0, 1, 2, 3]);
        assert_eq!(&chunks[2][..], &[8, 9, 10, 11]);
    }

    #[test]
    fn split_truncates_last_chunk() {
        let p = small();
        let chunks: Vec<_> = p.split_into_chunks(Bytes::from_static(b"abcdefghij")).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(&chunks[2][..], b"ij");
    }

    #[test]
    fn split_empty_block() {
        let p = small();
        assert_eq!(p.split_into_chunks(Bytes::new()).count(), 0);
    }

    #[test]
    fn split_is_restartable() {
        let p = small();
        let chunks = p.split_into_chunks(Bytes::from_static(b"0123456789"));
        assert_eq!(chunks.len(), 3);
        let first: Vec<_> = chunks.clone().collect();
        let second: Vec<_> = chunks.collect();
        assert_eq!(first, second);
    }

    #[test]
    #[should_panic]
    fn zero_chunk_size_panics() {
        let _ = ChunkPlanner::new(0, 1);
    }
}
