//! Random-access container storing its elements compressed in fixed-size
//! chunks.
//!
//! A [`CompressedVec<T>`] is a sequence of chunk slots holding exactly
//! `256 << K` elements each (only the tail may be partial). A slot owns a
//! compressed image, a decompressed *raw context*, or both; reads and writes
//! decompress chunks on demand while an LRU cap bounds the number of raw
//! contexts alive at once. A per-slot reader/writer latch keeps outstanding
//! element references safe: a chunk with live readers is skipped by the
//! eviction scan rather than demoted underneath them.
//!
//! Element types must be `bytemuck::Pod`: the container stores element
//! bytes, so moving an element must be equivalent to copying its bytes.
//!
//! Internal compression failures on paths with no recovery (demotion,
//! `pop`) panic rather than return: letting them pass would leave chunks
//! whose content can no longer be reproduced.

use std::mem::size_of;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard};

use bytemuck::{Pod, Zeroable};

use crate::context::CompressionContext;
use crate::error::StenosError;
use crate::pipeline::frame;
use crate::utils::{write_le_32, write_le_56};
use crate::{MAX_BYTES_OF_TYPE, MAX_SUPERBLOCK_BYTES};

#[cfg(test)]
mod tests;

const DEFAULT_MAX_RAW_CHUNKS: usize = 2;

struct RawChunk<T> {
    data: Vec<T>,
    dirty: bool,
}

struct ChunkState<T> {
    compressed: Option<Box<[u8]>>,
    raw: Option<RawChunk<T>>,
}

struct Chunk<T> {
    state: RwLock<ChunkState<T>>,
}

impl<T> Chunk<T> {
    fn from_raw(raw: RawChunk<T>) -> Self {
        Chunk { state: RwLock::new(ChunkState { compressed: None, raw: Some(raw) }) }
    }

    fn from_compressed(compressed: Box<[u8]>) -> Self {
        Chunk { state: RwLock::new(ChunkState { compressed: Some(compressed), raw: None }) }
    }
}

/// LRU bookkeeping for the raw contexts: (slot index, last-touch stamp).
struct CacheState {
    clock: u64,
    raw: Vec<(usize, u64)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn read_lock<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|e| e.into_inner())
}

fn state_mut<T>(chunk: &mut Chunk<T>) -> &mut ChunkState<T> {
    chunk.state.get_mut().unwrap_or_else(|e| e.into_inner())
}

/// Vector-like container with transparently compressed storage.
pub struct CompressedVec<T: Pod> {
    chunks: Vec<Chunk<T>>,
    len: usize,
    chunk_shift: u32,
    max_raw: usize,
    cache: Mutex<CacheState>,
    ctx: Mutex<CompressionContext>,
}

impl<T: Pod> Default for CompressedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Pod> CompressedVec<T> {
    /// New container at level 1 with 256-element chunks.
    pub fn new() -> Self {
        Self::with_options(1, 0)
    }

    /// New container with an explicit level (0..=9) and chunk shift: chunks
    /// hold `256 << chunk_shift` elements.
    ///
    /// # Panics
    /// If `T` is zero-sized or the resulting chunk byte size is out of the
    /// legal superblock range.
    pub fn with_options(level: i32, chunk_shift: u32) -> Self {
        let bpp = size_of::<T>();
        assert!(bpp > 0 && bpp < MAX_BYTES_OF_TYPE, "unsupported element width");
        let chunk_bytes = (bpp * 256) << chunk_shift;
        assert!(chunk_bytes < MAX_SUPERBLOCK_BYTES, "chunk size out of range");

        let mut ctx = CompressionContext::new();
        ctx.set_level(level);
        CompressedVec {
            chunks: Vec::new(),
            len: 0,
            chunk_shift,
            max_raw: DEFAULT_MAX_RAW_CHUNKS,
            cache: Mutex::new(CacheState { clock: 0, raw: Vec::new() }),
            ctx: Mutex::new(ctx),
        }
    }

    /// Soft cap on simultaneously decompressed chunks (at least 1). The cap
    /// is exceeded when every candidate chunk has active readers.
    pub fn set_max_raw_chunks(&mut self, max: usize) {
        self.max_raw = max.max(1);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements per chunk.
    #[inline]
    pub fn chunk_elems(&self) -> usize {
        256usize << self.chunk_shift
    }

    #[inline]
    fn chunk_bytes(&self) -> usize {
        self.chunk_elems() * size_of::<T>()
    }

    #[inline]
    fn chunk_len(&self, idx: usize) -> usize {
        self.chunk_elems().min(self.len - idx * self.chunk_elems())
    }

    //==============================================================================
    // Element access
    //==============================================================================

    /// Shared reference proxy to element `index`. The proxy holds the
    /// chunk's latch: while it lives the chunk cannot be demoted.
    ///
    /// # Panics
    /// On out-of-bounds access.
    pub fn get(&self, index: usize) -> ElemRef<'_, T> {
        assert!(index < self.len, "index {} out of bounds (len {})", index, self.len);
        let ce = self.chunk_elems();
        let guard = self.raw_read_guard(index / ce);
        ElemRef { guard, off: index % ce }
    }

    /// Checked variant of [`get`](Self::get).
    pub fn at(&self, index: usize) -> Option<ElemRef<'_, T>> {
        (index < self.len).then(|| self.get(index))
    }

    /// Mutable reference proxy. Marks the chunk dirty and drops its
    /// compressed image immediately.
    pub fn get_mut(&mut self, index: usize) -> ElemRefMut<'_, T> {
        assert!(index < self.len, "index {} out of bounds (len {})", index, self.len);
        let ce = self.chunk_elems();
        let idx = index / ce;
        self.ensure_raw_mut(idx);
        self.evict_excess(idx);
        let st = state_mut(&mut self.chunks[idx]);
        st.compressed = None;
        let raw = st.raw.as_mut().expect("raw context just installed");
        raw.dirty = true;
        ElemRefMut { value: &mut raw.data[index % ce] }
    }

    //==============================================================================
    // Mutators
    //==============================================================================

    /// Append an element, materialising the tail chunk if needed.
    pub fn push(&mut self, value: T) {
        let ce = self.chunk_elems();
        let idx = self.len / ce;
        if self.len % ce == 0 {
            let mut data = Vec::with_capacity(ce);
            data.push(value);
            self.chunks.push(Chunk::from_raw(RawChunk { data, dirty: true }));
            self.cache_register(idx);
        } else {
            self.ensure_raw_mut(idx);
            let st = state_mut(&mut self.chunks[idx]);
            st.compressed = None;
            let raw = st.raw.as_mut().expect("raw context just installed");
            raw.data.push(value);
            raw.dirty = true;
        }
        self.len += 1;
        self.evict_excess(idx);
    }

    /// Remove and return the last element. Frees the chunk once it empties.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let ce = self.chunk_elems();
        let idx = (self.len - 1) / ce;
        self.ensure_raw_mut(idx);
        let st = state_mut(&mut self.chunks[idx]);
        st.compressed = None;
        let raw = st.raw.as_mut().expect("raw context just installed");
        let value = raw.data.pop().expect("tail chunk cannot be empty");
        raw.dirty = true;
        self.len -= 1;
        if self.len == idx * ce {
            self.chunks.pop();
            self.cache_unregister(idx);
        } else {
            self.evict_excess(idx);
        }
        Some(value)
    }

    /// Resize to `n` elements, filling with `value` when growing. Whole new
    /// chunks are compressed once and the image cloned per chunk.
    pub fn resize(&mut self, n: usize, value: T) {
        let ce = self.chunk_elems();

        if n < self.len {
            let keep_chunks = if n == 0 { 0 } else { (n - 1) / ce + 1 };
            for idx in keep_chunks..self.chunks.len() {
                self.cache_unregister(idx);
            }
            self.chunks.truncate(keep_chunks);
            self.len = self.len.min(keep_chunks * ce);
            if self.len > n {
                // Trim the new tail chunk in place.
                let idx = keep_chunks - 1;
                let want = n - idx * ce;
                self.ensure_raw_mut(idx);
                let st = state_mut(&mut self.chunks[idx]);
                st.compressed = None;
                let raw = st.raw.as_mut().expect("raw context just installed");
                raw.data.truncate(want);
                raw.dirty = true;
                self.len = n;
                self.evict_excess(idx);
            }
            return;
        }

        while self.len < n && self.len % ce != 0 {
            self.push(value);
        }
        if n - self.len >= ce {
            let data = vec![value; ce];
            let bytes: &[u8] = bytemuck::cast_slice(&data);
            let mut record = vec![0u8; bytes.len() + 4];
            let produced = {
                let mut ctx = lock(&self.ctx);
                frame::compress_chunk(&mut ctx, bytes, size_of::<T>(), self.chunk_bytes(), &mut record)
            }
            .expect("stenos cvec: chunk compression failed with no recovery path");
            record.truncate(produced);
            let image: Box<[u8]> = record.into_boxed_slice();

            while n - self.len >= ce {
                self.chunks.push(Chunk::from_compressed(image.clone()));
                self.len += ce;
            }
        }
        while self.len < n {
            self.push(value);
        }
    }

    /// Insert at `index`, shifting the suffix right.
    pub fn insert(&mut self, index: usize, value: T) {
        assert!(index <= self.len);
        let mut carry = value;
        let len = self.len;
        self.for_each_mut(index, len, |x| {
            std::mem::swap(x, &mut carry);
            true
        });
        self.push(carry);
    }

    /// Remove and return the element at `index`, shifting the suffix left.
    pub fn remove(&mut self, index: usize) -> T {
        assert!(index < self.len);
        let ce = self.chunk_elems();
        let first = index / ce;
        let last = (self.len - 1) / ce;

        self.ensure_raw_mut(first);
        let removed;
        {
            let st = state_mut(&mut self.chunks[first]);
            st.compressed = None;
            let raw = st.raw.as_mut().expect("raw context just installed");
            raw.dirty = true;
            let off = index - first * ce;
            removed = raw.data[off];
            raw.data.copy_within(off + 1.., off);
        }

        for c in first + 1..=last {
            self.ensure_raw_mut(c);
            let head = {
                let st = state_mut(&mut self.chunks[c]);
                st.compressed = None;
                let raw = st.raw.as_mut().expect("raw context just installed");
                raw.dirty = true;
                let head = raw.data[0];
                raw.data.copy_within(1.., 0);
                head
            };
            let prev = state_mut(&mut self.chunks[c - 1]);
            let raw_prev = prev.raw.as_mut().expect("previous chunk still raw");
            let plen = raw_prev.data.len();
            raw_prev.data[plen - 1] = head;
            // The previous chunk is finished; let it age out.
            self.evict_excess(c);
        }

        let st = state_mut(&mut self.chunks[last]);
        st.raw.as_mut().expect("raw context just installed").data.pop();
        self.len -= 1;
        if self.len == last * ce {
            self.chunks.pop();
            self.cache_unregister(last);
        } else {
            self.evict_excess(last);
        }
        removed
    }

    /// Drop all elements and storage.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.len = 0;
        let mut cache = lock(&self.cache);
        cache.raw.clear();
    }

    /// Compress every dirty chunk and cap the raw contexts at the
    /// configured maximum.
    pub fn shrink_to_fit(&mut self) {
        let bpp = size_of::<T>();
        let chunk_bytes = self.chunk_bytes();

        for idx in 0..self.chunks.len() {
            let chunk_len = self.chunk_len(idx);
            let st = state_mut(&mut self.chunks[idx]);
            if let Some(raw) = &mut st.raw {
                if raw.dirty || st.compressed.is_none() {
                    let bytes: &[u8] = bytemuck::cast_slice(&raw.data[..chunk_len]);
                    let mut record = vec![0u8; bytes.len() + 4];
                    let produced = {
                        let mut ctx = lock(&self.ctx);
                        frame::compress_chunk(&mut ctx, bytes, bpp, chunk_bytes, &mut record)
                    }
                    .expect("stenos cvec: chunk compression failed with no recovery path");
                    record.truncate(produced);
                    st.compressed = Some(record.into_boxed_slice());
                    raw.dirty = false;
                }
            }
        }

        // Keep only the most recently used raw contexts.
        let mut by_age: Vec<(usize, u64)> = lock(&self.cache).raw.clone();
        by_age.sort_by_key(|&(_, stamp)| std::cmp::Reverse(stamp));
        for &(idx, _) in by_age.iter().skip(self.max_raw) {
            state_mut(&mut self.chunks[idx]).raw = None;
            self.cache_unregister(idx);
        }
        self.chunks.shrink_to_fit();
    }

    //==============================================================================
    // Iteration
    //==============================================================================

    /// Visit `[first, last)` in index order. Stops early when `f` returns
    /// false; returns the number of elements visited before the stop.
    pub fn for_each<F: FnMut(&T) -> bool>(&self, first: usize, last: usize, mut f: F) -> usize {
        assert!(first <= last && last <= self.len, "invalid range");
        let ce = self.chunk_elems();
        let mut visited = 0usize;
        let mut i = first;
        while i < last {
            let idx = i / ce;
            let chunk_end = ((idx + 1) * ce).min(last);
            let guard = self.raw_read_guard(idx);
            let data = &guard.raw.as_ref().expect("latched raw context").data;
            for j in i..chunk_end {
                if !f(&data[j - idx * ce]) {
                    return visited;
                }
                visited += 1;
            }
            i = chunk_end;
        }
        visited
    }

    /// Mutable visit of `[first, last)`. Every touched chunk is marked
    /// dirty and loses its compressed image.
    pub fn for_each_mut<F: FnMut(&mut T) -> bool>(&mut self, first: usize, last: usize, mut f: F) -> usize {
        assert!(first <= last && last <= self.len, "invalid range");
        let ce = self.chunk_elems();
        let mut visited = 0usize;
        let mut i = first;
        while i < last {
            let idx = i / ce;
            let chunk_end = ((idx + 1) * ce).min(last);
            self.ensure_raw_mut(idx);
            self.evict_excess(idx);
            let st = state_mut(&mut self.chunks[idx]);
            st.compressed = None;
            let raw = st.raw.as_mut().expect("raw context just installed");
            raw.dirty = true;
            for j in i..chunk_end {
                if !f(&mut raw.data[j - idx * ce]) {
                    return visited;
                }
                visited += 1;
            }
            i = chunk_end;
        }
        visited
    }

    /// Copy all elements into a plain vector.
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        self.for_each(0, self.len, |&x| {
            out.push(x);
            true
        });
        out
    }

    /// Sort the elements (drain, sort, write back).
    pub fn sort_unstable(&mut self)
    where
        T: Ord,
    {
        let mut all = self.to_vec();
        all.sort_unstable();
        let mut it = all.into_iter();
        let len = self.len;
        self.for_each_mut(0, len, |x| {
            *x = it.next().expect("length unchanged");
            true
        });
    }

    //==============================================================================
    // Serialization
    //==============================================================================

    /// Serialize into a frame bit-exact to compressing the flat element
    /// bytes with this container's level and chunk size as a custom
    /// superblock size.
    pub fn serialize(&self) -> Result<Vec<u8>, StenosError> {
        let bpp = size_of::<T>();
        let chunk_bytes = self.chunk_bytes();

        let mut out = vec![0u8; 12];
        out[0] = 255;
        write_le_56(&mut out[1..], (self.len * bpp) as u64);
        write_le_32(&mut out[8..], chunk_bytes as u32);

        for idx in 0..self.chunks.len() {
            let chunk_len = self.chunk_len(idx);
            let guard = read_lock(&self.chunks[idx].state);
            let clean = guard.raw.as_ref().map_or(true, |r| !r.dirty);
            match (&guard.compressed, &guard.raw) {
                (Some(image), _) if clean => out.extend_from_slice(image),
                (_, Some(raw)) => {
                    let bytes: &[u8] = bytemuck::cast_slice(&raw.data[..chunk_len]);
                    let mut record = vec![0u8; bytes.len() + 4];
                    let produced = {
                        let mut ctx = lock(&self.ctx);
                        frame::compress_chunk(&mut ctx, bytes, bpp, chunk_bytes, &mut record)?
                    };
                    out.extend_from_slice(&record[..produced]);
                }
                _ => unreachable!("chunk with neither raw nor compressed state"),
            }
        }
        Ok(out)
    }

    /// Stream variant of [`serialize`](Self::serialize).
    pub fn serialize_into<W: std::io::Write>(&self, writer: &mut W) -> Result<usize, StenosError> {
        let frame = self.serialize()?;
        writer
            .write_all(&frame)
            .map_err(|e| StenosError::Io(e.to_string()))
            .map(|_| frame.len())
    }

    /// Replace the contents with a deserialized frame. The frame must carry
    /// this container's chunk byte size as its superblock size.
    pub fn deserialize(&mut self, src: &[u8]) -> Result<(), StenosError> {
        self.clear();

        let bpp = size_of::<T>();
        let (info, header_len) = frame::frame_info(src, bpp)?;
        if info.superblock_size != self.chunk_bytes() {
            return Err(StenosError::InvalidInput("superblock size does not match chunk size"));
        }
        if info.decompressed_size % bpp as u64 != 0 {
            return Err(StenosError::InvalidInput("length not a multiple of the element size"));
        }
        let total = (info.decompressed_size / bpp as u64) as usize;
        if total == 0 {
            return Ok(());
        }

        let ce = self.chunk_elems();
        let full_chunks = total / ce;
        let rem = total % ce;
        let mut pos = header_len;

        // Full chunks are re-admitted still compressed.
        for _ in 0..full_chunks {
            let record_len = frame::record_len(&src[pos..])?;
            if pos + record_len > src.len() {
                return Err(StenosError::SrcOverflow);
            }
            self.chunks.push(Chunk::from_compressed(src[pos..pos + record_len].into()));
            self.len += ce;
            pos += record_len;
        }

        // The tail chunk decompresses immediately; it has no full-chunk
        // image to keep.
        if rem > 0 {
            let record_len = frame::record_len(&src[pos..])?;
            if pos + record_len > src.len() {
                return Err(StenosError::SrcOverflow);
            }
            let mut data = vec![T::zeroed(); rem];
            let produced = {
                let mut ctx = lock(&self.ctx);
                frame::decompress_chunk(
                    &mut ctx,
                    &src[pos..pos + record_len],
                    bpp,
                    self.chunk_bytes(),
                    bytemuck::cast_slice_mut(&mut data),
                )?
            };
            if produced != rem * bpp {
                return Err(StenosError::InvalidInput("tail chunk size mismatch"));
            }
            let idx = self.chunks.len();
            self.chunks.push(Chunk::from_raw(RawChunk { data, dirty: true }));
            self.len += rem;
            self.cache_register(idx);
            self.evict_excess(idx);
        }
        Ok(())
    }

    //==============================================================================
    // Cache protocol
    //==============================================================================

    /// Shared access to a chunk's raw state, installing it if necessary.
    fn raw_read_guard(&self, idx: usize) -> RwLockReadGuard<'_, ChunkState<T>> {
        loop {
            {
                let guard = read_lock(&self.chunks[idx].state);
                if guard.raw.is_some() {
                    self.cache_touch(idx);
                    return guard;
                }
            }
            self.install_raw(idx);
        }
    }

    /// Decompress a chunk under its exclusive latch (shared-access path).
    fn install_raw(&self, idx: usize) {
        let chunk_len = self.chunk_len(idx);
        {
            let mut guard = self.chunks[idx].state.write().unwrap_or_else(|e| e.into_inner());
            if guard.raw.is_some() {
                return;
            }
            let image = guard.compressed.as_ref().expect("chunk with neither raw nor compressed state");
            let mut data = vec![T::zeroed(); chunk_len];
            let produced = {
                let mut ctx = lock(&self.ctx);
                frame::decompress_chunk(
                    &mut ctx,
                    image,
                    size_of::<T>(),
                    self.chunk_bytes(),
                    bytemuck::cast_slice_mut(&mut data),
                )
            }
            .expect("stenos cvec: chunk decompression failed");
            debug_assert_eq!(produced, chunk_len * size_of::<T>());
            guard.raw = Some(RawChunk { data, dirty: false });
        }
        self.cache_register(idx);
        self.evict_excess(idx);
    }

    /// Exclusive-access variant (`&mut self`): no latch traffic, no
    /// eviction. Callers evict once their references are settled.
    fn ensure_raw_mut(&mut self, idx: usize) {
        let chunk_len = self.chunk_len(idx);
        let chunk_bytes = self.chunk_bytes();
        let st = state_mut(&mut self.chunks[idx]);
        if st.raw.is_some() {
            return;
        }
        let image = st.compressed.as_ref().expect("chunk with neither raw nor compressed state");
        let mut data = vec![T::zeroed(); chunk_len];
        let produced = {
            let mut ctx = lock(&self.ctx);
            frame::decompress_chunk(
                &mut ctx,
                image,
                size_of::<T>(),
                chunk_bytes,
                bytemuck::cast_slice_mut(&mut data),
            )
        }
        .expect("stenos cvec: chunk decompression failed");
        debug_assert_eq!(produced, chunk_len * size_of::<T>());
        st.raw = Some(RawChunk { data, dirty: false });
        self.cache_register(idx);
    }

    /// Demote least-recently-used raw contexts until the cap holds, skipping
    /// `protect` and any chunk whose latch cannot be taken.
    fn evict_excess(&self, protect: usize) {
        let candidates: Vec<usize> = {
            let cache = lock(&self.cache);
            if cache.raw.len() <= self.max_raw {
                return;
            }
            let mut entries: Vec<(usize, u64)> =
                cache.raw.iter().copied().filter(|&(i, _)| i != protect).collect();
            entries.sort_by_key(|&(_, stamp)| stamp);
            entries.into_iter().map(|(i, _)| i).collect()
        };

        for idx in candidates {
            if lock(&self.cache).raw.len() <= self.max_raw {
                return;
            }
            if let Ok(mut guard) = self.chunks[idx].state.try_write() {
                if self.demote_locked(&mut guard, idx) {
                    self.cache_unregister(idx);
                    log::trace!("demoted raw chunk {}", idx);
                }
            }
            // A busy latch means active readers; move on to the next
            // candidate and tolerate exceeding the cap.
        }
    }

    /// Compress-and-drop one raw context (latch already held).
    fn demote_locked(&self, state: &mut ChunkState<T>, idx: usize) -> bool {
        let raw = match state.raw.take() {
            Some(raw) => raw,
            None => return false,
        };
        if state.compressed.is_none() || raw.dirty {
            let chunk_len = self.chunk_len(idx);
            let bytes: &[u8] = bytemuck::cast_slice(&raw.data[..chunk_len]);
            let mut record = vec![0u8; bytes.len() + 4];
            let produced = {
                let mut ctx = lock(&self.ctx);
                frame::compress_chunk(&mut ctx, bytes, size_of::<T>(), self.chunk_bytes(), &mut record)
            }
            .expect("stenos cvec: chunk compression failed with no recovery path");
            record.truncate(produced);
            state.compressed = Some(record.into_boxed_slice());
        }
        true
    }

    fn cache_register(&self, idx: usize) {
        let mut cache = lock(&self.cache);
        cache.clock += 1;
        let stamp = cache.clock;
        cache.raw.push((idx, stamp));
    }

    fn cache_unregister(&self, idx: usize) {
        lock(&self.cache).raw.retain(|&(i, _)| i != idx);
    }

    fn cache_touch(&self, idx: usize) {
        let mut cache = lock(&self.cache);
        cache.clock += 1;
        let stamp = cache.clock;
        if let Some(entry) = cache.raw.iter_mut().find(|(i, _)| *i == idx) {
            entry.1 = stamp;
        }
    }
}

//==================================================================================
// Reference proxies
//==================================================================================

/// Shared element reference holding the owning chunk's latch.
pub struct ElemRef<'a, T: Pod> {
    guard: RwLockReadGuard<'a, ChunkState<T>>,
    off: usize,
}

impl<T: Pod> ElemRef<'_, T> {
    pub fn get(&self) -> &T {
        &self.guard.raw.as_ref().expect("latched raw context").data[self.off]
    }
}

impl<T: Pod> std::ops::Deref for ElemRef<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.get()
    }
}

/// Mutable element reference. Creating one already marked the chunk dirty.
pub struct ElemRefMut<'a, T: Pod> {
    value: &'a mut T,
}

impl<T: Pod> ElemRefMut<'_, T> {
    pub fn get(&self) -> &T {
        self.value
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value
    }

    /// Move the value out (a byte copy for `Pod` elements).
    pub fn take(&mut self) -> T {
        *self.value
    }
}

impl<T: Pod> std::ops::Deref for ElemRefMut<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.value
    }
}

impl<T: Pod> std::ops::DerefMut for ElemRefMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value
    }
}
