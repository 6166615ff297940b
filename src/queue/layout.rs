use crossbeam_utils::CachePadded;
use std::sync::atomic::AtomicU64;

use crate::core::sync::SyncCell;

/// Identifies a region as one of ours. Spells "SHMRING1".
pub const QUEUE_MAGIC: u64 = 0x53484D_52494E47_31;

/// Bumped whenever the header layout changes; attach rejects a mismatch.
pub const LAYOUT_VERSION: u32 = 1;

/// Smallest usable ring: one byte of reserve plus room for a couple of
/// prefix-only frames. Anything below this is a configuration mistake.
pub const MIN_CAPACITY: usize = 16;

/// Fixed-layout control block at offset 0 of the shared region.
///
/// `#[repr(C)]` keeps the layout identical in every attached process. The
/// remainder of the region, `capacity` bytes starting at `header_size()`,
/// is the ring byte array.
///
/// ### Invariants
/// - `0 <= head < capacity` and `0 <= tail < capacity`.
/// - The ring is empty iff `head == tail`; one ring byte is never written,
///   so a full ring never collapses into the empty state.
/// - `head`, `tail`, and ring bytes are only touched while `lock` is held.
///   Exactly one reader advances `head` and one writer advances `tail`.
#[repr(C, align(128))]
pub struct QueueHeader {
    /// Region discriminator, `QUEUE_MAGIC` once initialized.
    pub magic: u64,

    /// Header layout version.
    pub version: u32,

    /// Raw `SyncKind` of the backend that initialized the cells below.
    pub sync_kind: u32,

    /// Usable ring bytes: region size minus this header.
    pub capacity: u64,

    /// Cross-process mutual exclusion for the whole region.
    pub lock: SyncCell,

    /// Signaled after a frame is written; consumers wait here while empty.
    pub not_empty: SyncCell,

    /// Signaled after a frame is consumed; producers wait here while full.
    pub not_full: SyncCell,

    /// Byte offset of the next unread byte. Reader-owned, lock-guarded.
    /// Atomic so concurrent mappings have defined accesses; padded against
    /// false sharing with `tail` (same treatment either side of the lock).
    pub head: CachePadded<AtomicU64>,

    /// Byte offset of the next write position. Writer-owned, lock-guarded.
    pub tail: CachePadded<AtomicU64>,
}

/// Bytes the header occupies at the start of the region.
pub const fn header_size() -> usize {
    std::mem::size_of::<QueueHeader>()
}
