// Layout conformance tests for the region header.
// Every attached process reinterprets the same bytes, so sizes, alignments,
// and field offsets must be what the creator wrote. These tests also print
// the observed values to aid debugging when a platform disagrees.

use memoffset::offset_of;
use shmring::core::sync::{SyncCell, SYNC_CELL_SIZE};
use shmring::queue::layout::{header_size, QueueHeader};
use std::mem::{align_of, size_of};

#[test]
fn sync_cell_layout() {
    assert_eq!(size_of::<SyncCell>(), SYNC_CELL_SIZE);
    assert_eq!(align_of::<SyncCell>(), 64);

    // Both backends must fit their primitives inside one cell.
    #[cfg(target_os = "linux")]
    {
        assert!(size_of::<libc::pthread_mutex_t>() <= SYNC_CELL_SIZE);
        assert!(size_of::<libc::pthread_cond_t>() <= SYNC_CELL_SIZE);
    }
}

#[test]
fn header_layout() {
    let size = size_of::<QueueHeader>();
    let align = align_of::<QueueHeader>();
    let off_magic = offset_of!(QueueHeader, magic);
    let off_version = offset_of!(QueueHeader, version);
    let off_sync_kind = offset_of!(QueueHeader, sync_kind);
    let off_capacity = offset_of!(QueueHeader, capacity);
    let off_lock = offset_of!(QueueHeader, lock);
    let off_not_empty = offset_of!(QueueHeader, not_empty);
    let off_not_full = offset_of!(QueueHeader, not_full);
    let off_head = offset_of!(QueueHeader, head);
    let off_tail = offset_of!(QueueHeader, tail);

    println!(
        "QueueHeader => size: {size}, align: {align}, offsets: [magic:{off_magic}, version:{off_version}, sync_kind:{off_sync_kind}, capacity:{off_capacity}, lock:{off_lock}, not_empty:{off_not_empty}, not_full:{off_not_full}, head:{off_head}, tail:{off_tail}]"
    );

    assert_eq!(align, 128);
    assert_eq!(size % 128, 0);
    assert_eq!(size, header_size());

    // Scalar prefix is packed in declaration order.
    assert_eq!(off_magic, 0);
    assert_eq!(off_version, 8);
    assert_eq!(off_sync_kind, 12);
    assert_eq!(off_capacity, 16);

    // The three cells sit on consecutive 64-byte slots.
    assert_eq!(off_lock % 64, 0);
    assert_eq!(off_not_empty, off_lock + SYNC_CELL_SIZE);
    assert_eq!(off_not_full, off_not_empty + SYNC_CELL_SIZE);

    // Cursors are cache padded and must not share a line with the cells or
    // each other.
    assert!(off_head >= off_not_full + SYNC_CELL_SIZE);
    assert!(off_tail - off_head >= 64);
    assert!(size - off_tail >= 8);
}
