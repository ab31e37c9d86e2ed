//! A tiny, power-fail-tolerant file store over a fixed array of
//! equal-sized blocks — the kind of thing a NOR/EEPROM page array or a
//! RAM-backed simulation sits behind. Names are short NUL-terminated
//! strings; contents are arbitrary byte chains. No dynamic allocation: the
//! caller supplies the one-block I/O buffer and four scratch bitmaps up
//! front, the way `vsfs::FileSystem` is handed its backing store and
//! `aligned_aux_memory`-shaped storage at construction instead of growing
//! its own.
//!
//! There is no directory hierarchy, no wear leveling, and no concurrent
//! sessions — at most one file is open for read or write at a time.

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::unreachable
)]

#[cfg(any(feature = "std", test))]
extern crate std;

mod bitset;
mod block;
mod checksum;
mod device;
mod directory;
mod error;
mod guard;
mod mount;
mod scanner;
mod session;

use checksum::Checksum;

pub use device::BlockDevice;
#[cfg(any(feature = "std", test))]
pub use device::{FlakyDevice, FlakyDeviceError, RamDevice, RamDeviceError};
pub use error::{Error, Result};

/// Whether [`Filesystem::open`] is opening a file for reading or for a
/// fresh (overwriting) write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

#[derive(Clone, Copy)]
enum Mode {
    None,
    Read {
        block: u32,
        cursor: usize,
    },
    Write {
        block: u32,
        first_block: u32,
        cursor: usize,
        match_index: Option<u32>,
        checksum: Checksum,
    },
}

/// A mounted filesystem handle. Built once by [`mount`] and threaded
/// through every subsequent call; there is no module-level mutable state.
///
/// The resident footprint is exactly `block_size + 4 * ceil(block_count /
/// 8)` bytes, borrowed from the caller for the handle's lifetime — file
/// metadata is never cached beyond that, so every `open`/`list`/`delete`
/// re-reads the relevant start block from the device.
pub struct Filesystem<'a, D: BlockDevice> {
    device: D,
    block_size: usize,
    block_count: u32,
    block_buf: &'a mut [u8],
    file_start: &'a mut [u8],
    occupied: &'a mut [u8],
    scratch1: &'a mut [u8],
    scratch2: &'a mut [u8],
    youngest: u32,
    file_count: u32,
    needs_remount: bool,
    mode: Mode,
}

/// Mounts `device`, rebuilding the in-memory directory by scanning every
/// block as a candidate file start.
///
/// `aux` must be at least `device.block_size() + 4 * ceil(device.block_count()
/// / 8)` bytes: one block buffer plus four bitmaps (`FILE_START_BLOCKS`,
/// `OCCUPIED_BLOCKS`, and two scratch bitmaps used by the scanner).
///
/// A freshly zeroed device mounts as a valid, empty filesystem — every
/// candidate chain fails its checksum check and is skipped.
pub fn mount<D: BlockDevice>(mut device: D, aux: &mut [u8]) -> Result<Filesystem<'_, D>, D::Error> {
    let block_size = device.block_size();
    let block_count = device.block_count();
    if block_size < 18 || block_count < 1 {
        return Err(Error::BadBlockConfig);
    }

    let bitmap_len = bitset::byte_len(block_count);
    let needed = block_size
        .checked_add(4 * bitmap_len)
        .ok_or(Error::BadBlockConfig)?;
    if aux.len() < needed {
        return Err(Error::BadBlockConfig);
    }

    let (block_buf, rest) = aux.split_at_mut(block_size);
    let (file_start, rest) = rest.split_at_mut(bitmap_len);
    let (occupied, rest) = rest.split_at_mut(bitmap_len);
    let (scratch1, rest) = rest.split_at_mut(bitmap_len);
    let (scratch2, _unused) = rest.split_at_mut(bitmap_len);

    let state = mount::run(
        &mut device,
        block_buf,
        file_start,
        occupied,
        scratch1,
        scratch2,
        block_count,
    )?;

    Ok(Filesystem {
        device,
        block_size,
        block_count,
        block_buf,
        file_start,
        occupied,
        scratch1,
        scratch2,
        youngest: state.youngest,
        file_count: state.file_count,
        needs_remount: false,
        mode: Mode::None,
    })
}

impl<'a, D: BlockDevice> Filesystem<'a, D> {
    /// The highest `birthday` assigned so far, for callers that want to
    /// observe [property P4](crate) across a sequence of writes in tests.
    pub fn youngest(&self) -> u32 {
        self.youngest
    }
}
