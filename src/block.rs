//! On-media block layout (spec §3): a fixed-size region whose last 8 bytes
//! are always the trailer, and whose first 8 bytes additionally carry a
//! header when the block starts a chain. Parsed with `zerocopy`, the way
//! `vsfs.old/physical.rs`'s `PhysicalINode`/`PhysicalSuperBlock` are, rather
//! than by hand-rolled `memcpy` offsets like `original_source/mcp_fs.c`.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

pub(crate) const TRAILER_SIZE: usize = 8;
pub(crate) const HEADER_SIZE: usize = 8;

/// Minimum viable block: header (8) + one name byte + NUL (1) + trailer (8).
pub(crate) const HEADER_OVERHEAD: usize = 18;

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub(crate) struct Trailer {
    /// Negative: not the last block of its chain, this field is unused.
    /// Zero or positive: last block, count of trailing unused data bytes.
    pub unoccupied_data_bytes: i32,
    /// Not-last: index of the next block. Last: expected chain checksum.
    pub next_or_checksum: u32,
}

impl Trailer {
    pub(crate) fn is_last(&self) -> bool {
        self.unoccupied_data_bytes >= 0
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub(crate) struct Header {
    pub birthday: u32,
    pub prefer_if_older: i32,
}

pub(crate) fn read_trailer<E>(block: &[u8]) -> Result<Trailer, E> {
    let len = block.len();
    let start = len.checked_sub(TRAILER_SIZE).ok_or(Error::BadBlockConfig)?;
    let bytes = block.get(start..len).ok_or(Error::BadBlockConfig)?;
    Trailer::read_from_bytes(bytes).map_err(|_| Error::InternalAssertion)
}

pub(crate) fn write_trailer<E>(block: &mut [u8], trailer: Trailer) -> Result<(), E> {
    let len = block.len();
    let start = len.checked_sub(TRAILER_SIZE).ok_or(Error::BadBlockConfig)?;
    let bytes = block.get_mut(start..len).ok_or(Error::BadBlockConfig)?;
    trailer.write_to(bytes).map_err(|_| Error::InternalAssertion)
}

pub(crate) fn read_header<E>(block: &[u8]) -> Result<Header, E> {
    let bytes = block.get(0..HEADER_SIZE).ok_or(Error::BadBlockConfig)?;
    Header::read_from_bytes(bytes).map_err(|_| Error::InternalAssertion)
}

pub(crate) fn write_header<E>(block: &mut [u8], header: Header) -> Result<(), E> {
    let bytes = block.get_mut(0..HEADER_SIZE).ok_or(Error::BadBlockConfig)?;
    header.write_to(bytes).map_err(|_| Error::InternalAssertion)
}

/// Offset of the first byte after the header, where the name begins.
pub(crate) const NAME_OFFSET: usize = HEADER_SIZE;

/// Read the NUL-terminated name starting at [`NAME_OFFSET`], returning the
/// name bytes (excluding the NUL) and the offset of the byte following it.
pub(crate) fn read_name<E>(block: &[u8]) -> Result<(&str, usize), E> {
    let rest = block.get(NAME_OFFSET..).ok_or(Error::InternalAssertion)?;
    let nul_at = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::InternalAssertion)?;
    let name_bytes = rest.get(0..nul_at).ok_or(Error::InternalAssertion)?;
    let name = core::str::from_utf8(name_bytes).map_err(|_| Error::InternalAssertion)?;
    Ok((name, NAME_OFFSET + nul_at + 1))
}

/// Write `birthday`, `prefer_if_older`, and `name\0` starting at offset 0,
/// returning the offset of the first free data byte.
pub(crate) fn write_start_header<E>(
    block: &mut [u8],
    birthday: u32,
    prefer_if_older: i32,
    name: &str,
) -> Result<usize, E> {
    write_header(
        block,
        Header {
            birthday,
            prefer_if_older,
        },
    )?;
    let name_bytes = name.as_bytes();
    let end = NAME_OFFSET + name_bytes.len();
    let dst = block
        .get_mut(NAME_OFFSET..end)
        .ok_or(Error::FileNameBadLen)?;
    dst.copy_from_slice(name_bytes);
    let nul = block.get_mut(end).ok_or(Error::FileNameBadLen)?;
    *nul = 0;
    Ok(end + 1)
}
