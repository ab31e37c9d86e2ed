//! The chain scanner (spec §4.2): walks "next block" pointers from a
//! candidate start block, maintaining a running checksum and a scratch
//! bitmap of visited blocks, and reports the terminus or that the chain
//! is invalid.

use crate::{
    block, bitset,
    checksum::Checksum,
    device::BlockDevice,
    error::{Error, Result},
};

/// Scans the chain starting at `start`. Never marks `occupied` — only reads
/// it — and never visits more than `block_count` blocks, since every block
/// it visits gets marked in `scratch` first.
///
/// Returns `Ok(Some(terminus))` for a valid chain, `Ok(None)` for an invalid
/// one, and propagates device read failures.
#[allow(clippy::too_many_arguments)]
pub(crate) fn scan_chain<D: BlockDevice>(
    device: &mut D,
    block_buf: &mut [u8],
    occupied: &[u8],
    scratch: &mut [u8],
    block_count: u32,
    start: u32,
) -> Result<Option<u32>, D::Error> {
    bitset::zero(scratch);
    let mut running = Checksum::new();
    let mut cur = start;

    loop {
        device
            .read_block(cur, block_buf)
            .map_err(Error::Device)?;
        bitset::set(scratch, cur);

        let trailer = block::read_trailer::<D::Error>(block_buf)?;

        if trailer.is_last() {
            let len = block_buf.len();
            let covered = block_buf.get(..len.saturating_sub(4)).ok_or(Error::BadBlockConfig)?;
            running.update(covered);
            return Ok(if running.get() == trailer.next_or_checksum {
                Some(cur)
            } else {
                None
            });
        }

        let next = trailer.next_or_checksum;
        if next >= block_count || bitset::test(occupied, next) || bitset::test(scratch, next) {
            return Ok(None);
        }

        running.update(block_buf);
        cur = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RamDevice;

    fn block_size() -> usize {
        32
    }

    fn write_last_block(dev: &mut RamDevice, idx: u32, data: &[u8]) {
        let bs = dev.block_size();
        let mut buf = vec![0u8; bs];
        buf[0..data.len()].copy_from_slice(data);
        let unoccupied = (bs - 8 - data.len()) as i32;
        let mut running = Checksum::new();
        running.update(&buf[..bs - 4]);
        buf[bs - 8..bs - 4].copy_from_slice(&unoccupied.to_ne_bytes());
        buf[bs - 4..bs].copy_from_slice(&running.get().to_ne_bytes());
        dev.write_block(idx, &buf).unwrap();
    }

    #[test]
    fn single_block_chain_is_valid() {
        let mut dev = RamDevice::new(block_size(), 4);
        write_last_block(&mut dev, 0, b"hi");
        let bitmap_len = bitset::byte_len(4);
        let occupied = vec![0u8; bitmap_len];
        let mut scratch = vec![0u8; bitmap_len];
        let mut block_buf = vec![0u8; block_size()];

        let result =
            scan_chain(&mut dev, &mut block_buf, &occupied, &mut scratch, 4, 0).unwrap();
        assert_eq!(Some(0), result);
    }

    #[test]
    fn corrupted_checksum_is_invalid() {
        let mut dev = RamDevice::new(block_size(), 4);
        write_last_block(&mut dev, 0, b"hi");
        let mut corrupt = vec![0u8; block_size()];
        dev.read_block(0, &mut corrupt).unwrap();
        corrupt[0] ^= 0xff;
        dev.write_block(0, &corrupt).unwrap();

        let bitmap_len = bitset::byte_len(4);
        let occupied = vec![0u8; bitmap_len];
        let mut scratch = vec![0u8; bitmap_len];
        let mut block_buf = vec![0u8; block_size()];
        let result =
            scan_chain(&mut dev, &mut block_buf, &occupied, &mut scratch, 4, 0).unwrap();
        assert_eq!(None, result);
    }

    #[test]
    fn self_loop_is_invalid() {
        let mut dev = RamDevice::new(block_size(), 4);
        let bs = block_size();
        let mut buf = vec![0u8; bs];
        let not_last: i32 = -1;
        buf[bs - 8..bs - 4].copy_from_slice(&not_last.to_ne_bytes());
        buf[bs - 4..bs].copy_from_slice(&0u32.to_ne_bytes());
        dev.write_block(0, &buf).unwrap();

        let bitmap_len = bitset::byte_len(4);
        let occupied = vec![0u8; bitmap_len];
        let mut scratch = vec![0u8; bitmap_len];
        let mut block_buf = vec![0u8; bs];
        let result =
            scan_chain(&mut dev, &mut block_buf, &occupied, &mut scratch, 4, 0).unwrap();
        assert_eq!(None, result);
    }
}
