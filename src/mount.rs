//! The mounter (spec §4.3): scans every block as a candidate file start,
//! arbitrates between a chain and the "victim" its `prefer_if_older` names,
//! and publishes the winning set into the caller's bitmaps.

use crate::{
    bitset, block,
    device::BlockDevice,
    error::{Error, Result},
    scanner,
};

pub(crate) struct MountState {
    pub(crate) youngest: u32,
    pub(crate) file_count: u32,
}

/// Rebuilds `file_start`/`occupied` from media and returns the recovered
/// `youngest`/`file_count`. Used both by the public `mount` entry point and
/// by the mount-health guard's remount-in-place recovery.
///
/// Runs in two passes over the same four caller-supplied bitmaps rather than
/// one, so that a replacement and the victim its `prefer_if_older` names
/// resolve to exactly one winner regardless of which of the two block
/// indices the outer loop would reach first:
///
/// - Pass 1 finds every candidate's rival (if it names one) and records
///   whichever of the pair loses the birthday comparison. `file_start` is
///   repurposed to hold that defeated-index set and `occupied` to hold the
///   union of every structurally valid chain seen so far, purely so the
///   scanner's own cross-chain-overlap check has something to check
///   against; neither bitmap holds its real meaning yet.
/// - Pass 2 rebuilds `file_start`/`occupied` with their real meaning,
///   skipping anything pass 1 marked defeated before even scanning it.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run<D: BlockDevice>(
    device: &mut D,
    block_buf: &mut [u8],
    file_start: &mut [u8],
    occupied: &mut [u8],
    scratch1: &mut [u8],
    scratch2: &mut [u8],
    block_count: u32,
) -> Result<MountState, D::Error> {
    bitset::zero(file_start);
    bitset::zero(occupied);

    for i in 0..block_count {
        if scanner::scan_chain(device, block_buf, occupied, scratch1, block_count, i)?.is_none() {
            continue;
        }
        bitset::or_into(occupied, scratch1);

        device.read_block(i, block_buf).map_err(Error::Device)?;
        let header = block::read_header::<D::Error>(block_buf)?;
        let birthday_this = header.birthday;
        let prefer = header.prefer_if_older;
        if prefer < 0 {
            continue;
        }

        let prefer_idx = prefer as u32;
        if scanner::scan_chain(device, block_buf, occupied, scratch2, block_count, prefer_idx)?.is_some() {
            device.read_block(prefer_idx, block_buf).map_err(Error::Device)?;
            let other = block::read_header::<D::Error>(block_buf)?;
            if other.birthday <= birthday_this {
                bitset::set(file_start, prefer_idx);
            } else {
                bitset::set(file_start, i);
            }
        }
    }

    // `file_start` now holds the defeated set; move it into `scratch2` so
    // `file_start` can be reset to its real meaning for pass 2.
    bitset::zero(scratch2);
    bitset::or_into(scratch2, file_start);
    bitset::zero(file_start);
    bitset::zero(occupied);

    let mut youngest = 0u32;
    let mut file_count = 0u32;

    for i in 0..block_count {
        if bitset::test(scratch2, i) {
            continue;
        }
        if scanner::scan_chain(device, block_buf, occupied, scratch1, block_count, i)?.is_none() {
            continue;
        }

        device.read_block(i, block_buf).map_err(Error::Device)?;
        let header = block::read_header::<D::Error>(block_buf)?;

        bitset::set(file_start, i);
        bitset::or_into(occupied, scratch1);
        file_count += 1;
        youngest = youngest.max(header.birthday);
    }

    Ok(MountState { youngest, file_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{checksum::Checksum, device::RamDevice};

    const BLOCK_SIZE: usize = 32;

    fn write_single_block_file(dev: &mut RamDevice, idx: u32, name: &str, birthday: u32, prefer_if_older: i32) {
        let mut buf = vec![0u8; BLOCK_SIZE];
        let end = block::write_start_header::<()>(&mut buf, birthday, prefer_if_older, name).unwrap();
        let unoccupied = (BLOCK_SIZE - 8 - end) as i32;
        let mut running = Checksum::new();
        running.update(&buf[..BLOCK_SIZE - 4]);
        buf[BLOCK_SIZE - 8..BLOCK_SIZE - 4].copy_from_slice(&unoccupied.to_ne_bytes());
        buf[BLOCK_SIZE - 4..BLOCK_SIZE].copy_from_slice(&running.get().to_ne_bytes());
        dev.write_block(idx, &buf).unwrap();
    }

    #[test]
    fn empty_media_mounts_to_zero_files() {
        let mut dev = RamDevice::new(BLOCK_SIZE, 4);
        let bitmap_len = bitset::byte_len(4);
        let mut file_start = vec![0u8; bitmap_len];
        let mut occupied = vec![0u8; bitmap_len];
        let mut scratch1 = vec![0u8; bitmap_len];
        let mut scratch2 = vec![0u8; bitmap_len];
        let mut block_buf = vec![0u8; BLOCK_SIZE];

        let state = run(
            &mut dev,
            &mut block_buf,
            &mut file_start,
            &mut occupied,
            &mut scratch1,
            &mut scratch2,
            4,
        )
        .unwrap();
        assert_eq!(0, state.file_count);
    }

    #[test]
    fn younger_replacement_wins_over_its_victim() {
        let mut dev = RamDevice::new(BLOCK_SIZE, 4);
        write_single_block_file(&mut dev, 0, "one", 1, -1);
        write_single_block_file(&mut dev, 1, "one", 2, 0);

        let bitmap_len = bitset::byte_len(4);
        let mut file_start = vec![0u8; bitmap_len];
        let mut occupied = vec![0u8; bitmap_len];
        let mut scratch1 = vec![0u8; bitmap_len];
        let mut scratch2 = vec![0u8; bitmap_len];
        let mut block_buf = vec![0u8; BLOCK_SIZE];

        let state = run(
            &mut dev,
            &mut block_buf,
            &mut file_start,
            &mut occupied,
            &mut scratch1,
            &mut scratch2,
            4,
        )
        .unwrap();
        assert_eq!(1, state.file_count);
        assert_eq!(2, state.youngest);
        assert!(bitset::test(&file_start, 1));
        assert!(!bitset::test(&file_start, 0));
    }

    #[test]
    fn younger_replacement_at_a_lower_index_still_wins() {
        // The victim occupies the higher index here (as it would once a
        // lower block has been freed and reused for the replacement before
        // the victim itself is ever erased) — the ordering the retroactive
        // single-pass fix used to get wrong.
        let mut dev = RamDevice::new(BLOCK_SIZE, 4);
        write_single_block_file(&mut dev, 0, "one", 2, 1);
        write_single_block_file(&mut dev, 1, "one", 1, -1);

        let bitmap_len = bitset::byte_len(4);
        let mut file_start = vec![0u8; bitmap_len];
        let mut occupied = vec![0u8; bitmap_len];
        let mut scratch1 = vec![0u8; bitmap_len];
        let mut scratch2 = vec![0u8; bitmap_len];
        let mut block_buf = vec![0u8; BLOCK_SIZE];

        let state = run(
            &mut dev,
            &mut block_buf,
            &mut file_start,
            &mut occupied,
            &mut scratch1,
            &mut scratch2,
            4,
        )
        .unwrap();
        assert_eq!(1, state.file_count);
        assert_eq!(2, state.youngest);
        assert!(bitset::test(&file_start, 0));
        assert!(!bitset::test(&file_start, 1));
    }
}
