//! The read/write/close session state machine (spec §4.5). At most one
//! session is open at a time; its state lives in [`crate::Mode`].

use crate::{
    bitset, block,
    checksum::Checksum,
    device::BlockDevice,
    error::{Error, Result},
    scanner, Filesystem, Mode, OpenMode,
};

impl<'a, D: BlockDevice> Filesystem<'a, D> {
    fn first_free_block(&self) -> Option<u32> {
        (0..self.block_count).find(|&i| !bitset::test(self.occupied, i))
    }

    pub fn open(&mut self, name: &str, mode: OpenMode) -> Result<(), D::Error> {
        self.directory_preamble()?;

        let max_len = self
            .block_size
            .checked_sub(block::HEADER_OVERHEAD)
            .ok_or(Error::BadBlockConfig)?;
        if name.is_empty() || name.len() > max_len {
            return Err(Error::FileNameBadLen);
        }

        let found = self.find_start_block(name)?;

        match mode {
            OpenMode::Read => {
                let start = found.ok_or(Error::FileNotFound)?;
                self.device
                    .read_block(start, self.block_buf)
                    .map_err(Error::Device)?;
                let (_, data_start) = block::read_name::<D::Error>(self.block_buf)?;
                self.mode = Mode::Read {
                    block: start,
                    cursor: data_start,
                };
                Ok(())
            }
            OpenMode::Write => {
                let match_index = found;
                let chosen = self.first_free_block().ok_or(Error::NoSpace)?;
                bitset::set(self.occupied, chosen);
                bitset::set(self.file_start, chosen);

                if self.youngest == u32::MAX {
                    self.needs_remount = true;
                    return Err(Error::BirthdayLimitReached);
                }
                self.youngest += 1;

                let prefer = match match_index {
                    Some(i) => i as i32,
                    None => -1,
                };
                let end =
                    block::write_start_header::<D::Error>(self.block_buf, self.youngest, prefer, name)?;
                let mut checksum = Checksum::new();
                checksum.update(&self.block_buf[..end]);

                self.mode = Mode::Write {
                    block: chosen,
                    first_block: chosen,
                    cursor: end,
                    match_index,
                    checksum,
                };
                Ok(())
            }
        }
    }

    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize, D::Error> {
        self.session_preamble()?;
        let (mut block, mut cursor) = match self.mode {
            Mode::Read { block, cursor } => (block, cursor),
            _ => return Err(Error::WrongMode),
        };

        let mut produced = 0usize;
        while produced < dst.len() {
            let trailer = block::read_trailer::<D::Error>(self.block_buf)?;
            let unoccupied = if trailer.is_last() {
                trailer.unoccupied_data_bytes as usize
            } else {
                0
            };
            let remaining = self
                .block_size
                .checked_sub(cursor + unoccupied + 8)
                .ok_or(Error::InternalAssertion)?;

            if remaining == 0 {
                if trailer.is_last() {
                    break;
                }
                let next = trailer.next_or_checksum;
                if let Err(e) = self.device.read_block(next, self.block_buf) {
                    self.mode = Mode::None;
                    return Err(Error::Device(e));
                }
                block = next;
                cursor = 0;
                continue;
            }

            let n = remaining.min(dst.len() - produced);
            dst[produced..produced + n].copy_from_slice(&self.block_buf[cursor..cursor + n]);
            cursor += n;
            produced += n;
        }

        self.mode = Mode::Read { block, cursor };
        Ok(produced)
    }

    pub fn write(&mut self, src: &[u8]) -> Result<usize, D::Error> {
        self.session_preamble()?;
        let (mut block, first_block, mut cursor, match_index, mut checksum) = match self.mode {
            Mode::Write {
                block,
                first_block,
                cursor,
                match_index,
                checksum,
            } => (block, first_block, cursor, match_index, checksum),
            _ => return Err(Error::WrongMode),
        };

        let mut src_off = 0usize;
        while src_off < src.len() {
            let remaining = self
                .block_size
                .checked_sub(cursor + 8)
                .ok_or(Error::InternalAssertion)?;

            if remaining == 0 {
                let new_block = match self.first_free_block() {
                    Some(b) => b,
                    None => {
                        self.needs_remount = true;
                        self.mode = Mode::None;
                        return Err(Error::NoSpace);
                    }
                };
                bitset::set(self.occupied, new_block);

                block::write_trailer::<D::Error>(
                    self.block_buf,
                    block::Trailer {
                        unoccupied_data_bytes: -1,
                        next_or_checksum: new_block,
                    },
                )?;
                let tail_start = self.block_size - 8;
                checksum.update(&self.block_buf[tail_start..self.block_size]);

                if let Err(e) = self.device.write_block(block, self.block_buf) {
                    self.needs_remount = true;
                    self.mode = Mode::None;
                    return Err(Error::Device(e));
                }

                block = new_block;
                cursor = 0;
                continue;
            }

            let n = remaining.min(src.len() - src_off);
            self.block_buf[cursor..cursor + n].copy_from_slice(&src[src_off..src_off + n]);
            checksum.update(&src[src_off..src_off + n]);
            cursor += n;
            src_off += n;
        }

        self.mode = Mode::Write {
            block,
            first_block,
            cursor,
            match_index,
            checksum,
        };
        Ok(src.len())
    }

    pub fn close(&mut self) -> Result<(), D::Error> {
        self.session_preamble()?;
        match self.mode {
            Mode::None => Err(Error::WrongMode),
            Mode::Read { .. } => {
                self.mode = Mode::None;
                Ok(())
            }
            Mode::Write {
                block,
                first_block,
                cursor,
                match_index,
                mut checksum,
            } => {
                let fill_end = self.block_size - 8;
                let unoccupied = fill_end.checked_sub(cursor).ok_or(Error::InternalAssertion)?;
                self.block_buf[cursor..fill_end].fill(0xFF);
                let unoccupied_i32 = i32::try_from(unoccupied).map_err(|_| Error::InternalAssertion)?;
                self.block_buf[fill_end..fill_end + 4].copy_from_slice(&unoccupied_i32.to_ne_bytes());

                checksum.update(&self.block_buf[cursor..fill_end + 4]);
                let final_checksum = checksum.get();
                self.block_buf[fill_end + 4..self.block_size].copy_from_slice(&final_checksum.to_ne_bytes());

                if let Err(e) = self.device.write_block(block, self.block_buf) {
                    self.needs_remount = true;
                    self.mode = Mode::None;
                    return Err(Error::Device(e));
                }

                match scanner::scan_chain(
                    &mut self.device,
                    self.block_buf,
                    self.occupied,
                    self.scratch1,
                    self.block_count,
                    first_block,
                ) {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        self.needs_remount = true;
                        self.mode = Mode::None;
                        return Err(Error::InternalAssertion);
                    }
                    Err(e) => {
                        self.needs_remount = true;
                        self.mode = Mode::None;
                        return Err(e);
                    }
                }

                if let Some(victim) = match_index {
                    bitset::clear(self.file_start, victim);
                    match scanner::scan_chain(
                        &mut self.device,
                        self.block_buf,
                        self.occupied,
                        self.scratch1,
                        self.block_count,
                        victim,
                    ) {
                        Ok(Some(_)) => {}
                        Ok(None) => {
                            self.needs_remount = true;
                            self.mode = Mode::None;
                            return Err(Error::InternalAssertion);
                        }
                        Err(e) => {
                            self.needs_remount = true;
                            self.mode = Mode::None;
                            return Err(e);
                        }
                    }
                    bitset::and_not_into(self.occupied, self.scratch1);

                    if let Err(e) = self.erase_with_readback(victim) {
                        self.needs_remount = true;
                        self.mode = Mode::None;
                        return Err(e);
                    }
                } else {
                    self.file_count += 1;
                }

                self.mode = Mode::None;
                Ok(())
            }
        }
    }

    /// Overwrites `index` with `0xFF` and verifies the readback, as the
    /// atomic-replace commit point of `close` and of `delete` both require.
    pub(crate) fn erase_with_readback(&mut self, index: u32) -> Result<(), D::Error> {
        self.block_buf.fill(0xFF);
        self.device
            .write_block(index, self.block_buf)
            .map_err(Error::Device)?;
        self.device
            .read_block(index, self.block_buf)
            .map_err(Error::Device)?;
        if self.block_buf.iter().any(|&b| b != 0xFF) {
            return Err(Error::Readback);
        }
        Ok(())
    }
}
