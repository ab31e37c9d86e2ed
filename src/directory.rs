//! Directory-level operations (spec §4.6, §4.7): `list`, `count`, `delete`,
//! and the name-matching scan shared with `open`. All linear scans of
//! `FILE_START_BLOCKS`, matching the "no in-memory directory" design note —
//! file metadata is never cached between calls.

use crate::{
    bitset, block,
    device::BlockDevice,
    error::{Error, Result},
    scanner, Filesystem,
};

impl<'a, D: BlockDevice> Filesystem<'a, D> {
    pub(crate) fn find_start_block(&mut self, name: &str) -> Result<Option<u32>, D::Error> {
        for i in 0..self.block_count {
            if !bitset::test(self.file_start, i) {
                continue;
            }
            self.device
                .read_block(i, self.block_buf)
                .map_err(Error::Device)?;
            let (found, _) = block::read_name::<D::Error>(self.block_buf)?;
            if found == name {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    pub fn count(&mut self) -> Result<u32, D::Error> {
        self.directory_preamble()?;
        Ok(self.file_count)
    }

    /// Invokes `callback` once per file, in start-block index order, with a
    /// name borrowed from the resident block buffer for the call only.
    /// The callback must not call back into the filesystem.
    pub fn list<F>(&mut self, mut callback: F) -> Result<(), D::Error>
    where
        F: FnMut(&str) -> Result<(), D::Error>,
    {
        self.directory_preamble()?;
        for i in 0..self.block_count {
            if !bitset::test(self.file_start, i) {
                continue;
            }
            self.device
                .read_block(i, self.block_buf)
                .map_err(Error::Device)?;
            let (name, _) = block::read_name::<D::Error>(self.block_buf)?;
            callback(name)?;
        }
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<(), D::Error> {
        self.directory_preamble()?;

        let max_len = self.block_size.checked_sub(17).ok_or(Error::BadBlockConfig)?;
        if name.is_empty() || name.len() > max_len {
            return Err(Error::FileNameBadLen);
        }

        let start = self.find_start_block(name)?.ok_or(Error::FileNotFound)?;
        self.device
            .read_block(start, self.block_buf)
            .map_err(Error::Device)?;
        let header = block::read_header::<D::Error>(self.block_buf)?;

        bitset::clear(self.file_start, start);
        if header.birthday == self.youngest {
            self.youngest -= 1;
        }

        match scanner::scan_chain(
            &mut self.device,
            self.block_buf,
            self.occupied,
            self.scratch1,
            self.block_count,
            start,
        ) {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.needs_remount = true;
                return Err(Error::InternalAssertion);
            }
            Err(e) => {
                self.needs_remount = true;
                return Err(e);
            }
        }
        bitset::and_not_into(self.occupied, self.scratch1);

        if let Err(e) = self.erase_with_readback(start) {
            self.needs_remount = true;
            return Err(e);
        }

        self.file_count -= 1;
        Ok(())
    }
}
