/// The synchronous block I/O capability the filesystem is built on.
///
/// Implementations own the physical medium; the filesystem never holds
/// persistent state beyond what `mount` rebuilds, so every call here is
/// expected to be durable by the time it returns success (spec §5,
/// "Ordering guarantees").
pub trait BlockDevice {
    /// Device-defined fault type, propagated verbatim via [`crate::Error::Device`].
    type Error;

    fn block_size(&self) -> usize;
    fn block_count(&self) -> u32;

    /// Read block `index` into `dst`. `dst.len() == block_size()`.
    fn read_block(&mut self, index: u32, dst: &mut [u8]) -> Result<(), Self::Error>;

    /// Write `src` to block `index`. `src.len() == block_size()`.
    fn write_block(&mut self, index: u32, src: &[u8]) -> Result<(), Self::Error>;
}

/// An in-memory block device, used by this crate's own tests and available
/// to callers for host-side testing against the real mount/session logic
/// without real media. Grounded on `ext4::source::FileExt4Source` and
/// `io::Cursor` in the teacher repo, which play the same role for their
/// respective filesystems.
#[cfg(any(feature = "std", test))]
pub struct RamDevice {
    block_size: usize,
    blocks: std::vec::Vec<std::vec::Vec<u8>>,
}

#[cfg(any(feature = "std", test))]
impl RamDevice {
    pub fn new(block_size: usize, block_count: u32) -> Self {
        Self {
            block_size,
            blocks: std::vec![std::vec![0u8; block_size]; block_count as usize],
        }
    }
}

#[cfg(any(feature = "std", test))]
#[derive(Debug)]
pub enum RamDeviceError {
    OutOfRange,
}

#[cfg(any(feature = "std", test))]
impl BlockDevice for RamDevice {
    type Error = RamDeviceError;

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u32 {
        self.blocks.len() as u32
    }

    fn read_block(&mut self, index: u32, dst: &mut [u8]) -> Result<(), Self::Error> {
        let block = self
            .blocks
            .get(index as usize)
            .ok_or(RamDeviceError::OutOfRange)?;
        dst.copy_from_slice(block);
        Ok(())
    }

    fn write_block(&mut self, index: u32, src: &[u8]) -> Result<(), Self::Error> {
        let block = self
            .blocks
            .get_mut(index as usize)
            .ok_or(RamDeviceError::OutOfRange)?;
        block.copy_from_slice(src);
        Ok(())
    }
}

/// Wraps another device and fails `write_block` once a chosen call count is
/// reached, used to simulate a power cut mid-commit for the crash-recovery
/// tests in spec §8 (R3, scenario 5).
#[cfg(any(feature = "std", test))]
pub struct FlakyDevice<D> {
    inner: D,
    writes_before_failure: Option<usize>,
    write_calls: usize,
}

#[cfg(any(feature = "std", test))]
impl<D> FlakyDevice<D> {
    pub fn new(inner: D, writes_before_failure: usize) -> Self {
        Self {
            inner,
            writes_before_failure: Some(writes_before_failure),
            write_calls: 0,
        }
    }
}

#[cfg(any(feature = "std", test))]
#[derive(Debug)]
pub enum FlakyDeviceError<E> {
    Inner(E),
    SimulatedFailure,
}

#[cfg(any(feature = "std", test))]
impl<D: BlockDevice> BlockDevice for FlakyDevice<D> {
    type Error = FlakyDeviceError<D::Error>;

    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn block_count(&self) -> u32 {
        self.inner.block_count()
    }

    fn read_block(&mut self, index: u32, dst: &mut [u8]) -> Result<(), Self::Error> {
        self.inner
            .read_block(index, dst)
            .map_err(FlakyDeviceError::Inner)
    }

    fn write_block(&mut self, index: u32, src: &[u8]) -> Result<(), Self::Error> {
        if let Some(budget) = self.writes_before_failure {
            if self.write_calls >= budget {
                return Err(FlakyDeviceError::SimulatedFailure);
            }
        }
        self.write_calls += 1;
        self.inner
            .write_block(index, src)
            .map_err(FlakyDeviceError::Inner)
    }
}
