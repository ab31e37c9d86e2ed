/// Errors produced by this crate.
///
/// `E` is the error type of the caller-supplied [`crate::BlockDevice`]; a
/// device fault is propagated verbatim through [`Error::Device`], matching
/// the "propagated ... except where policy dictates otherwise" contract.
#[derive(Debug)]
pub enum Error<E> {
    /// `block_size < 18` or `block_count < 1` at mount.
    BadBlockConfig,
    /// Operation not allowed in the current session state, or a remount is pending.
    WrongMode,
    /// No accepted chain matches the requested name.
    FileNotFound,
    /// No block has its `OccupiedBlocks` bit clear.
    NoSpace,
    /// Name length is zero or exceeds the mode-specific bound.
    FileNameBadLen,
    /// An invariant believed to hold was violated.
    InternalAssertion,
    /// Erase verification read back bytes other than `0xFF`.
    Readback,
    /// `youngest` was already at `u32::MAX` at open-for-write.
    BirthdayLimitReached,
    /// The block device reported a fault.
    Device(E),
}

pub type Result<T, E> = core::result::Result<T, Error<E>>;

#[cfg(feature = "std")]
impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::write!(f, "{self:?}")
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Debug> std::error::Error for Error<E> {}
