use core::result;

/// A specialized [`Result`] type for `xtree` operations.
///
/// This type is broadly used across `xtree` for any operation which may
/// produce an error.
pub type Result<T> = result::Result<T, Error>;

/// A list specifying general categories of errors.
///
/// This list is intended to grow over time and it is not recommended to
/// exhaustively match against it.
///
/// Most failures that occur *inside* a build (a degenerate QEF, an unsafe
/// interval evaluation, a user-requested abort) are absorbed into tree state
/// rather than surfaced here — see the module docs on [`crate::tree`] for the
/// policy. Only pre-conditions and allocation failures reach this type.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum Error {
    /// `lower > upper` on some axis, or `min_feature <= 0.0`.
    InvalidRegion,
    /// An object pool could not allocate more storage.
    ResourceExhaustion,
    /// `N` is not one of the dimensions this kernel is monomorphized for (2
    /// or 3).
    UnsupportedDimension,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::InvalidRegion => {
                "region bounds are inverted, or min_feature is not positive"
            }
            Error::ResourceExhaustion => "object pool allocation failed",
            Error::UnsupportedDimension => "unsupported dimension N",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}
