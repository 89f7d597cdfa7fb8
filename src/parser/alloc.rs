use std::borrow::Cow;

use crate::error::{Error, Result};

/// Largest single allocation accepted while fuzzing.
#[cfg(feature = "hardened")]
pub(crate) const MAX_ALLOCATION: usize = 1 << 20;

/// Largest row length accepted while fuzzing.
#[cfg(feature = "hardened")]
pub(crate) const MAX_ROW_LEN: usize = 100 * 1024;

#[cfg(feature = "hardened")]
pub(crate) fn check_row_len(row_len: usize) -> Result<()> {
    if row_len > MAX_ROW_LEN {
        return Err(Error::Allocation {
            details: Cow::from(format!("row length {row_len} exceeds {MAX_ROW_LEN}")),
        });
    }
    Ok(())
}

#[cfg(not(feature = "hardened"))]
#[allow(clippy::unnecessary_wraps)]
pub(crate) const fn check_row_len(_row_len: usize) -> Result<()> {
    Ok(())
}

fn check_size(bytes: usize, what: &str) -> Result<()> {
    #[cfg(feature = "hardened")]
    if bytes > MAX_ALLOCATION {
        return Err(Error::Allocation {
            details: Cow::from(format!("{what} needs {bytes} bytes, cap is {MAX_ALLOCATION}")),
        });
    }
    let _ = (bytes, what);
    Ok(())
}

/// Allocates `len` copies of `value`, reporting failure instead of aborting.
pub(crate) fn try_vec<T: Clone>(len: usize, value: T, what: &str) -> Result<Vec<T>> {
    check_size(len.saturating_mul(size_of::<T>()), what)?;
    let mut vec = Vec::new();
    vec.try_reserve_exact(len).map_err(|err| Error::Allocation {
        details: Cow::from(format!("{what} of {len} elements: {err}")),
    })?;
    vec.resize(len, value);
    Ok(vec)
}

/// Copies `bytes` into a fresh allocation under the same rules as [`try_vec`].
pub(crate) fn try_copy(bytes: &[u8], what: &str) -> Result<Vec<u8>> {
    check_size(bytes.len(), what)?;
    let mut vec = Vec::new();
    vec.try_reserve_exact(bytes.len())
        .map_err(|err| Error::Allocation {
            details: Cow::from(format!("{what} of {} bytes: {err}", bytes.len())),
        })?;
    vec.extend_from_slice(bytes);
    Ok(vec)
}
