use std::borrow::Cow;
use std::fmt;
use std::io;

/// Result type used across the decoder.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type surfaced by `init`, `parse` and the row helpers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure while a page source was reading from its backing store.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Failure to convert column bytes from the file's character encoding.
    #[error("encoding conversion from {encoding} failed: {details}")]
    Encoding {
        encoding: Cow<'static, str>,
        details: Cow<'static, str>,
    },

    /// The byte stream is truncated, inconsistent or otherwise malformed.
    #[error("corrupted SAS file while processing {section}: {details}")]
    Corrupted {
        section: Section,
        details: Cow<'static, str>,
    },

    /// The caller broke the configuration or paging contract.
    #[error("invalid argument: {details}")]
    InvalidArgument { details: Cow<'static, str> },

    /// Values that cannot be represented on this platform.
    #[error("unsupported SAS feature: {feature}")]
    Unsupported { feature: Cow<'static, str> },

    /// Failed to allocate scratch or metadata buffers.
    #[error("allocation failed: {details}")]
    Allocation { details: Cow<'static, str> },
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    ContractViolation,
    ResourceExhausted,
    Io,
    Encoding,
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::Encoding { .. } => ErrorKind::Encoding,
            Self::Corrupted { .. } | Self::Unsupported { .. } => ErrorKind::MalformedInput,
            Self::InvalidArgument { .. } => ErrorKind::ContractViolation,
            Self::Allocation { .. } => ErrorKind::ResourceExhausted,
        }
    }

    pub(crate) fn corrupted(section: Section, details: impl Into<Cow<'static, str>>) -> Self {
        Self::Corrupted {
            section,
            details: details.into(),
        }
    }

    pub(crate) fn invalid_argument(details: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidArgument {
            details: details.into(),
        }
    }
}

/// Logical section of the decoder used for diagnostic reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    /// Column metadata as a whole (missing or inconsistent subheaders).
    Metadata,
    Page { index: usize },
    Subheader { page_index: usize, signature: u32 },
    Row { index: u64 },
    Column { index: usize },
    Decompression { page_index: usize },
}

impl Section {
    #[must_use]
    pub const fn subheader(page_index: usize, signature: u32) -> Self {
        Self::Subheader {
            page_index,
            signature,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "file header"),
            Self::Metadata => write!(f, "column metadata"),
            Self::Page { index } => write!(f, "page {index}"),
            Self::Subheader {
                page_index,
                signature,
            } => write!(
                f,
                "subheader signature 0x{signature:08X} on page {page_index}"
            ),
            Self::Row { index } => write!(f, "row {index}"),
            Self::Column { index } => write!(f, "column {index}"),
            Self::Decompression { page_index } => {
                write!(f, "page {page_index} during decompression")
            }
        }
    }
}
