use crate::metadata::ColumnFormat;

/// Forces the format (and optionally the byte length) of every column whose
/// name contains `column_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOverride {
    pub column_name: String,
    pub format: ColumnFormat,
    pub len: Option<usize>,
}

impl FormatOverride {
    #[must_use]
    pub fn new(column_name: impl Into<String>, format: ColumnFormat) -> Self {
        Self {
            column_name: column_name.into(),
            format,
            len: None,
        }
    }

    #[must_use]
    pub const fn with_len(mut self, len: usize) -> Self {
        self.len = Some(len);
        self
    }

    pub(crate) fn matches(&self, column_name: &str) -> bool {
        column_name.contains(self.column_name.as_str())
    }
}

/// Options fixed for the lifetime of one [`Parser`](crate::Parser).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserConfig {
    filesize_override: Option<usize>,
    max_pages: usize,
    format_overrides: Vec<FormatOverride>,
}

impl ParserConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            filesize_override: None,
            max_pages: 0,
            format_overrides: Vec::new(),
        }
    }

    /// Bounds enumeration by the real file size instead of the header's page
    /// count. Must not be smaller than the header length.
    #[must_use]
    pub const fn with_filesize_override(mut self, len: usize) -> Self {
        self.filesize_override = Some(len);
        self
    }

    /// Caps how many pages one `parse` call advances through; `0` means no cap.
    #[must_use]
    pub const fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    /// Appends an override. Earlier overrides win over later ones.
    #[must_use]
    pub fn with_format_override(mut self, format_override: FormatOverride) -> Self {
        self.format_overrides.push(format_override);
        self
    }

    #[must_use]
    pub const fn filesize_override(&self) -> Option<usize> {
        self.filesize_override
    }

    #[must_use]
    pub const fn max_pages(&self) -> usize {
        self.max_pages
    }

    #[must_use]
    pub fn format_overrides(&self) -> &[FormatOverride] {
        &self.format_overrides
    }

    pub(crate) fn find_override(&self, column_name: &str) -> Option<&FormatOverride> {
        self.format_overrides
            .iter()
            .find(|candidate| candidate.matches(column_name))
    }
}
