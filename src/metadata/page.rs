const PAGE_TYPE_META: u16 = 0x0000;
const PAGE_TYPE_DATA: u16 = 0x0100;
const PAGE_TYPE_MIX: u16 = 0x0200;
const PAGE_TYPE_META2: u16 = 0x4000;
// Keeps the compression bits of the page type.
const PAGE_TYPE_MASK: u16 = 0xFF00;

const SIG_ROW_SIZE: u32 = 0xF7F7_F7F7;
const SIG_COLUMN_SIZE: u32 = 0xF6F6_F6F6;
const SIG_COLUMN_TEXT: u32 = 0xFFFF_FFFD;
const SIG_COLUMN_NAME: u32 = 0xFFFF_FFFF;
const SIG_COLUMN_ATTRS: u32 = 0xFFFF_FFFC;
const SIG_COLUMN_FORMAT: u32 = 0xFFFF_FBFE;
const SIG_COUNTS: u32 = 0xFFFF_FC00;
const SIG_COLUMN_LIST: u32 = 0xFFFF_FFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Meta,
    Meta2,
    Mix,
    Data,
    /// Page kinds the decoder does not read (AMD, compressed tables, ...).
    Ignored(u16),
}

impl PageType {
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        match raw & PAGE_TYPE_MASK {
            PAGE_TYPE_META => Self::Meta,
            PAGE_TYPE_META2 => Self::Meta2,
            PAGE_TYPE_MIX => Self::Mix,
            PAGE_TYPE_DATA => Self::Data,
            other => Self::Ignored(other),
        }
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        match self {
            Self::Meta => PAGE_TYPE_META,
            Self::Meta2 => PAGE_TYPE_META2,
            Self::Mix => PAGE_TYPE_MIX,
            Self::Data => PAGE_TYPE_DATA,
            Self::Ignored(raw) => raw,
        }
    }

    /// Meta pages may carry (possibly compressed) rows inside subheaders.
    #[must_use]
    pub const fn has_data_subheaders(self) -> bool {
        matches!(self, Self::Meta | Self::Meta2)
    }

    /// Mix and data pages carry rows packed after the subheader directory.
    #[must_use]
    pub const fn has_packed_rows(self) -> bool {
        matches!(self, Self::Mix | Self::Data)
    }
}

/// Page header decoded on every visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub offset: usize,
    pub page_type: PageType,
    pub block_count: u16,
    pub subheader_count: u16,
}

impl Page {
    #[must_use]
    pub const fn packed_row_count(&self) -> usize {
        (self.block_count as usize).saturating_sub(self.subheader_count as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubheaderSignature {
    RowSize,
    ColumnSize,
    ColumnText,
    ColumnName,
    ColumnAttributes,
    ColumnFormatAndLabel,
    Counts,
    ColumnList,
    /// No recognized signature: the subheader holds row bytes.
    None,
}

impl SubheaderSignature {
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            SIG_ROW_SIZE => Self::RowSize,
            SIG_COLUMN_SIZE => Self::ColumnSize,
            SIG_COLUMN_TEXT => Self::ColumnText,
            SIG_COLUMN_NAME => Self::ColumnName,
            SIG_COLUMN_ATTRS => Self::ColumnAttributes,
            SIG_COLUMN_FORMAT => Self::ColumnFormatAndLabel,
            SIG_COUNTS => Self::Counts,
            SIG_COLUMN_LIST => Self::ColumnList,
            _ => Self::None,
        }
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        match self {
            Self::RowSize => SIG_ROW_SIZE,
            Self::ColumnSize => SIG_COLUMN_SIZE,
            Self::ColumnText => SIG_COLUMN_TEXT,
            Self::ColumnName => SIG_COLUMN_NAME,
            Self::ColumnAttributes => SIG_COLUMN_ATTRS,
            Self::ColumnFormatAndLabel => SIG_COLUMN_FORMAT,
            Self::Counts => SIG_COUNTS,
            Self::ColumnList => SIG_COLUMN_LIST,
            Self::None => 0,
        }
    }
}

/// Subheader pointer resolved against its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subheader {
    pub offset: usize,
    pub len: usize,
    pub signature: SubheaderSignature,
}
