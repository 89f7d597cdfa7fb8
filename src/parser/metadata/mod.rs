mod builder;
mod formats;
mod text_store;

pub(crate) use builder::{MetadataBuilder, RowBuffers};
