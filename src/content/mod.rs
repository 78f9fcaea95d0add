//! Content items and their shared metadata store

mod item;
mod store;

pub use item::ContentItem;
pub use store::{MemoryStore, MetadataStore, Object, Statement};
