pub mod aggregator;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod feeds;
pub mod filter;
pub mod image;
pub mod models;
pub mod ogp;
pub mod parser;
pub mod proxy;
pub mod source_name;
pub mod store;
pub mod summary;
pub mod xml;

pub use aggregator::{Aggregator, FeedState, InitialLoad, SnapshotOrigin};
pub use error::{AppError, Result};
pub use models::{Article, Language, SourceInfo};
