//! A Rust library for downloading raster map tiles into an on-disk cache.
//!
//! Polygons (or the whole world at low zoom) are resolved into slippy-map
//! tiles, fetched concurrently from a templated tile server with retry and
//! backoff, cached per map style, optionally converted to a 256-color palette
//! and a packed RGB565 dump, and mirrored into an output directory. Sessions
//! can be cancelled cooperatively and report progress through a
//! [`ProgressSink`].

pub mod cache;
pub mod cancel;
pub mod config;
pub mod convert;
pub mod downloader;
pub mod error;
pub mod fetch;
pub mod http;
pub mod mirror;
pub mod query;
pub mod session;
pub mod tile;

pub use cache::{ArtifactKind, CacheStore};
pub use cancel::CancellationController;
pub use config::*;
pub use convert::ConversionPolicy;
pub use downloader::Downloader;
pub use error::*;
pub use fetch::{
    ChannelSink, CollectingSink, FetchStats, ProgressEvent, ProgressSink, TileFetcher,
    TracingSink, UrlTemplate,
};
pub use mirror::OutputMirror;
pub use session::*;
pub use tile::*;
