//! Streamify Core
//!
//! Core types, collaborator traits, and error handling shared by the
//! Streamify playback crates.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackSource`, `FilterConfig`
//! - **Collaborator Traits**: `TrackResolver`, `RelatedTracks`, `StatusSink`
//! - **Error Handling**: `CoreError` and `Result`
//!
//! # Example
//!
//! ```rust
//! use streamify_core::{FilterConfig, Track, TrackSource};
//! use std::time::Duration;
//!
//! let track = Track::new("dQw4w9WgXcQ", "Never Gonna Give You Up", TrackSource::Youtube)
//!     .with_author("Rick Astley")
//!     .with_duration(Duration::from_secs(213));
//! assert!(!track.is_indeterminate());
//!
//! let filters = FilterConfig::default()
//!     .with_filter("bass", serde_json::json!("10"))
//!     .unwrap();
//! assert_eq!(filters.bass, Some(10.0));
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use traits::{RelatedTracks, StatusSink, TrackResolver};
pub use types::{
    BandFilter, FilterConfig, Modulation, Peaking, Rotation, Shelf, Track, TrackSource,
};
