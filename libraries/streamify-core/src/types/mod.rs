//! Domain types shared by every Streamify crate

mod filters;
mod track;

pub use filters::{BandFilter, FilterConfig, Modulation, Peaking, Rotation, Shelf};
pub use track::{Track, TrackSource};
