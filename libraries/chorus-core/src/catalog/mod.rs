//! Catalog wrapper types
//!
//! Thin typed wrappers over native handles. Every getter goes through the
//! single-call lock; getters with no native failure path return a defined
//! default (an empty name, a zero duration) while the object is unloaded
//! rather than erroring.
//!
//! Wrapper equality compares the underlying link identity (object type plus
//! stable id), never wrapper identity: the same native object reached via two
//! paths yields two distinct wrappers that compare equal.

pub mod album;
pub mod artist;
pub mod playlist;
pub mod track;

pub use album::Album;
pub use artist::Artist;
pub use playlist::Playlist;
pub use track::{Availability, OfflineStatus, Track, Unwrapped};
