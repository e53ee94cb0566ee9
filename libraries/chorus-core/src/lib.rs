//! Chorus Core
//!
//! Foundations of the Chorus bindings: the native interface seam, handle
//! ownership, link parsing, and the catalog wrapper types.
//!
//! `libchorus` is not thread-safe and not reentrant. Everything in this crate
//! is built around that constraint:
//! - [`native::Native`] serializes every call into the library behind one
//!   process-wide lock.
//! - [`native::NativeHandle`] ties each native reference to exactly one owner
//!   and releases it on drop.
//! - The catalog wrappers ([`Track`], [`Artist`], [`Album`], [`Playlist`])
//!   never touch the library outside of [`native::Native::call`].
//!
//! # Example
//!
//! ```no_run
//! use chorus_core::{Link, LinkType};
//!
//! let link: Link = "chorus:track:4uLU6hMCjMI75M1A2tKUQC".parse().unwrap();
//! assert_eq!(link.kind(), LinkType::Track);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod error;
pub mod link;
pub mod native;

// Re-export commonly used types
pub use catalog::{Album, Artist, Availability, OfflineStatus, Playlist, Track, Unwrapped};
pub use error::{Error, NativeError, Result, StructureError};
pub use link::{Link, LinkType};
pub use native::{ContainerEntry, Native, NativeApi, NativeHandle, RawHandle, SessionEvent};
