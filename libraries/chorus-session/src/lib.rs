//! Chorus Session
//!
//! The session side of the Chorus bindings: driving the native event loop,
//! dispatching native-originated events to host handlers off the native
//! callback thread, session options, and reconstruction of the playlist
//! folder tree from the native library's flat container sequence.
//!
//! # Threading
//!
//! The native library is not reentrant and its callbacks arrive on an
//! internal thread the bindings do not control. Handlers registered through
//! [`SessionCallbacks`] therefore always run on dispatcher worker threads,
//! never on the native callback thread and never on the thread that fired
//! the event, so they are free to call back into the bindings.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod container;
pub mod dispatch;
pub mod options;
pub mod session;

// Re-export commonly used types
pub use container::{Contents, Folder, FolderIndex, Node, PlaylistContainer};
pub use dispatch::{EventDispatcher, SessionCallbacks, WeakDispatcher};
pub use options::merge_defaults;
pub use session::Session;
