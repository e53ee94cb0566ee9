//! Native interface seam
//!
//! `libchorus` is not thread-safe and not reentrant: only one call may be in
//! flight at any instant, across every thread in the process, including calls
//! made from event-handler threads. [`Native`] owns the single lock that
//! enforces this; every native entry point in the bindings goes through
//! [`Native::call`]. Skipping the lock before a native call is a correctness
//! bug, not a performance concern.
//!
//! The native entry points themselves are consumed through the [`NativeApi`]
//! trait family, so the binding logic above this seam is independent of how
//! the library is actually linked.

use crate::catalog::{Availability, OfflineStatus};
use crate::error::{Error, NativeError, Result};
use crate::link::LinkType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

#[cfg(any(test, feature = "testing"))]
pub mod fixtures;

/// Raw native object reference. `0` is the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub u64);

impl RawHandle {
    /// The null handle
    pub const NULL: RawHandle = RawHandle(0);

    /// Whether this is the null handle
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// One element of a container's flat entry sequence.
///
/// Folders appear in the sequence as start/end boundary markers around their
/// contents. Entries are immutable snapshots of native state at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerEntry {
    /// A playlist, as a borrowed native reference
    Playlist(RawHandle),
    /// Start boundary of a named folder
    FolderStart {
        /// Folder id, assigned by the native library
        id: u64,
        /// Folder name at read time
        name: String,
    },
    /// End boundary of a folder
    FolderEnd {
        /// Folder id, matching the corresponding start marker
        id: u64,
    },
}

/// A notification reported by the native library.
///
/// Events arriving through a [`NativeCallbackBridge`] originate on the native
/// callback thread; events fired by host code originate wherever the host
/// fires them. Both travel the same dispatch path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A login attempt finished
    LoggedIn {
        /// Failure code if the attempt failed
        error: Option<NativeError>,
    },
    /// The session was logged out
    LoggedOut,
    /// Metadata for one or more loaded objects changed
    MetadataUpdated,
    /// The connection was lost
    ConnectionError {
        /// Failure code reported by the native library
        error: NativeError,
    },
    /// The service wants to show a message to the user
    MessageToUser {
        /// The message text
        message: String,
    },
    /// The native library wants `process_events` called soon
    NotifyMainThread,
    /// Playback was taken over by another session on the same account
    PlayTokenLost,
    /// A log line from inside the native library
    LogMessage {
        /// The log text
        message: String,
    },
    /// The current track finished playing
    EndOfTrack,
    /// A streaming failure occurred
    StreamingError {
        /// Failure code reported by the native library
        error: NativeError,
    },
    /// Information about the logged-in user changed
    UserinfoUpdated,
    /// The service requested playback to start
    StartPlayback,
    /// The service requested playback to stop
    StopPlayback,
}

/// Receiver for native-originated session events.
///
/// The native library invokes [`event`](Self::event) from its internal
/// callback thread. Implementations must not call back into the native
/// library on that thread; they hand the event off instead.
pub trait NativeCallbackBridge: Send + Sync {
    /// Deliver one event off the native callback thread
    fn event(&self, event: SessionEvent);
}

/// Session entry points of the native library
pub trait NativeSession {
    /// Run one iteration of the native event loop.
    ///
    /// Returns the suggested delay before the next call, in milliseconds.
    fn session_process_events(&self) -> Result<u64>;

    /// Start a login attempt; completion is reported via
    /// [`SessionEvent::LoggedIn`]
    fn session_login(&self, username: &str, password: &str) -> Result<()>;

    /// Log the session out. Errors when no login is active; callers check
    /// [`session_logged_in`](Self::session_logged_in) first.
    fn session_logout(&self) -> Result<()>;

    /// Whether a login is currently active
    fn session_logged_in(&self) -> bool;

    /// Register the bridge that receives callback-thread events
    fn session_set_callback_bridge(&self, bridge: Arc<dyn NativeCallbackBridge>);

    /// The session's root playlist container, as an owned reference
    fn session_playlist_container(&self) -> Result<RawHandle>;

    /// Star or unstar a track for the logged-in user
    fn session_star(&self, track: RawHandle, starred: bool) -> Result<()>;
}

/// Catalog object entry points of the native library
pub trait NativeCatalog {
    /// Increment the native reference count of an object
    fn add_ref(&self, handle: RawHandle) -> Result<()>;

    /// Decrement the native reference count of an object
    fn release(&self, handle: RawHandle);

    /// Construct an object from its stable identifier, as an owned reference.
    ///
    /// The object may be unloaded; attribute getters return defaults until
    /// the native library has fetched its metadata.
    fn resolve(&self, kind: LinkType, id: &str) -> Result<RawHandle>;

    /// Object type and stable identifier of a live object
    fn identity(&self, handle: RawHandle) -> Result<(LinkType, String)>;

    /// Display name; empty string while the object is unloaded
    fn object_name(&self, handle: RawHandle) -> String;

    /// Whether the object's metadata has been fetched
    fn object_loaded(&self, handle: RawHandle) -> bool;

    /// Track duration in milliseconds; zero while unloaded
    fn track_duration_ms(&self, handle: RawHandle) -> u64;

    /// Track popularity, 0 to 100; zero while unloaded
    fn track_popularity(&self, handle: RawHandle) -> u8;

    /// Disc number the track appears on
    fn track_disc(&self, handle: RawHandle) -> u32;

    /// Position of the track on its disc
    fn track_index(&self, handle: RawHandle) -> u32;

    /// Load error of the track, if loading failed
    fn track_error(&self, handle: RawHandle) -> Option<NativeError>;

    /// Availability of the track for the logged-in user
    fn track_availability(&self, handle: RawHandle) -> Availability;

    /// Offline sync status of the track
    fn track_offline_status(&self, handle: RawHandle) -> OfflineStatus;

    /// Whether the logged-in user starred the track
    fn track_is_starred(&self, handle: RawHandle) -> bool;

    /// Whether the track is a local track
    fn track_is_local(&self, handle: RawHandle) -> bool;

    /// Whether playback of the track is autolinked to another track
    fn track_is_autolinked(&self, handle: RawHandle) -> bool;

    /// Whether the track is a placeholder for another catalog object.
    ///
    /// A placeholder's identity is the link of the object it stands for.
    fn track_is_placeholder(&self, handle: RawHandle) -> bool;

    /// Album of the track, as an owned reference
    fn track_album(&self, handle: RawHandle) -> Result<RawHandle>;

    /// Number of performing artists on the track
    fn track_artist_count(&self, handle: RawHandle) -> usize;

    /// Performing artist by position, as an owned reference
    fn track_artist(&self, handle: RawHandle, index: usize) -> Result<RawHandle>;

    /// The track actually used for playback, as an owned reference.
    ///
    /// Differs from `handle` when the track is autolinked.
    fn track_playable(&self, handle: RawHandle) -> Result<RawHandle>;

    /// Create a local track, as an owned reference.
    ///
    /// The native library tries to match local tracks against the catalog in
    /// the background; a track that never matches stays unavailable, which is
    /// a normal state rather than an error. Pass a negative duration when it
    /// is unknown.
    fn local_track_create(
        &self,
        title: &str,
        artist: &str,
        album: &str,
        duration_ms: i64,
    ) -> Result<RawHandle>;

    /// Release year of an album; zero while unloaded
    fn album_year(&self, handle: RawHandle) -> u32;

    /// Primary artist of an album, as an owned reference
    fn album_artist(&self, handle: RawHandle) -> Result<RawHandle>;

    /// Whether the album is available in the logged-in user's region
    fn album_available(&self, handle: RawHandle) -> bool;
}

/// Playlist container entry points of the native library
pub trait NativeContainer {
    /// Number of entries in the container's flat sequence
    fn container_len(&self, container: RawHandle) -> usize;

    /// Entry at a position of the flat sequence.
    ///
    /// Playlist entries carry a borrowed reference; callers add-ref before
    /// keeping it.
    fn container_entry(&self, container: RawHandle, index: usize) -> Result<ContainerEntry>;

    /// Create a playlist at the end of the sequence, as an owned reference
    fn container_add(&self, container: RawHandle, name: &str) -> Result<RawHandle>;

    /// Create a playlist at a position of the sequence, as an owned reference
    fn container_insert(&self, container: RawHandle, index: usize, name: &str)
        -> Result<RawHandle>;

    /// Remove the entry at a position.
    ///
    /// Removing a folder start marker also removes its matching end marker.
    fn container_remove(&self, container: RawHandle, index: usize) -> Result<()>;

    /// Move the entry at `from` to position `to`
    fn container_move(&self, container: RawHandle, from: usize, to: usize) -> Result<()>;

    /// Name of the user owning the container; empty while unloaded
    fn container_owner_name(&self, container: RawHandle) -> String;

    /// Whether the container has finished loading
    fn container_loaded(&self, container: RawHandle) -> bool;

    /// Rename a folder, keyed by its id
    fn folder_rename(&self, container: RawHandle, folder_id: u64, name: &str) -> Result<()>;
}

/// The complete native surface consumed by the bindings
pub trait NativeApi: NativeSession + NativeCatalog + NativeContainer + Send + Sync {}

impl<T> NativeApi for T where T: NativeSession + NativeCatalog + NativeContainer + Send + Sync {}

/// Shared front door to the native library.
///
/// Owns the process-wide lock that serializes native calls. [`call`] holds
/// the lock for exactly the duration of the closure; never do anything inside
/// the closure that could need the lock again, and never park inside it
/// waiting on other threads.
///
/// Cloning is cheap and shares the same lock.
///
/// [`call`]: Native::call
#[derive(Clone)]
pub struct Native {
    inner: Arc<NativeInner>,
}

struct NativeInner {
    api: Box<dyn NativeApi>,
    lock: Mutex<()>,
}

impl Native {
    /// Wrap a native library behind the single-call lock
    pub fn new(api: Box<dyn NativeApi>) -> Self {
        Self {
            inner: Arc::new(NativeInner {
                api,
                lock: Mutex::new(()),
            }),
        }
    }

    /// Run one native call while holding the single-call lock
    pub fn call<T>(&self, f: impl FnOnce(&dyn NativeApi) -> T) -> T {
        // A poisoned lock only means some thread panicked between acquiring
        // the guard and finishing its call; the guard itself is still valid.
        let _guard: MutexGuard<'_, ()> = match self.inner.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("native lock poisoned by a panicked caller, continuing");
                poisoned.into_inner()
            }
        };
        f(&*self.inner.api)
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Native").finish_non_exhaustive()
    }
}

/// Owned reference to a native object.
///
/// Each `NativeHandle` owns exactly one native reference: [`Clone`]
/// increments the native count before copying, [`Drop`] releases exactly
/// once. Safe code cannot use a handle after release.
pub struct NativeHandle {
    raw: RawHandle,
    native: Native,
}

impl NativeHandle {
    /// Take ownership of a reference the native library has already counted.
    ///
    /// Rejects the null handle with [`Error::Handle`].
    pub fn adopt(native: Native, raw: RawHandle) -> Result<Self> {
        if raw.is_null() {
            return Err(Error::Handle);
        }
        Ok(Self { raw, native })
    }

    /// Own a new reference to an object the caller only borrows
    pub fn from_borrowed(native: Native, raw: RawHandle) -> Result<Self> {
        if raw.is_null() {
            return Err(Error::Handle);
        }
        native.call(|api| api.add_ref(raw))?;
        Ok(Self { raw, native })
    }

    /// The underlying raw handle
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    /// The native front door this handle belongs to
    pub fn native(&self) -> &Native {
        &self.native
    }
}

impl Clone for NativeHandle {
    fn clone(&self) -> Self {
        // add_ref on a handle we own a reference to cannot fail
        let _ = self.native.call(|api| api.add_ref(self.raw));
        Self {
            raw: self.raw,
            native: self.native.clone(),
        }
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        self.native.call(|api| api.release(self.raw));
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NativeHandle").field(&self.raw.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::FakeNative;
    use super::*;

    #[test]
    fn adopt_rejects_null_handle() {
        let native = Native::new(Box::new(FakeNative::new()));
        let result = NativeHandle::adopt(native, RawHandle::NULL);
        assert!(matches!(result, Err(Error::Handle)));
    }

    #[test]
    fn handle_releases_exactly_once_on_drop() {
        let fake = FakeNative::new();
        let raw = fake.seed_playlist("pl-1", "Hello");
        let native = Native::new(Box::new(fake.clone()));

        let handle = NativeHandle::from_borrowed(native.clone(), raw).unwrap();
        assert_eq!(native.call(|api| api.object_name(raw)), "Hello");
        assert_eq!(fake.refcount(raw), 1);

        drop(handle);
        assert_eq!(fake.refcount(raw), 0);
    }

    #[test]
    fn clone_increments_refcount() {
        let fake = FakeNative::new();
        let raw = fake.seed_playlist("pl-1", "Hello");
        let native = Native::new(Box::new(fake.clone()));

        let handle = NativeHandle::from_borrowed(native.clone(), raw).unwrap();
        let copy = handle.clone();
        assert_eq!(fake.refcount(raw), 2);

        drop(handle);
        assert_eq!(fake.refcount(raw), 1);
        drop(copy);
        assert_eq!(fake.refcount(raw), 0);
    }

    #[test]
    fn call_serializes_native_access() {
        use std::thread;

        let fake = FakeNative::new();
        let native = Native::new(Box::new(fake));

        // Hammer the lock from several threads; the fake panics if it ever
        // observes two overlapping calls.
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let native = native.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _ = native.call(|api| api.session_logged_in());
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
    }
}
