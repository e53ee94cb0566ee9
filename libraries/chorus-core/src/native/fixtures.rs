//! In-memory fake of the native library.
//!
//! Backs the crate's own tests and, behind the `testing` feature, the tests
//! of downstream crates. The fake keeps a seedable catalog, a container entry
//! list, login state, and the registered callback bridge, and it panics if it
//! ever observes two overlapping calls, which would mean a caller bypassed
//! [`Native::call`](super::Native::call).

use super::{
    ContainerEntry, NativeCallbackBridge, NativeCatalog, NativeContainer, NativeSession,
    RawHandle, SessionEvent,
};
use crate::catalog::{Availability, OfflineStatus};
use crate::error::{Error, NativeError, Result};
use crate::link::LinkType;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Fake `libchorus` with seedable state. Cloning shares the same state.
#[derive(Clone)]
pub struct FakeNative {
    shared: Arc<FakeShared>,
}

struct FakeShared {
    state: Mutex<FakeState>,
    concurrent: AtomicUsize,
}

struct FakeState {
    objects: HashMap<u64, FakeObject>,
    refcounts: HashMap<u64, u32>,
    by_identity: HashMap<(LinkType, String), u64>,
    next_handle: u64,
    next_local: u64,
    next_generated: u64,
    logged_in: bool,
    entries: Vec<ContainerEntry>,
    container: RawHandle,
    container_loaded: bool,
    owner_name: String,
    process_timeout_ms: u64,
    bridge: Option<Arc<dyn NativeCallbackBridge>>,
}

#[derive(Clone)]
struct FakeObject {
    kind: LinkType,
    id: String,
    name: String,
    loaded: bool,
    duration_ms: u64,
    popularity: u8,
    disc: u32,
    index: u32,
    error: Option<NativeError>,
    availability: Availability,
    offline: OfflineStatus,
    starred: bool,
    local: bool,
    autolinked: bool,
    placeholder: bool,
    album: Option<u64>,
    artists: Vec<u64>,
    playable: Option<u64>,
    year: u32,
    available: bool,
}

impl FakeObject {
    fn new(kind: LinkType, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: String::new(),
            loaded: false,
            duration_ms: 0,
            popularity: 0,
            disc: 0,
            index: 0,
            error: None,
            availability: Availability::Unavailable,
            offline: OfflineStatus::No,
            starred: false,
            local: false,
            autolinked: false,
            placeholder: false,
            album: None,
            artists: Vec::new(),
            playable: None,
            year: 0,
            available: false,
        }
    }
}

const CONTAINER_HANDLE: RawHandle = RawHandle(1);

impl FakeNative {
    /// Fresh fake with an empty catalog and an empty container
    pub fn new() -> Self {
        let mut objects = HashMap::new();
        // The root container is a native object like any other.
        objects.insert(
            CONTAINER_HANDLE.0,
            FakeObject::new(LinkType::Playlist, "__container__"),
        );
        Self {
            shared: Arc::new(FakeShared {
                state: Mutex::new(FakeState {
                    objects,
                    refcounts: HashMap::new(),
                    by_identity: HashMap::new(),
                    next_handle: 2,
                    next_local: 1,
                    next_generated: 1,
                    logged_in: false,
                    entries: Vec::new(),
                    container: CONTAINER_HANDLE,
                    container_loaded: true,
                    owner_name: "burgestrand".to_string(),
                    process_timeout_ms: 30,
                    bridge: None,
                }),
                concurrent: AtomicUsize::new(0),
            }),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.shared.state.lock().unwrap();
        f(&mut state)
    }

    fn enter(&self) -> CallGuard<'_> {
        let previous = self.shared.concurrent.fetch_add(1, Ordering::SeqCst);
        assert_eq!(previous, 0, "overlapping native calls detected");
        CallGuard {
            counter: &self.shared.concurrent,
        }
    }

    fn seed(&self, kind: LinkType, id: &str, name: &str) -> RawHandle {
        self.with_state(|state| {
            let handle = state.next_handle;
            state.next_handle += 1;
            let mut object = FakeObject::new(kind, id);
            object.name = name.to_string();
            object.loaded = true;
            state.objects.insert(handle, object);
            state.by_identity.insert((kind, id.to_string()), handle);
            RawHandle(handle)
        })
    }

    /// Seed a loaded track. The returned handle is library-internal (count 0).
    pub fn seed_track(&self, id: &str, name: &str) -> RawHandle {
        self.seed(LinkType::Track, id, name)
    }

    /// Seed a loaded artist
    pub fn seed_artist(&self, id: &str, name: &str) -> RawHandle {
        self.seed(LinkType::Artist, id, name)
    }

    /// Seed a loaded album
    pub fn seed_album(&self, id: &str, name: &str) -> RawHandle {
        self.seed(LinkType::Album, id, name)
    }

    /// Seed a loaded playlist
    pub fn seed_playlist(&self, id: &str, name: &str) -> RawHandle {
        self.seed(LinkType::Playlist, id, name)
    }

    /// Seed a placeholder track standing in for another catalog object.
    ///
    /// Its identity is the target's link; seed the target itself separately.
    pub fn seed_placeholder_track(&self, kind: LinkType, id: &str) -> RawHandle {
        self.with_state(|state| {
            let handle = state.next_handle;
            state.next_handle += 1;
            let mut object = FakeObject::new(kind, id);
            object.loaded = true;
            object.placeholder = true;
            state.objects.insert(handle, object);
            RawHandle(handle)
        })
    }

    /// Set duration, popularity, disc and disc position of a seeded track
    pub fn set_track_details(
        &self,
        track: RawHandle,
        duration_ms: u64,
        popularity: u8,
        disc: u32,
        index: u32,
    ) {
        self.with_state(|state| {
            let object = state.objects.get_mut(&track.0).expect("unknown track");
            object.duration_ms = duration_ms;
            object.popularity = popularity;
            object.disc = disc;
            object.index = index;
        });
    }

    /// Set starred/local/autolinked flags of a seeded track
    pub fn set_track_flags(&self, track: RawHandle, starred: bool, local: bool, autolinked: bool) {
        self.with_state(|state| {
            let object = state.objects.get_mut(&track.0).expect("unknown track");
            object.starred = starred;
            object.local = local;
            object.autolinked = autolinked;
        });
    }

    /// Set availability and offline status of a seeded track
    pub fn set_track_availability(
        &self,
        track: RawHandle,
        availability: Availability,
        offline: OfflineStatus,
    ) {
        self.with_state(|state| {
            let object = state.objects.get_mut(&track.0).expect("unknown track");
            object.availability = availability;
            object.offline = offline;
        });
    }

    /// Attach an album to a seeded track
    pub fn set_track_album(&self, track: RawHandle, album: RawHandle) {
        self.with_state(|state| {
            let object = state.objects.get_mut(&track.0).expect("unknown track");
            object.album = Some(album.0);
        });
    }

    /// Append a performing artist to a seeded track or album
    pub fn add_artist(&self, object: RawHandle, artist: RawHandle) {
        self.with_state(|state| {
            let object = state.objects.get_mut(&object.0).expect("unknown object");
            object.artists.push(artist.0);
        });
    }

    /// Set the playback target of an autolinked track
    pub fn set_track_playable(&self, track: RawHandle, target: RawHandle) {
        self.with_state(|state| {
            let object = state.objects.get_mut(&track.0).expect("unknown track");
            object.playable = Some(target.0);
        });
    }

    /// Set year and availability of a seeded album
    pub fn set_album_details(&self, album: RawHandle, year: u32, available: bool) {
        self.with_state(|state| {
            let object = state.objects.get_mut(&album.0).expect("unknown album");
            object.year = year;
            object.available = available;
        });
    }

    /// Replace the container's flat entry sequence
    pub fn set_container_entries(&self, entries: Vec<ContainerEntry>) {
        self.with_state(|state| state.entries = entries);
    }

    /// Current flat entry sequence, for assertions after mutations
    pub fn container_entries(&self) -> Vec<ContainerEntry> {
        self.with_state(|state| state.entries.clone())
    }

    /// Set the timeout hint returned by `session_process_events`
    pub fn set_process_timeout(&self, timeout_ms: u64) {
        self.with_state(|state| state.process_timeout_ms = timeout_ms);
    }

    /// Force the login state
    pub fn set_logged_in(&self, logged_in: bool) {
        self.with_state(|state| state.logged_in = logged_in);
    }

    /// Current native reference count of an object
    pub fn refcount(&self, handle: RawHandle) -> u32 {
        self.with_state(|state| state.refcounts.get(&handle.0).copied().unwrap_or(0))
    }

    /// Deliver an event through the registered bridge from a dedicated
    /// thread, the way the real library calls back from its internal thread.
    /// Blocks until the bridge call returns.
    pub fn emit_from_callback_thread(&self, event: SessionEvent) {
        let bridge = self
            .with_state(|state| state.bridge.clone())
            .expect("no callback bridge registered");
        thread::Builder::new()
            .name("native-callback".to_string())
            .spawn(move || bridge.event(event))
            .expect("failed to spawn callback thread")
            .join()
            .expect("callback thread panicked");
    }
}

impl Default for FakeNative {
    fn default() -> Self {
        Self::new()
    }
}

struct CallGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl NativeSession for FakeNative {
    fn session_process_events(&self) -> Result<u64> {
        let _guard = self.enter();
        Ok(self.with_state(|state| state.process_timeout_ms))
    }

    fn session_login(&self, _username: &str, _password: &str) -> Result<()> {
        self.with_state(|state| state.logged_in = true);
        Ok(())
    }

    fn session_logout(&self) -> Result<()> {
        self.with_state(|state| {
            if !state.logged_in {
                return Err(Error::NativeCall(NativeError::OtherPermanent));
            }
            state.logged_in = false;
            Ok(())
        })
    }

    fn session_logged_in(&self) -> bool {
        let _guard = self.enter();
        thread::yield_now();
        self.with_state(|state| state.logged_in)
    }

    fn session_set_callback_bridge(&self, bridge: Arc<dyn NativeCallbackBridge>) {
        self.with_state(|state| state.bridge = Some(bridge));
    }

    fn session_playlist_container(&self) -> Result<RawHandle> {
        self.with_state(|state| {
            let container = state.container;
            *state.refcounts.entry(container.0).or_insert(0) += 1;
            Ok(container)
        })
    }

    fn session_star(&self, track: RawHandle, starred: bool) -> Result<()> {
        self.with_state(|state| {
            let object = state.objects.get_mut(&track.0).ok_or(Error::Handle)?;
            object.starred = starred;
            Ok(())
        })
    }
}

impl NativeCatalog for FakeNative {
    fn add_ref(&self, handle: RawHandle) -> Result<()> {
        self.with_state(|state| {
            if !state.objects.contains_key(&handle.0) {
                return Err(Error::Handle);
            }
            *state.refcounts.entry(handle.0).or_insert(0) += 1;
            Ok(())
        })
    }

    fn release(&self, handle: RawHandle) {
        self.with_state(|state| {
            if let Some(count) = state.refcounts.get_mut(&handle.0) {
                *count = count.saturating_sub(1);
            }
        });
    }

    fn resolve(&self, kind: LinkType, id: &str) -> Result<RawHandle> {
        self.with_state(|state| {
            let handle = match state.by_identity.get(&(kind, id.to_string())) {
                Some(handle) => *handle,
                None => {
                    // The real library constructs an unloaded object for any
                    // syntactically valid identifier.
                    let handle = state.next_handle;
                    state.next_handle += 1;
                    state.objects.insert(handle, FakeObject::new(kind, id));
                    state.by_identity.insert((kind, id.to_string()), handle);
                    handle
                }
            };
            *state.refcounts.entry(handle).or_insert(0) += 1;
            Ok(RawHandle(handle))
        })
    }

    fn identity(&self, handle: RawHandle) -> Result<(LinkType, String)> {
        self.with_state(|state| {
            let object = state.objects.get(&handle.0).ok_or(Error::Handle)?;
            Ok((object.kind, object.id.clone()))
        })
    }

    fn object_name(&self, handle: RawHandle) -> String {
        self.with_state(|state| {
            state
                .objects
                .get(&handle.0)
                .map(|object| object.name.clone())
                .unwrap_or_default()
        })
    }

    fn object_loaded(&self, handle: RawHandle) -> bool {
        self.with_state(|state| state.objects.get(&handle.0).is_some_and(|o| o.loaded))
    }

    fn track_duration_ms(&self, handle: RawHandle) -> u64 {
        self.with_state(|state| state.objects.get(&handle.0).map_or(0, |o| o.duration_ms))
    }

    fn track_popularity(&self, handle: RawHandle) -> u8 {
        self.with_state(|state| state.objects.get(&handle.0).map_or(0, |o| o.popularity))
    }

    fn track_disc(&self, handle: RawHandle) -> u32 {
        self.with_state(|state| state.objects.get(&handle.0).map_or(0, |o| o.disc))
    }

    fn track_index(&self, handle: RawHandle) -> u32 {
        self.with_state(|state| state.objects.get(&handle.0).map_or(0, |o| o.index))
    }

    fn track_error(&self, handle: RawHandle) -> Option<NativeError> {
        self.with_state(|state| state.objects.get(&handle.0).and_then(|o| o.error))
    }

    fn track_availability(&self, handle: RawHandle) -> Availability {
        self.with_state(|state| {
            state
                .objects
                .get(&handle.0)
                .map_or(Availability::Unavailable, |o| o.availability)
        })
    }

    fn track_offline_status(&self, handle: RawHandle) -> OfflineStatus {
        self.with_state(|state| {
            state
                .objects
                .get(&handle.0)
                .map_or(OfflineStatus::No, |o| o.offline)
        })
    }

    fn track_is_starred(&self, handle: RawHandle) -> bool {
        self.with_state(|state| state.objects.get(&handle.0).is_some_and(|o| o.starred))
    }

    fn track_is_local(&self, handle: RawHandle) -> bool {
        self.with_state(|state| state.objects.get(&handle.0).is_some_and(|o| o.local))
    }

    fn track_is_autolinked(&self, handle: RawHandle) -> bool {
        self.with_state(|state| state.objects.get(&handle.0).is_some_and(|o| o.autolinked))
    }

    fn track_is_placeholder(&self, handle: RawHandle) -> bool {
        self.with_state(|state| state.objects.get(&handle.0).is_some_and(|o| o.placeholder))
    }

    fn track_album(&self, handle: RawHandle) -> Result<RawHandle> {
        self.with_state(|state| {
            let album = state
                .objects
                .get(&handle.0)
                .ok_or(Error::Handle)?
                .album
                .ok_or(Error::Handle)?;
            *state.refcounts.entry(album).or_insert(0) += 1;
            Ok(RawHandle(album))
        })
    }

    fn track_artist_count(&self, handle: RawHandle) -> usize {
        self.with_state(|state| state.objects.get(&handle.0).map_or(0, |o| o.artists.len()))
    }

    fn track_artist(&self, handle: RawHandle, index: usize) -> Result<RawHandle> {
        self.with_state(|state| {
            let artist = *state
                .objects
                .get(&handle.0)
                .ok_or(Error::Handle)?
                .artists
                .get(index)
                .ok_or(Error::NativeCall(NativeError::IndexOutOfRange))?;
            *state.refcounts.entry(artist).or_insert(0) += 1;
            Ok(RawHandle(artist))
        })
    }

    fn track_playable(&self, handle: RawHandle) -> Result<RawHandle> {
        self.with_state(|state| {
            let object = state.objects.get(&handle.0).ok_or(Error::Handle)?;
            let target = object.playable.unwrap_or(handle.0);
            *state.refcounts.entry(target).or_insert(0) += 1;
            Ok(RawHandle(target))
        })
    }

    fn local_track_create(
        &self,
        title: &str,
        artist: &str,
        album: &str,
        duration_ms: i64,
    ) -> Result<RawHandle> {
        let _ = (artist, album);
        self.with_state(|state| {
            let id = format!("local-{}", state.next_local);
            state.next_local += 1;
            let handle = state.next_handle;
            state.next_handle += 1;

            let mut object = FakeObject::new(LinkType::Track, &id);
            object.name = title.to_string();
            object.loaded = true;
            object.local = true;
            object.duration_ms = duration_ms.max(0) as u64;
            // Catalog matching is not modelled: local tracks stay unresolved.
            object.availability = Availability::Unavailable;

            state.objects.insert(handle, object);
            state.by_identity.insert((LinkType::Track, id), handle);
            state.refcounts.insert(handle, 1);
            Ok(RawHandle(handle))
        })
    }

    fn album_year(&self, handle: RawHandle) -> u32 {
        self.with_state(|state| state.objects.get(&handle.0).map_or(0, |o| o.year))
    }

    fn album_artist(&self, handle: RawHandle) -> Result<RawHandle> {
        self.with_state(|state| {
            let artist = *state
                .objects
                .get(&handle.0)
                .ok_or(Error::Handle)?
                .artists
                .first()
                .ok_or(Error::Handle)?;
            *state.refcounts.entry(artist).or_insert(0) += 1;
            Ok(RawHandle(artist))
        })
    }

    fn album_available(&self, handle: RawHandle) -> bool {
        self.with_state(|state| state.objects.get(&handle.0).is_some_and(|o| o.available))
    }
}

impl NativeContainer for FakeNative {
    fn container_len(&self, container: RawHandle) -> usize {
        self.with_state(|state| {
            if container == state.container {
                state.entries.len()
            } else {
                0
            }
        })
    }

    fn container_entry(&self, container: RawHandle, index: usize) -> Result<ContainerEntry> {
        self.with_state(|state| {
            if container != state.container {
                return Err(Error::Handle);
            }
            state
                .entries
                .get(index)
                .cloned()
                .ok_or(Error::NativeCall(NativeError::IndexOutOfRange))
        })
    }

    fn container_add(&self, container: RawHandle, name: &str) -> Result<RawHandle> {
        let len = self.container_len(container);
        self.container_insert(container, len, name)
    }

    fn container_insert(
        &self,
        container: RawHandle,
        index: usize,
        name: &str,
    ) -> Result<RawHandle> {
        self.with_state(|state| {
            if container != state.container {
                return Err(Error::Handle);
            }
            if index > state.entries.len() {
                return Err(Error::NativeCall(NativeError::IndexOutOfRange));
            }

            let id = format!("generated-{}", state.next_generated);
            state.next_generated += 1;
            let handle = state.next_handle;
            state.next_handle += 1;

            let mut object = FakeObject::new(LinkType::Playlist, &id);
            object.name = name.to_string();
            object.loaded = true;
            state.objects.insert(handle, object);
            state.by_identity.insert((LinkType::Playlist, id), handle);
            state.refcounts.insert(handle, 1);

            state
                .entries
                .insert(index, ContainerEntry::Playlist(RawHandle(handle)));
            Ok(RawHandle(handle))
        })
    }

    fn container_remove(&self, container: RawHandle, index: usize) -> Result<()> {
        self.with_state(|state| {
            if container != state.container {
                return Err(Error::Handle);
            }
            if index >= state.entries.len() {
                return Err(Error::NativeCall(NativeError::IndexOutOfRange));
            }

            let removed = state.entries.remove(index);
            if let ContainerEntry::FolderStart { id, .. } = removed {
                // The native library drops the matching end marker as well.
                let mut depth = 0usize;
                let end = state.entries.iter().skip(index).position(|entry| match entry {
                    ContainerEntry::FolderStart { .. } => {
                        depth += 1;
                        false
                    }
                    ContainerEntry::FolderEnd { id: end_id } => {
                        if depth == 0 && *end_id == id {
                            true
                        } else {
                            depth = depth.saturating_sub(1);
                            false
                        }
                    }
                    ContainerEntry::Playlist(_) => false,
                });
                if let Some(offset) = end {
                    state.entries.remove(index + offset);
                }
            }
            Ok(())
        })
    }

    fn container_move(&self, container: RawHandle, from: usize, to: usize) -> Result<()> {
        self.with_state(|state| {
            if container != state.container {
                return Err(Error::Handle);
            }
            if from >= state.entries.len() || to >= state.entries.len() {
                return Err(Error::NativeCall(NativeError::IndexOutOfRange));
            }
            let entry = state.entries.remove(from);
            state.entries.insert(to, entry);
            Ok(())
        })
    }

    fn container_owner_name(&self, container: RawHandle) -> String {
        self.with_state(|state| {
            if container == state.container {
                state.owner_name.clone()
            } else {
                String::new()
            }
        })
    }

    fn container_loaded(&self, container: RawHandle) -> bool {
        self.with_state(|state| container == state.container && state.container_loaded)
    }

    fn folder_rename(&self, container: RawHandle, folder_id: u64, name: &str) -> Result<()> {
        self.with_state(|state| {
            if container != state.container {
                return Err(Error::Handle);
            }
            for entry in &mut state.entries {
                if let ContainerEntry::FolderStart { id, name: folder_name } = entry {
                    if *id == folder_id {
                        *folder_name = name.to_string();
                        return Ok(());
                    }
                }
            }
            Err(Error::NativeCall(NativeError::InvalidIndata))
        })
    }
}
