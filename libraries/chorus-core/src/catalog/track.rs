//! Tracks
//!
//! Tracks are browsable catalog entities that can also be played by
//! streaming. A track wrapper carries the playback offset its link was
//! created with, in milliseconds.

use crate::catalog::{Album, Artist, Playlist};
use crate::error::{Error, NativeError, Result};
use crate::link::{Link, LinkType};
use crate::native::{Native, NativeHandle, RawHandle};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Track availability for the logged-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Not available
    Unavailable,
    /// Available for playback
    Available,
    /// In the catalog but not streamable
    NotStreamable,
    /// Withheld by the artist
    BannedByArtist,
}

/// Offline sync status of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineStatus {
    /// Not marked for offline use
    No,
    /// Waiting to be downloaded
    Waiting,
    /// Currently downloading
    Downloading,
    /// Downloaded and playable offline
    Done,
    /// Download failed
    Error,
    /// Downloaded copy has expired
    DoneExpired,
    /// Downloaded copy needs re-syncing
    DoneResync,
}

/// The object behind a track, produced by [`Track::unwrapped`]
#[derive(Debug, Clone)]
pub enum Unwrapped {
    /// A regular track, unchanged
    Track(Track),
    /// The artist a placeholder stood for
    Artist(Artist),
    /// The album a placeholder stood for
    Album(Album),
    /// The playlist a placeholder stood for
    Playlist(Playlist),
}

/// A track in the Chorus catalog
#[derive(Debug, Clone)]
pub struct Track {
    handle: NativeHandle,
    offset_ms: u64,
}

impl Track {
    /// Construct a track from its link, keeping the link's offset
    pub fn from_link(native: &Native, link: &Link) -> Result<Self> {
        if link.kind() != LinkType::Track {
            return Err(Error::Link(link.to_string()));
        }
        let raw = native.call(|api| api.resolve(link.kind(), link.id()))?;
        Ok(Self {
            handle: NativeHandle::adopt(native.clone(), raw)?,
            offset_ms: link.offset_ms().unwrap_or(0),
        })
    }

    /// Wrap an owned native reference, with no playback offset
    pub fn from_handle(handle: NativeHandle) -> Self {
        Self {
            handle,
            offset_ms: 0,
        }
    }

    /// Create a local track.
    ///
    /// The native library tries to match local tracks against the catalog in
    /// the background. Matching is not guaranteed: a track that never matches
    /// stays [`Availability::Unavailable`] even once loaded, which is a
    /// normal unresolved state rather than an error.
    pub fn local(
        native: &Native,
        title: &str,
        artist: &str,
        album: Option<&str>,
        duration: Option<Duration>,
    ) -> Result<Self> {
        let duration_ms = duration.map_or(-1, |d| d.as_millis() as i64);
        let raw = native.call(|api| {
            api.local_track_create(title, artist, album.unwrap_or(""), duration_ms)
        })?;
        Ok(Self {
            handle: NativeHandle::adopt(native.clone(), raw)?,
            offset_ms: 0,
        })
    }

    /// Playback offset this track was created with, in seconds
    pub fn offset_seconds(&self) -> f64 {
        self.offset_ms as f64 / 1000.0
    }

    /// Link to this track, carrying its creation offset when non-zero
    pub fn to_link(&self) -> Result<Link> {
        let (kind, id) = self.native().call(|api| api.identity(self.raw()))?;
        let link = Link::new(kind, id);
        Ok(if self.offset_ms > 0 {
            link.with_offset_ms(self.offset_ms)
        } else {
            link
        })
    }

    /// Link to this track at a given offset in fractional seconds.
    ///
    /// Offsets are stored with millisecond precision; anything finer is
    /// discarded.
    pub fn to_link_at(&self, offset_seconds: f64) -> Result<Link> {
        let (kind, id) = self.native().call(|api| api.identity(self.raw()))?;
        Ok(Link::new(kind, id).with_offset_ms(Link::offset_ms_from_seconds(offset_seconds)))
    }

    /// Track name; empty until loaded
    pub fn name(&self) -> String {
        self.native().call(|api| api.object_name(self.raw()))
    }

    /// Track duration; zero until loaded
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.native().call(|api| api.track_duration_ms(self.raw())))
    }

    /// Popularity, 0 to 100
    pub fn popularity(&self) -> u8 {
        self.native().call(|api| api.track_popularity(self.raw()))
    }

    /// Disc number this track appears on
    pub fn disc(&self) -> u32 {
        self.native().call(|api| api.track_disc(self.raw()))
    }

    /// Position of the track on its disc
    pub fn index(&self) -> u32 {
        self.native().call(|api| api.track_index(self.raw()))
    }

    /// Load error, if loading the track failed
    pub fn status(&self) -> Option<NativeError> {
        self.native().call(|api| api.track_error(self.raw()))
    }

    /// Whether the track's metadata has been fetched
    pub fn loaded(&self) -> bool {
        self.native().call(|api| api.object_loaded(self.raw()))
    }

    /// Availability for the logged-in user
    pub fn availability(&self) -> Availability {
        self.native().call(|api| api.track_availability(self.raw()))
    }

    /// Whether [`availability`](Self::availability) is available
    pub fn available(&self) -> bool {
        self.availability() == Availability::Available
    }

    /// Offline sync status
    pub fn offline_status(&self) -> OfflineStatus {
        self.native().call(|api| api.track_offline_status(self.raw()))
    }

    /// Whether the logged-in user starred this track
    pub fn starred(&self) -> bool {
        self.native().call(|api| api.track_is_starred(self.raw()))
    }

    /// Star or unstar this track for the logged-in user
    pub fn set_starred(&self, starred: bool) -> Result<()> {
        self.native()
            .call(|api| api.session_star(self.raw(), starred))
    }

    /// Whether this is a local track
    pub fn is_local(&self) -> bool {
        self.native().call(|api| api.track_is_local(self.raw()))
    }

    /// Whether playback is autolinked to another track
    pub fn autolinked(&self) -> bool {
        self.native().call(|api| api.track_is_autolinked(self.raw()))
    }

    /// Whether this track is a placeholder standing in for another object.
    ///
    /// Playlists can contain entries that are not really tracks; such a
    /// placeholder carries the link of the object it stands for and has no
    /// track metadata of its own.
    pub fn is_placeholder(&self) -> bool {
        self.native().call(|api| api.track_is_placeholder(self.raw()))
    }

    /// Resolve a placeholder into the object it stands for.
    ///
    /// A regular track unwraps into itself. A placeholder whose link does not
    /// name an artist, album, or playlist is malformed native data and fails
    /// with [`Error::Link`].
    pub fn unwrapped(&self) -> Result<Unwrapped> {
        if !self.is_placeholder() {
            return Ok(Unwrapped::Track(self.clone()));
        }
        let link = self.to_link()?;
        match link.kind() {
            LinkType::Artist => Ok(Unwrapped::Artist(Artist::from_link(self.native(), &link)?)),
            LinkType::Album => Ok(Unwrapped::Album(Album::from_link(self.native(), &link)?)),
            LinkType::Playlist => {
                Ok(Unwrapped::Playlist(Playlist::from_link(self.native(), &link)?))
            }
            LinkType::Track | LinkType::User => Err(Error::Link(link.to_string())),
        }
    }

    /// The track actually used for playback; differs when autolinked
    pub fn playable_track(&self) -> Result<Track> {
        let raw = self.native().call(|api| api.track_playable(self.raw()))?;
        Ok(Track::from_handle(NativeHandle::adopt(
            self.native().clone(),
            raw,
        )?))
    }

    /// Album this track belongs to
    pub fn album(&self) -> Result<Album> {
        let raw = self.native().call(|api| api.track_album(self.raw()))?;
        Ok(Album::from_handle(NativeHandle::adopt(
            self.native().clone(),
            raw,
        )?))
    }

    /// First performing artist, if any
    pub fn artist(&self) -> Result<Option<Artist>> {
        Ok(self.artists()?.into_iter().next())
    }

    /// All performing artists
    pub fn artists(&self) -> Result<Vec<Artist>> {
        let count = self.native().call(|api| api.track_artist_count(self.raw()));
        let mut artists = Vec::with_capacity(count);
        for index in 0..count {
            let raw = self
                .native()
                .call(|api| api.track_artist(self.raw(), index))?;
            artists.push(Artist::from_handle(NativeHandle::adopt(
                self.native().clone(),
                raw,
            )?));
        }
        Ok(artists)
    }

    fn native(&self) -> &Native {
        self.handle.native()
    }

    fn raw(&self) -> RawHandle {
        self.handle.raw()
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_link(), other.to_link()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
