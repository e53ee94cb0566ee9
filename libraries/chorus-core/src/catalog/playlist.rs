//! Playlists

use crate::error::{Error, Result};
use crate::link::{Link, LinkType};
use crate::native::{Native, NativeHandle, RawHandle};

/// A playlist in the Chorus catalog
#[derive(Debug, Clone)]
pub struct Playlist {
    handle: NativeHandle,
}

impl Playlist {
    /// Construct a playlist from its link
    pub fn from_link(native: &Native, link: &Link) -> Result<Self> {
        if link.kind() != LinkType::Playlist {
            return Err(Error::Link(link.to_string()));
        }
        let raw = native.call(|api| api.resolve(link.kind(), link.id()))?;
        Ok(Self {
            handle: NativeHandle::adopt(native.clone(), raw)?,
        })
    }

    /// Wrap an owned native reference
    pub fn from_handle(handle: NativeHandle) -> Self {
        Self { handle }
    }

    /// Link to this playlist
    pub fn to_link(&self) -> Result<Link> {
        let (kind, id) = self.native().call(|api| api.identity(self.raw()))?;
        Ok(Link::new(kind, id))
    }

    /// Playlist name; empty until loaded
    pub fn name(&self) -> String {
        self.native().call(|api| api.object_name(self.raw()))
    }

    /// Whether the playlist's metadata has been fetched
    pub fn loaded(&self) -> bool {
        self.native().call(|api| api.object_loaded(self.raw()))
    }

    fn native(&self) -> &Native {
        self.handle.native()
    }

    fn raw(&self) -> RawHandle {
        self.handle.raw()
    }
}

impl PartialEq for Playlist {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_link(), other.to_link()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::fixtures::FakeNative;

    #[test]
    fn link_round_trip_and_name() {
        let fake = FakeNative::new();
        fake.seed_playlist("pl1", "Road Trip");
        let native = Native::new(Box::new(fake));

        let link = Link::new(LinkType::Playlist, "pl1");
        let playlist = Playlist::from_link(&native, &link).unwrap();
        assert_eq!(playlist.to_link().unwrap(), link);
        assert_eq!(playlist.name(), "Road Trip");
    }

    #[test]
    fn same_playlist_via_two_wrappers_compares_equal() {
        let fake = FakeNative::new();
        fake.seed_playlist("pl1", "Road Trip");
        let native = Native::new(Box::new(fake));

        let link = Link::new(LinkType::Playlist, "pl1");
        let a = Playlist::from_link(&native, &link).unwrap();
        let b = Playlist::from_link(&native, &link).unwrap();
        assert_eq!(a, b);
    }
}
