//! Albums

use crate::catalog::Artist;
use crate::error::{Error, Result};
use crate::link::{Link, LinkType};
use crate::native::{Native, NativeHandle, RawHandle};

/// An album in the Chorus catalog
#[derive(Debug, Clone)]
pub struct Album {
    handle: NativeHandle,
}

impl Album {
    /// Construct an album from its link
    pub fn from_link(native: &Native, link: &Link) -> Result<Self> {
        if link.kind() != LinkType::Album {
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

    /// Link to this album
    pub fn to_link(&self) -> Result<Link> {
        let (kind, id) = self.native().call(|api| api.identity(self.raw()))?;
        Ok(Link::new(kind, id))
    }

    /// Album name; empty until loaded
    pub fn name(&self) -> String {
        self.native().call(|api| api.object_name(self.raw()))
    }

    /// Release year; zero until loaded
    pub fn year(&self) -> u32 {
        self.native().call(|api| api.album_year(self.raw()))
    }

    /// Primary artist of the album
    pub fn artist(&self) -> Result<Artist> {
        let raw = self.native().call(|api| api.album_artist(self.raw()))?;
        Ok(Artist::from_handle(NativeHandle::adopt(
            self.native().clone(),
            raw,
        )?))
    }

    /// Whether the album is available in the logged-in user's region
    pub fn available(&self) -> bool {
        self.native().call(|api| api.album_available(self.raw()))
    }

    /// Whether the album's metadata has been fetched
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

impl PartialEq for Album {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_link(), other.to_link()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
