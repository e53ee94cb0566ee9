//! Artists

use crate::error::{Error, Result};
use crate::link::{Link, LinkType};
use crate::native::{Native, NativeHandle, RawHandle};

/// An artist in the Chorus catalog
#[derive(Debug, Clone)]
pub struct Artist {
    handle: NativeHandle,
}

impl Artist {
    /// Construct an artist from its link
    pub fn from_link(native: &Native, link: &Link) -> Result<Self> {
        if link.kind() != LinkType::Artist {
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

    /// Link to this artist
    pub fn to_link(&self) -> Result<Link> {
        let (kind, id) = self.native().call(|api| api.identity(self.raw()))?;
        Ok(Link::new(kind, id))
    }

    /// Artist name; empty until loaded
    pub fn name(&self) -> String {
        self.native().call(|api| api.object_name(self.raw()))
    }

    /// Whether the artist's metadata has been fetched
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

impl PartialEq for Artist {
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
    fn link_round_trip() {
        let fake = FakeNative::new();
        fake.seed_artist("ar1", "Nine Inch Nails");
        let native = Native::new(Box::new(fake));

        let link = Link::new(LinkType::Artist, "ar1");
        let artist = Artist::from_link(&native, &link).unwrap();
        assert_eq!(artist.to_link().unwrap(), link);
        assert_eq!(artist.name(), "Nine Inch Nails");
        assert!(artist.loaded());
    }

    #[test]
    fn rejects_non_artist_links() {
        let fake = FakeNative::new();
        let native = Native::new(Box::new(fake));

        let link = Link::new(LinkType::Track, "t1");
        assert!(matches!(
            Artist::from_link(&native, &link),
            Err(Error::Link(_))
        ));
    }
}
