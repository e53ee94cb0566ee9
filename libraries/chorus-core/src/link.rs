//! Link parsing and formatting
//!
//! Links are the persistent textual identifiers of the Chorus service, of the
//! form `chorus:<type>:<id>`. Track links may carry a playback offset as a
//! `#<milliseconds>` suffix. Links round-trip through parsing without loss;
//! offsets round-trip to millisecond precision.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// URI scheme of every Chorus link
pub const SCHEME: &str = "chorus";

/// Object type carried by a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// A track
    Track,
    /// An artist
    Artist,
    /// An album
    Album,
    /// A playlist
    Playlist,
    /// A user
    User,
}

impl LinkType {
    /// All link types the bindings support
    pub const ALL: [LinkType; 5] = [
        LinkType::Track,
        LinkType::Artist,
        LinkType::Album,
        LinkType::Playlist,
        LinkType::User,
    ];

    /// Textual form used inside a link
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Track => "track",
            LinkType::Artist => "artist",
            LinkType::Album => "album",
            LinkType::Playlist => "playlist",
            LinkType::User => "user",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "track" => Some(LinkType::Track),
            "artist" => Some(LinkType::Artist),
            "album" => Some(LinkType::Album),
            "playlist" => Some(LinkType::Playlist),
            "user" => Some(LinkType::User),
            _ => None,
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stable identifier for one catalog object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    kind: LinkType,
    id: String,
    offset_ms: Option<u64>,
}

impl Link {
    /// Create a link without an offset
    pub fn new(kind: LinkType, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            offset_ms: None,
        }
    }

    /// Attach a playback offset in milliseconds
    pub fn with_offset_ms(mut self, offset_ms: u64) -> Self {
        self.offset_ms = Some(offset_ms);
        self
    }

    /// Object type of the link
    pub fn kind(&self) -> LinkType {
        self.kind
    }

    /// Stable identifier part of the link
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Playback offset in milliseconds, if the link carries one
    pub fn offset_ms(&self) -> Option<u64> {
        self.offset_ms
    }

    /// Playback offset in seconds; zero when the link carries none
    pub fn offset_seconds(&self) -> f64 {
        self.offset_ms.unwrap_or(0) as f64 / 1000.0
    }

    /// Convert a fractional-second offset to milliseconds.
    ///
    /// Precision below one millisecond is discarded; round-tripping an offset
    /// through a link recovers `floor(seconds * 1000) / 1000`.
    pub fn offset_ms_from_seconds(seconds: f64) -> u64 {
        (seconds * 1000.0).floor().max(0.0) as u64
    }
}

impl FromStr for Link {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::Link(s.to_string());

        let rest = s.strip_prefix(SCHEME).ok_or_else(malformed)?;
        let rest = rest.strip_prefix(':').ok_or_else(malformed)?;
        let (kind, rest) = rest.split_once(':').ok_or_else(malformed)?;
        let kind = LinkType::parse(kind).ok_or_else(malformed)?;

        let (id, offset_ms) = match rest.rsplit_once('#') {
            Some((id, offset)) => {
                let offset_ms = offset.parse::<u64>().map_err(|_| malformed())?;
                (id, Some(offset_ms))
            }
            None => (rest, None),
        };

        if id.is_empty() {
            return Err(malformed());
        }

        Ok(Link {
            kind,
            id: id.to_string(),
            offset_ms,
        })
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", SCHEME, self.kind, self.id)?;
        if let Some(offset_ms) = self.offset_ms {
            write!(f, "#{}", offset_ms)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_round_trips_for_every_type() {
        for kind in LinkType::ALL {
            let text = format!("chorus:{}:6JWc4iAiJ9FjyK0B59ABb4", kind);
            let link: Link = text.parse().unwrap();
            assert_eq!(link.kind(), kind);
            assert_eq!(link.id(), "6JWc4iAiJ9FjyK0B59ABb4");
            assert_eq!(link.to_string(), text);
        }
    }

    #[test]
    fn offset_round_trips() {
        let link: Link = "chorus:track:abc123#93500".parse().unwrap();
        assert_eq!(link.offset_ms(), Some(93_500));
        assert_eq!(link.to_string(), "chorus:track:abc123#93500");
        assert!((link.offset_seconds() - 93.5).abs() < f64::EPSILON);
    }

    #[test]
    fn offset_seconds_truncate_to_milliseconds() {
        let offset_ms = Link::offset_ms_from_seconds(1.23456);
        assert_eq!(offset_ms, 1234);

        let recovered = Link::new(LinkType::Track, "x")
            .with_offset_ms(offset_ms)
            .offset_seconds();
        assert!((recovered - 1.234).abs() < f64::EPSILON);
        assert!((recovered - (1.23456f64 * 1000.0).floor() / 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn negative_offset_clamps_to_zero() {
        assert_eq!(Link::offset_ms_from_seconds(-1.5), 0);
    }

    #[test]
    fn rejects_malformed_links() {
        for text in [
            "",
            "chorus",
            "chorus:",
            "chorus:track",
            "chorus:track:",
            "chorus:video:abc",
            "melody:track:abc",
            "chorus:track:abc#12.5",
            "chorus:track:abc#x",
        ] {
            let parsed = text.parse::<Link>();
            assert_eq!(parsed, Err(Error::Link(text.to_string())), "input: {text:?}");
        }
    }

    #[test]
    fn id_may_contain_colons() {
        let link: Link = "chorus:user:alice:inbox".parse().unwrap();
        assert_eq!(link.kind(), LinkType::User);
        assert_eq!(link.id(), "alice:inbox");
        assert_eq!(link.to_string(), "chorus:user:alice:inbox");
    }
}
