//! Playlist container
//!
//! The native library stores a user's playlists as one flat sequence in
//! which folders appear as start/end boundary markers around their contents:
//!
//! ```text
//! (0) playlist: Hello
//! (1) folder start: Hi
//! (2) playlist: inside Hi
//! (3) folder start: Ho
//! (4) playlist: inside HiHo
//! (5) folder end: Ho
//! (6) playlist: inside Hi2
//! (7) folder end: Hi
//! (8) playlist: World
//! ```
//!
//! [`structure`] rebuilds the nesting in a single left-to-right pass. A
//! folder is one logical entity that appears at two positions of the output,
//! its start and its end; both positions carry the same [`FolderIndex`] into
//! the folder arena, so identity comparison is exact and cheap.

use chorus_core::native::{ContainerEntry, Native, NativeHandle, RawHandle};
use chorus_core::{Error, Playlist, Result, StructureError};
use std::ops::Index;

/// Index of a folder record in the arena of a [`Contents`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FolderIndex(usize);

/// A folder reconstructed from its boundary markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    id: u64,
    name: String,
    start_index: usize,
    end_index: usize,
}

impl Folder {
    /// Folder id, assigned by the native library
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Folder name at the time the contents were read.
    ///
    /// A rename through [`PlaylistContainer::rename_folder`] does not update
    /// this; re-read the contents to observe it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the folder's start marker in the produced sequence
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Position of the folder's end marker in the produced sequence
    pub fn end_index(&self) -> usize {
        self.end_index
    }
}

/// One position of the structured container sequence
#[derive(Debug, Clone)]
pub enum Node {
    /// A playlist
    Playlist(Playlist),
    /// A folder boundary; the same index appears at the folder's start and
    /// end positions
    Folder(FolderIndex),
}

/// Node emitted by [`structure`] before playlist handles are wrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawNode {
    /// A playlist, still as a borrowed native reference
    Playlist(RawHandle),
    /// A folder boundary
    Folder(FolderIndex),
}

/// Rebuild the folder tree from a flat, marker-delimited entry sequence.
///
/// One left-to-right pass with an explicit stack of open folders:
/// - a playlist entry emits a playlist node at the current position;
/// - a folder start allocates an arena record, pushes it, and emits its
///   index;
/// - a folder end pops the stack, requires the popped id to match, records
///   the end position, and emits the same index again.
///
/// Any mismatch, an end without a start, or a folder left open at the end of
/// the pass fails with a [`StructureError`]; no partial result is produced.
/// For well-formed input the output has the input's length and folder ranges
/// nest properly by construction.
pub fn structure(entries: &[ContainerEntry]) -> Result<(Vec<RawNode>, Vec<Folder>)> {
    let mut nodes = Vec::with_capacity(entries.len());
    let mut folders: Vec<Folder> = Vec::new();
    let mut open: Vec<(u64, usize)> = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        match entry {
            ContainerEntry::Playlist(handle) => nodes.push(RawNode::Playlist(*handle)),
            ContainerEntry::FolderStart { id, name } => {
                let arena_index = folders.len();
                folders.push(Folder {
                    id: *id,
                    name: name.clone(),
                    start_index: index,
                    end_index: 0,
                });
                open.push((*id, arena_index));
                nodes.push(RawNode::Folder(FolderIndex(arena_index)));
            }
            ContainerEntry::FolderEnd { id } => {
                let (open_id, arena_index) = open
                    .pop()
                    .ok_or(StructureError::UnexpectedFolderEnd { id: *id, index })?;
                if open_id != *id {
                    return Err(StructureError::MismatchedFolderEnd {
                        expected: open_id,
                        found: *id,
                        index,
                    }
                    .into());
                }
                folders[arena_index].end_index = index;
                nodes.push(RawNode::Folder(FolderIndex(arena_index)));
            }
        }
    }

    if let Some((id, _)) = open.pop() {
        return Err(StructureError::UnterminatedFolder { id }.into());
    }

    Ok((nodes, folders))
}

/// The structured contents of a playlist container.
///
/// A snapshot: rebuilt from scratch on every [`PlaylistContainer::contents`]
/// call, never patched incrementally after container mutations.
#[derive(Debug)]
pub struct Contents {
    nodes: Vec<Node>,
    folders: Vec<Folder>,
}

impl Contents {
    /// Number of positions, equal to the flat sequence length
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the container was empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node at a position
    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// All positions in order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The folder arena
    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    /// Folder record behind an index of this snapshot
    pub fn folder(&self, index: FolderIndex) -> &Folder {
        &self.folders[index.0]
    }

    /// The positions strictly between a folder's start and end markers.
    ///
    /// Nested folders appear with both their boundary positions, walkable
    /// recursively with the same accessor.
    pub fn folder_children(&self, index: FolderIndex) -> &[Node] {
        let folder = self.folder(index);
        &self.nodes[folder.start_index + 1..folder.end_index]
    }

    /// Iterate over all positions
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }
}

impl Index<usize> for Contents {
    type Output = Node;

    fn index(&self, index: usize) -> &Node {
        &self.nodes[index]
    }
}

impl<'a> IntoIterator for &'a Contents {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// The root playlist container of a logged-in user
#[derive(Debug, Clone)]
pub struct PlaylistContainer {
    handle: NativeHandle,
}

impl PlaylistContainer {
    /// Wrap an owned native container reference
    pub fn from_handle(handle: NativeHandle) -> Self {
        Self { handle }
    }

    /// Number of entries in the flat sequence
    pub fn len(&self) -> usize {
        self.native().call(|api| api.container_len(self.raw()))
    }

    /// Whether the flat sequence is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the container has finished loading
    pub fn loaded(&self) -> bool {
        self.native().call(|api| api.container_loaded(self.raw()))
    }

    /// Name of the user owning the container
    pub fn owner_name(&self) -> String {
        self.native()
            .call(|api| api.container_owner_name(self.raw()))
    }

    /// Read and structure the container's current contents.
    ///
    /// The flat sequence is read fresh on every call, inside one native
    /// critical section that also reconstructs the tree and add-refs every
    /// playlist: a mutation made through this binding cannot release a
    /// playlist between the snapshot and the reference being taken.
    /// Consistency against out-of-band native mutation is not guaranteed.
    pub fn contents(&self) -> Result<Contents> {
        let (raw_nodes, folders) = self.native().call(|api| {
            let len = api.container_len(self.raw());
            let entries = (0..len)
                .map(|index| api.container_entry(self.raw(), index))
                .collect::<Result<Vec<_>>>()?;
            let (raw_nodes, folders) = structure(&entries)?;

            for (taken, node) in raw_nodes.iter().enumerate() {
                if let RawNode::Playlist(raw) = node {
                    if let Err(err) = api.add_ref(*raw) {
                        // Give back the references taken so far.
                        for earlier in &raw_nodes[..taken] {
                            if let RawNode::Playlist(raw) = earlier {
                                api.release(*raw);
                            }
                        }
                        return Err(err);
                    }
                }
            }
            Ok::<_, Error>((raw_nodes, folders))
        })?;

        let mut nodes = Vec::with_capacity(raw_nodes.len());
        for raw_node in raw_nodes {
            nodes.push(match raw_node {
                RawNode::Playlist(raw) => Node::Playlist(Playlist::from_handle(
                    NativeHandle::adopt(self.native().clone(), raw)?,
                )),
                RawNode::Folder(index) => Node::Folder(index),
            });
        }

        Ok(Contents { nodes, folders })
    }

    /// Create a playlist at the end of the sequence
    pub fn add(&self, name: &str) -> Result<Playlist> {
        let raw = self.native().call(|api| api.container_add(self.raw(), name))?;
        Ok(Playlist::from_handle(NativeHandle::adopt(
            self.native().clone(),
            raw,
        )?))
    }

    /// Create a playlist at a position of the sequence
    pub fn insert(&self, index: usize, name: &str) -> Result<Playlist> {
        let raw = self
            .native()
            .call(|api| api.container_insert(self.raw(), index, name))?;
        Ok(Playlist::from_handle(NativeHandle::adopt(
            self.native().clone(),
            raw,
        )?))
    }

    /// Remove the entry at a position.
    ///
    /// Removing a folder's start marker also removes its matching end
    /// marker. A subsequent [`contents`](Self::contents) call re-runs the
    /// reconstruction over the mutated sequence.
    pub fn remove(&self, index: usize) -> Result<()> {
        self.native()
            .call(|api| api.container_remove(self.raw(), index))
    }

    /// Move the entry at `from` to position `to`
    pub fn move_entry(&self, from: usize, to: usize) -> Result<()> {
        self.native()
            .call(|api| api.container_move(self.raw(), from, to))
    }

    /// Rename a folder, keyed by its id.
    ///
    /// Does not touch previously returned [`Contents`]; re-read to observe
    /// the new name.
    pub fn rename_folder(&self, folder_id: u64, new_name: &str) -> Result<()> {
        self.native()
            .call(|api| api.folder_rename(self.raw(), folder_id, new_name))
    }

    fn native(&self) -> &Native {
        self.handle.native()
    }

    fn raw(&self) -> RawHandle {
        self.handle.raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::{Error, StructureError};

    fn playlist(handle: u64) -> ContainerEntry {
        ContainerEntry::Playlist(RawHandle(handle))
    }

    fn start(id: u64, name: &str) -> ContainerEntry {
        ContainerEntry::FolderStart {
            id,
            name: name.to_string(),
        }
    }

    fn end(id: u64) -> ContainerEntry {
        ContainerEntry::FolderEnd { id }
    }

    #[test]
    fn empty_sequence_structures_to_nothing() {
        let (nodes, folders) = structure(&[]).unwrap();
        assert!(nodes.is_empty());
        assert!(folders.is_empty());
    }

    #[test]
    fn nested_folders_share_one_record_per_id() {
        // The worked example: two folders, one nested in the other.
        let entries = [
            playlist(10),
            start(1, "Hi"),
            playlist(11),
            start(3, "Ho"),
            playlist(12),
            end(3),
            playlist(13),
            end(1),
            playlist(14),
        ];

        let (nodes, folders) = structure(&entries).unwrap();
        assert_eq!(nodes.len(), entries.len());

        let folder_at = |index: usize| match nodes[index] {
            RawNode::Folder(folder_index) => folder_index,
            RawNode::Playlist(_) => panic!("expected folder at {index}"),
        };

        // Folder 1 spans positions 1..7, folder 3 spans 3..5, and each
        // boundary pair carries the identical arena index.
        assert_eq!(folder_at(1), folder_at(7));
        assert_eq!(folder_at(3), folder_at(5));
        assert_ne!(folder_at(1), folder_at(3));

        let outer = &folders[folder_at(1).0];
        assert_eq!((outer.id(), outer.name()), (1, "Hi"));
        assert_eq!((outer.start_index(), outer.end_index()), (1, 7));

        let inner = &folders[folder_at(3).0];
        assert_eq!((inner.id(), inner.name()), (3, "Ho"));
        assert_eq!((inner.start_index(), inner.end_index()), (3, 5));

        for index in [0, 2, 4, 6, 8] {
            assert!(matches!(nodes[index], RawNode::Playlist(_)));
        }
    }

    #[test]
    fn unmatched_end_is_a_structure_error() {
        let entries = [playlist(10), end(1)];
        assert_eq!(
            structure(&entries),
            Err(Error::Structure(StructureError::UnexpectedFolderEnd {
                id: 1,
                index: 1
            }))
        );
    }

    #[test]
    fn interleaved_folders_are_a_structure_error() {
        // start(1) start(2) end(1) end(2) partially overlaps; never repaired.
        let entries = [start(1, "A"), start(2, "B"), end(1), end(2)];
        assert_eq!(
            structure(&entries),
            Err(Error::Structure(StructureError::MismatchedFolderEnd {
                expected: 2,
                found: 1,
                index: 2
            }))
        );
    }

    #[test]
    fn unterminated_folder_is_a_structure_error() {
        let entries = [start(1, "A"), playlist(10)];
        assert_eq!(
            structure(&entries),
            Err(Error::Structure(StructureError::UnterminatedFolder {
                id: 1
            }))
        );
    }

    #[test]
    fn duplicate_ids_in_disjoint_ranges_are_fine() {
        // Folder ids come from the native library; only pairing matters.
        let entries = [start(1, "A"), end(1), start(1, "B"), end(1)];
        let (nodes, folders) = structure(&entries).unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(folders.len(), 2);
        assert_ne!(nodes[0], nodes[2]);
    }
}
