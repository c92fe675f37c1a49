//! Builds the rooted directory tree from a decoder's flat entry list.

use std::collections::HashMap;

use log::debug;

use super::FileEntry;

/// Handle to a directory node inside a [`DirectoryTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirId(u32);

impl DirId {
    /// The root directory of every tree.
    pub const ROOT: DirId = DirId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// An internal node of the directory tree.
///
/// Children are stored in first-seen order. The `parent` handle is
/// navigational only; the arena in [`DirectoryTree`] owns every node.
#[derive(Debug)]
pub struct DirectoryEntry {
    /// Leaf directory name. The root carries the archive-defined name,
    /// conventionally the archive filename.
    pub name: String,

    /// Owning directory; `None` at the root.
    pub parent: Option<DirId>,

    /// Files in this directory, in decoder order.
    pub files: Vec<FileEntry>,

    /// Child directories, in first-seen order.
    pub subdirectories: Vec<DirId>,
}

/// The directory hierarchy of a parsed archive.
///
/// Built once by [`build_tree`] and immutable afterwards; all nodes live in
/// one arena and are freed together when the tree is dropped.
#[derive(Debug)]
pub struct DirectoryTree {
    nodes: Vec<DirectoryEntry>,
}

impl DirectoryTree {
    fn new(root_name: String) -> Self {
        Self {
            nodes: vec![DirectoryEntry {
                name: root_name,
                parent: None,
                files: Vec::new(),
                subdirectories: Vec::new(),
            }],
        }
    }

    #[must_use]
    pub fn root(&self) -> &DirectoryEntry {
        &self.nodes[DirId::ROOT.index()]
    }

    #[must_use]
    pub fn dir(&self, id: DirId) -> &DirectoryEntry {
        &self.nodes[id.index()]
    }

    /// Number of directories, including the root.
    #[must_use]
    pub fn dir_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of files across all directories.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.nodes.iter().map(|node| node.files.len()).sum()
    }

    /// The `/`-joined logical path of a directory, empty for the root.
    #[must_use]
    pub fn dir_path(&self, id: DirId) -> String {
        let mut segments = Vec::new();
        let mut current = id;
        while let Some(parent) = self.nodes[current.index()].parent {
            segments.push(self.nodes[current.index()].name.as_str());
            current = parent;
        }
        segments.reverse();
        segments.join("/")
    }

    /// Walks every file depth-first, preserving sibling order, yielding each
    /// entry with the directory that owns it.
    pub fn walk_files(&self) -> impl Iterator<Item = (DirId, &FileEntry)> {
        let mut stack = vec![DirId::ROOT];
        let mut ordered = Vec::new();
        while let Some(id) = stack.pop() {
            for file in &self.nodes[id.index()].files {
                ordered.push((id, file));
            }
            for child in self.nodes[id.index()].subdirectories.iter().rev() {
                stack.push(*child);
            }
        }
        ordered.into_iter()
    }

    /// Finds the first file whose full logical path equals `path`.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&FileEntry> {
        self.walk_files()
            .map(|(_, file)| file)
            .find(|file| file.path == path)
    }

    fn add_dir(&mut self, parent: DirId, name: String) -> DirId {
        let id = DirId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(DirectoryEntry {
            name,
            parent: Some(parent),
            files: Vec::new(),
            subdirectories: Vec::new(),
        });
        self.nodes[parent.index()].subdirectories.push(id);
        id
    }
}

/// Distributes a flat entry list into a directory hierarchy.
///
/// Each entry's path is split on `/` and `\`; empty and `"."` segments are
/// dropped. Intermediate directories are created on first use, the final
/// segment becomes the entry's `name`, and the entry moves into the terminal
/// directory's file list. Entries without a separator stay in the root.
#[must_use]
pub fn build_tree(root_name: &str, entries: Vec<FileEntry>) -> DirectoryTree {
    let mut tree = DirectoryTree::new(root_name.to_string());
    let mut dirs: HashMap<String, DirId> = HashMap::new();
    dirs.insert(String::new(), DirId::ROOT);

    let entry_count = entries.len();

    for mut entry in entries {
        let mut current = DirId::ROOT;
        let mut current_path = String::new();

        let segments: Vec<&str> = entry.path.split(['/', '\\']).collect();
        let (leaf, dir_segments) = match segments.split_last() {
            Some(split) => split,
            None => continue,
        };

        for segment in dir_segments {
            if segment.is_empty() || *segment == "." {
                continue;
            }

            if current_path.is_empty() {
                current_path.push_str(segment);
            } else {
                current_path.push('/');
                current_path.push_str(segment);
            }

            current = match dirs.get(&current_path) {
                Some(id) => *id,
                None => {
                    let id = tree.add_dir(current, (*segment).to_string());
                    dirs.insert(current_path.clone(), id);
                    id
                }
            };
        }

        entry.name = (*leaf).to_string();
        tree.nodes[current.index()].files.push(entry);
    }

    debug!(
        "tree: placed {entry_count} files into {} directories",
        tree.dir_count() - 1
    );

    tree
}
