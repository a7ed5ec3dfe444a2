//! Virtual File System
//!
//! The execution engine only needs to fetch a program's bytes by path.
//! [`ProgramSource`] is that interface; [`RamFs`] is the in-memory
//! filesystem behind the shell.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// What a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node<'a> {
    /// Regular file and its contents
    File(&'a [u8]),
    /// Directory
    Directory,
}

/// Path-addressed byte storage.
pub trait ProgramSource {
    /// Resolve `path`, or `None` if nothing is there.
    fn lookup(&self, path: &str) -> Option<Node<'_>>;
}

#[derive(Debug, Clone)]
enum Entry {
    File(Vec<u8>),
    Directory,
}

/// In-memory filesystem.
///
/// Paths are absolute and `/`-separated; `/` always exists.
#[derive(Debug, Clone, Default)]
pub struct RamFs {
    entries: BTreeMap<String, Entry>,
}

/// Drop repeated and trailing slashes and make the path absolute.
fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for part in path.split('/').filter(|p| !p.is_empty()) {
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

impl RamFs {
    /// Empty filesystem containing only `/`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file, creating parent directories.
    pub fn add_file(&mut self, path: &str, contents: impl Into<Vec<u8>>) {
        let path = normalize(path);
        self.add_parents(&path);
        self.entries.insert(path, Entry::File(contents.into()));
    }

    /// Create a directory and its parents.
    pub fn add_dir(&mut self, path: &str) {
        let path = normalize(path);
        self.add_parents(&path);
        if path != "/" {
            self.entries.insert(path, Entry::Directory);
        }
    }

    /// Remove a single entry. Returns whether it existed.
    pub fn remove(&mut self, path: &str) -> bool {
        self.entries.remove(&normalize(path)).is_some()
    }

    fn add_parents(&mut self, path: &str) {
        let mut end = 0;
        while let Some(pos) = path[end + 1..].find('/') {
            end += pos + 1;
            self.entries
                .entry(String::from(&path[..end]))
                .or_insert(Entry::Directory);
        }
    }
}

impl ProgramSource for RamFs {
    fn lookup(&self, path: &str) -> Option<Node<'_>> {
        let path = normalize(path);
        if path == "/" {
            return Some(Node::Directory);
        }
        match self.entries.get(&path)? {
            Entry::File(bytes) => Some(Node::File(bytes)),
            Entry::Directory => Some(Node::Directory),
        }
    }
}
