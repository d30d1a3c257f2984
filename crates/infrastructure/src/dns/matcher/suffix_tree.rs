use compact_str::CompactString;
use hickory_proto::rr::Name;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use std::collections::HashMap;

#[derive(Default)]
struct TrieNode {
    children: HashMap<CompactString, TrieNode, FxBuildHasher>,
    terminal: bool,
}

/// Label trie over reversed domain names.
///
/// A name matches when the walk from the root reaches a terminal node at the
/// name itself or at any of its parent domains. Read-only once built.
#[derive(Default)]
pub struct SuffixTree {
    root: TrieNode,
    len: usize,
}

impl SuffixTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain: &str) {
        let domain = normalize(domain);
        let mut node = &mut self.root;
        if !domain.is_empty() {
            for label in domain.split('.').rev() {
                node = node.children.entry(CompactString::new(label)).or_default();
            }
        }
        if !node.terminal {
            node.terminal = true;
            self.len += 1;
        }
    }

    #[inline]
    pub fn matches(&self, name: &str) -> bool {
        let name = normalize(name);
        if self.root.terminal {
            return true;
        }
        if name.is_empty() {
            return false;
        }

        let labels: SmallVec<[&str; 8]> = name.split('.').rev().collect();
        let mut node = &self.root;
        for label in labels {
            match node.children.get(label) {
                Some(child) if child.terminal => return true,
                Some(child) => node = child,
                None => return false,
            }
        }
        false
    }

    /// Same walk as [`SuffixTree::matches`], over the wire labels of `name`.
    /// A label holding an escaped dot stays one label.
    pub fn matches_name(&self, name: &Name) -> bool {
        if self.root.terminal {
            return true;
        }

        let mut node = &self.root;
        for raw in name.iter().rev() {
            let Ok(label) = std::str::from_utf8(raw) else {
                return false;
            };
            let mut label = CompactString::new(label);
            label.make_ascii_lowercase();
            match node.children.get(label.as_str()) {
                Some(child) if child.terminal => return true,
                Some(child) => node = child,
                None => return false,
            }
        }
        false
    }

    /// Number of distinct suffixes inserted.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<S: AsRef<str>> FromIterator<S> for SuffixTree {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tree = Self::new();
        for domain in iter {
            tree.insert(domain.as_ref());
        }
        tree
    }
}

/// ASCII-lowercases and strips one trailing dot.
fn normalize(name: &str) -> CompactString {
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    let mut normalized = CompactString::new(trimmed);
    normalized.make_ascii_lowercase();
    normalized
}
