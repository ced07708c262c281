//! # skua-matcher
//!
//! A multi-pattern matching automaton: a trie over byte edges with an opaque
//! value attached to every complete pattern. Nodes live in a growable arena
//! and are referenced by stable integer ids, so inserting patterns never
//! invalidates anything a caller holds.
//!
//! While exactly one pattern is registered, substring search uses
//! precomputed bad-character/good-suffix skip tables; registering a second
//! pattern drops the tables and substring search degrades to walking the
//! trie. The multi-pattern walk restarts at the entry node on a failed edge,
//! which can under-report overlapping or prefix-sharing patterns. That is a
//! deliberate trade: callers feed it one extracted token at a time.

mod substring;

use substring::SkipTables;

#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    #[error("Pattern is already registered: {0}")]
    DuplicatePattern(String),
    #[error("Empty patterns are not allowed")]
    EmptyPattern,
}

/// Stable index of a trie node. Node storage may relocate on growth; ids
/// never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(pub(crate) u32);

const ENTRY: NodeId = NodeId(0);

#[derive(Debug)]
struct Edge {
    label: i32,
    child: NodeId,
}

#[derive(Debug)]
struct Node<V> {
    // Sorted by label, no duplicates. Binary searched on every step.
    edges: Vec<Edge>,
    value: Option<V>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Node {
            edges: Vec::new(),
            value: None,
        }
    }
}

#[derive(Debug)]
pub struct Automaton<V> {
    nodes: Vec<Node<V>>,
    patterns: usize,
    longest: usize,
    skip: Option<SkipTables>,
}

impl<V> Default for Automaton<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Automaton<V> {
    pub fn new() -> Self {
        Automaton {
            nodes: vec![Node::new()],
            patterns: 0,
            longest: 0,
            skip: None,
        }
    }

    pub fn patterns(&self) -> usize {
        self.patterns
    }

    /// Register `pattern` with its value. Adding the second pattern discards
    /// the single-pattern skip tables; adding a pattern that already has a
    /// value is an error and leaves the automaton untouched.
    pub fn augment(&mut self, pattern: &[u8], value: V) -> Result<(), MatcherError> {
        if pattern.is_empty() {
            return Err(MatcherError::EmptyPattern);
        }

        let mut cur = ENTRY;
        for &b in pattern {
            cur = self.edge_or_insert(cur, b as i32);
        }

        let node = &mut self.nodes[cur.0 as usize];
        if node.value.is_some() {
            return Err(MatcherError::DuplicatePattern(
                String::from_utf8_lossy(pattern).into_owned(),
            ));
        }
        node.value = Some(value);

        self.patterns += 1;
        if pattern.len() > self.longest {
            self.longest = pattern.len();
        }
        self.skip = if self.patterns == 1 {
            Some(SkipTables::build(pattern, cur))
        } else {
            None
        };

        Ok(())
    }

    /// Match the entire input against the registered patterns.
    pub fn match_exact(&self, input: &[u8]) -> Option<&V> {
        let mut cursor = Cursor::new(self);
        for &b in input {
            if !cursor.advance(b) {
                return None;
            }
        }
        cursor.value()
    }

    /// Report whether any registered pattern occurs anywhere in `text`,
    /// returning the value of one such pattern. With one pattern registered
    /// this is a right-to-left skip-table scan; otherwise the trie is walked
    /// byte by byte, restarting at the entry node on a failed edge.
    pub fn match_substring(&self, text: &[u8]) -> Option<&V> {
        if let Some(tables) = &self.skip {
            if tables.find(text) {
                return self.nodes[tables.terminal().0 as usize].value.as_ref();
            }
            return None;
        }

        let mut cur = ENTRY;
        for &b in text {
            cur = match self.step(cur, b as i32) {
                Some(next) => next,
                None => self.step(ENTRY, b as i32).unwrap_or(ENTRY),
            };
            if let Some(v) = self.nodes[cur.0 as usize].value.as_ref() {
                return Some(v);
            }
        }
        None
    }

    /// Depth-first traversal over every registered pattern, reconstructing
    /// each key into a scratch buffer sized by the longest pattern.
    pub fn enumerate(&self, mut visit: impl FnMut(&[u8], &V)) {
        let mut key = Vec::with_capacity(self.longest + 1);
        self.enumerate_node(ENTRY, &mut key, &mut visit);
    }

    fn enumerate_node(&self, at: NodeId, key: &mut Vec<u8>, visit: &mut impl FnMut(&[u8], &V)) {
        let node = &self.nodes[at.0 as usize];
        if let Some(v) = node.value.as_ref() {
            visit(key, v);
        }
        for edge in &node.edges {
            key.push(edge.label as u8);
            self.enumerate_node(edge.child, key, visit);
            key.pop();
        }
    }

    fn step(&self, from: NodeId, label: i32) -> Option<NodeId> {
        let edges = &self.nodes[from.0 as usize].edges;
        edges
            .binary_search_by(|e| e.label.cmp(&label))
            .ok()
            .map(|i| edges[i].child)
    }

    fn edge_or_insert(&mut self, from: NodeId, label: i32) -> NodeId {
        match self.nodes[from.0 as usize]
            .edges
            .binary_search_by(|e| e.label.cmp(&label))
        {
            Ok(i) => self.nodes[from.0 as usize].edges[i].child,
            Err(i) => {
                let child = NodeId(self.nodes.len() as u32);
                self.nodes.push(Node::new());
                self.nodes[from.0 as usize].edges.insert(i, Edge { label, child });
                child
            }
        }
    }
}

/// A resettable matching position within an automaton. Any mismatch resets
/// the cursor to the entry node, so one cursor can test many inputs.
pub struct Cursor<'a, V> {
    automaton: &'a Automaton<V>,
    at: NodeId,
}

impl<'a, V> Cursor<'a, V> {
    pub fn new(automaton: &'a Automaton<V>) -> Self {
        Cursor {
            automaton,
            at: ENTRY,
        }
    }

    /// Consume one byte. Returns false (and resets to the entry node) if no
    /// edge matches.
    pub fn advance(&mut self, byte: u8) -> bool {
        match self.automaton.step(self.at, byte as i32) {
            Some(next) => {
                self.at = next;
                true
            }
            None => {
                self.at = ENTRY;
                false
            }
        }
    }

    pub fn reset(&mut self) {
        self.at = ENTRY;
    }

    /// The value at the current position, if it is a complete pattern.
    pub fn value(&self) -> Option<&'a V> {
        self.automaton.nodes[self.at.0 as usize].value.as_ref()
    }
}
