//! Incremental command recognition.
//!
//! Command prefixes are stored in a prefix tree kept in an arena. The engine
//! feeds bytes in one at a time; each byte either descends into the tree,
//! lands on a leaf (the command is recognized and its handler takes over the
//! remaining payload bytes), or misses.
//!
//! The tree is built once from a static table and never mutated afterwards.
//! A leaf and a branch never share a node: no registered sequence may be a
//! prefix of another one, and building fails if the table breaks that rule.

use std::collections::BTreeMap;

use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::to_hex;

/// Index of a node in the trie arena.
pub type NodeId = usize;

#[derive(Debug, Clone)]
enum TrieNode<H> {
    Branch(BTreeMap<u8, NodeId>),
    Leaf(H),
}

/// Result of advancing one byte from a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance<H> {
    /// The byte continues a registered sequence.
    Descend(NodeId),
    /// The byte completes a registered sequence.
    Match(H),
    /// No registered sequence continues with this byte.
    Miss,
}

/// A prefix tree mapping byte sequences to handlers.
#[derive(Debug, Clone)]
pub struct Trie<H> {
    nodes: Vec<TrieNode<H>>,
}

impl<H: Copy> Trie<H> {
    /// The root node every walk starts from.
    pub const ROOT: NodeId = 0;

    /// Build a trie from a table of `(sequence, handler)` pairs.
    ///
    /// Fails on empty sequences, duplicates, and sequences that are a prefix
    /// of another entry.
    pub fn build<'a, I>(table: I) -> ProtocolResult<Self>
    where
        I: IntoIterator<Item = (&'a [u8], H)>,
    {
        let mut trie = Trie {
            nodes: vec![TrieNode::Branch(BTreeMap::new())],
        };
        for (sequence, handler) in table {
            trie.insert(sequence, handler)?;
        }
        Ok(trie)
    }

    fn insert(&mut self, sequence: &[u8], handler: H) -> ProtocolResult<()> {
        let (&last, prefix) = sequence.split_last().ok_or(ProtocolError::EmptySequence)?;

        let mut node = Self::ROOT;
        for (depth, &byte) in prefix.iter().enumerate() {
            node = match self.child(node, byte) {
                Some(child) => child,
                None => self.push_child(node, byte, TrieNode::Branch(BTreeMap::new())),
            };
            if let TrieNode::Leaf(_) = self.nodes[node] {
                return Err(ProtocolError::ShadowedByPrefix {
                    sequence: to_hex(sequence),
                    prefix: to_hex(&sequence[..=depth]),
                });
            }
        }

        let Some(existing) = self.child(node, last) else {
            self.push_child(node, last, TrieNode::Leaf(handler));
            return Ok(());
        };
        match self.nodes[existing] {
            TrieNode::Leaf(_) => Err(ProtocolError::DuplicateSequence {
                sequence: to_hex(sequence),
            }),
            TrieNode::Branch(_) => Err(ProtocolError::PrefixOfExisting {
                sequence: to_hex(sequence),
            }),
        }
    }

    fn child(&self, node: NodeId, byte: u8) -> Option<NodeId> {
        match self.nodes.get(node)? {
            TrieNode::Branch(children) => children.get(&byte).copied(),
            TrieNode::Leaf(_) => None,
        }
    }

    fn push_child(&mut self, parent: NodeId, byte: u8, node: TrieNode<H>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        if let TrieNode::Branch(children) = &mut self.nodes[parent] {
            children.insert(byte, id);
        }
        id
    }

    /// Advance one byte from `node`.
    pub fn advance(&self, node: NodeId, byte: u8) -> Advance<H> {
        match self.child(node, byte) {
            Some(child) => match &self.nodes[child] {
                TrieNode::Leaf(handler) => Advance::Match(*handler),
                TrieNode::Branch(_) => Advance::Descend(child),
            },
            None => Advance::Miss,
        }
    }

    /// Start a new walk at the root with an empty message buffer.
    pub fn walk(&self) -> Walk<'_, H> {
        Walk {
            trie: self,
            node: Self::ROOT,
            buffer: Vec::new(),
        }
    }
}

/// Outcome of pushing one byte into a [`Walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<H> {
    /// Mid-sequence, keep feeding bytes.
    Continue,
    /// The buffered bytes form a registered sequence.
    Matched(H),
    /// The buffered bytes match nothing.
    Unrecognized,
}

/// A single message walk through the trie.
///
/// Collects every byte it is fed, including the byte that completes or
/// breaks the match.
#[derive(Debug)]
pub struct Walk<'t, H> {
    trie: &'t Trie<H>,
    node: NodeId,
    buffer: Vec<u8>,
}

impl<H: Copy> Walk<'_, H> {
    /// Feed the next input byte.
    pub fn push(&mut self, byte: u8) -> Step<H> {
        self.buffer.push(byte);
        match self.trie.advance(self.node, byte) {
            Advance::Descend(node) => {
                self.node = node;
                Step::Continue
            }
            Advance::Match(handler) => Step::Matched(handler),
            Advance::Miss => Step::Unrecognized,
        }
    }

    /// Bytes consumed so far.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Finish the walk and take the message buffer.
    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Cmd {
        A,
        B,
        C,
    }

    fn sample() -> Trie<Cmd> {
        let table: [(&[u8], Cmd); 3] = [
            (&[0x21, 0x24, 0x05], Cmd::A),
            (&[0x21, 0x21, 0x00], Cmd::B),
            (&[0x22, 0x15], Cmd::C),
        ];
        Trie::build(table).expect("table is prefix free")
    }

    fn feed(trie: &Trie<Cmd>, bytes: &[u8]) -> (Vec<Step<Cmd>>, Vec<u8>) {
        let mut walk = trie.walk();
        let steps = bytes.iter().map(|&b| walk.push(b)).collect();
        (steps, walk.into_buffer())
    }

    #[test]
    fn test_match_on_last_byte() {
        let trie = sample();
        let (steps, buffer) = feed(&trie, &[0x21, 0x24, 0x05]);
        assert_eq!(steps, vec![Step::Continue, Step::Continue, Step::Matched(Cmd::A)]);
        assert_eq!(buffer, vec![0x21, 0x24, 0x05]);
    }

    #[test]
    fn test_miss_keeps_triggering_byte() {
        let trie = sample();
        let (steps, buffer) = feed(&trie, &[0x21, 0x99]);
        assert_eq!(steps, vec![Step::Continue, Step::Unrecognized]);
        assert_eq!(buffer, vec![0x21, 0x99]);
    }

    #[test]
    fn test_miss_at_root() {
        let trie = sample();
        assert_eq!(trie.advance(Trie::<Cmd>::ROOT, 0x00), Advance::Miss);
    }

    #[test]
    fn test_shared_prefix_branches() {
        let trie = sample();
        let Advance::Descend(node) = trie.advance(Trie::<Cmd>::ROOT, 0x21) else {
            panic!("expected branch");
        };
        assert!(matches!(trie.advance(node, 0x24), Advance::Descend(_)));
        assert!(matches!(trie.advance(node, 0x21), Advance::Descend(_)));
        assert_eq!(trie.advance(node, 0x15), Advance::Miss);
    }

    #[test]
    fn test_walk_collects_bytes() {
        let trie = sample();
        let mut walk = trie.walk();
        assert!(walk.buffer().is_empty());
        walk.push(0x22);
        assert_eq!(walk.buffer(), &[0x22]);
    }

    #[test]
    fn test_shadowed_by_prefix_is_rejected() {
        let table: [(&[u8], Cmd); 2] = [(&[0x22, 0x15], Cmd::A), (&[0x22, 0x15, 0x01], Cmd::B)];
        let err = Trie::build(table).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::ShadowedByPrefix {
                sequence: "22 15 01".to_string(),
                prefix: "22 15".to_string(),
            }
        );
    }

    #[test]
    fn test_prefix_of_existing_is_rejected() {
        let table: [(&[u8], Cmd); 2] = [(&[0x22, 0x15, 0x01], Cmd::A), (&[0x22, 0x15], Cmd::B)];
        let err = Trie::build(table).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PrefixOfExisting {
                sequence: "22 15".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let table: [(&[u8], Cmd); 2] = [(&[0x7E], Cmd::A), (&[0x7E], Cmd::C)];
        let err = Trie::build(table).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::DuplicateSequence {
                sequence: "7E".to_string()
            }
        );
    }

    #[test]
    fn test_empty_sequence_is_rejected() {
        let table: [(&[u8], Cmd); 1] = [(&[], Cmd::A)];
        assert_eq!(Trie::build(table).unwrap_err(), ProtocolError::EmptySequence);
    }
}
