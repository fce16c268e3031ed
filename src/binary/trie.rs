//! Index tree walk.
//!
//! The tree is a binary radix trie of 8-byte nodes, each holding absolute
//! left/right pointers. A pointer below `tree_end` addresses another node, a
//! pointer at or past it addresses a record, and zero marks an unassigned
//! branch.
//!
//! In a reputation file an unassigned branch falls back to the covering
//! network: the walk returns to the most recent ancestor where the literal
//! took the right branch, takes the left branch there instead, and follows
//! right branches from then on. That lands on the highest record of the
//! lower sibling range. Blacklist files treat the same branch as a miss.

use super::format::{MAX_HOPS, TREE_NODE_SIZE};
use super::literal::Literal;
use super::schema::FileSchema;
use super::source::ReadAt;
use crate::{Error, Result};

/// One trie node as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieNode {
    pub left: u32,
    pub right: u32,
}

impl TrieNode {
    pub fn read<R: ReadAt + ?Sized>(source: &R, offset: u64) -> Result<Self> {
        let mut buf = [0u8; TREE_NODE_SIZE];
        source.read_at(offset, &mut buf)?;
        Ok(Self {
            left: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            right: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    fn child(&self, right: bool) -> u32 {
        if right {
            self.right
        } else {
            self.left
        }
    }
}

/// Outcome of a single walk step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Still descending; the walk must be stepped again.
    Descending,
    /// A record was reached at this absolute offset.
    Resolved(u64),
}

/// Per-lookup walk state. Owned by exactly one lookup.
#[derive(Debug, Clone)]
pub struct TrieWalk {
    literal: Literal,
    position: usize,
    offset: u64,
    tree_end: u64,
    blacklist: bool,
    /// Node offset visited at each bit position.
    history: Vec<u64>,
    hops: usize,
}

impl TrieWalk {
    pub fn new(schema: &FileSchema, literal: Literal) -> Self {
        let history = vec![0; literal.len() + 1];
        Self {
            literal,
            position: 0,
            offset: schema.root_offset(),
            tree_end: schema.tree_end,
            blacklist: schema.blacklist,
            history,
            hops: 0,
        }
    }

    /// Current bit position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Offset of the node the next step reads.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The literal as rewritten by any backtracking so far.
    pub fn literal(&self) -> &Literal {
        &self.literal
    }

    /// Steps taken so far, including backtracks.
    pub fn hops(&self) -> usize {
        self.hops
    }

    /// Read the current node and follow one pointer.
    pub fn step<R: ReadAt + ?Sized>(&mut self, source: &R) -> Result<Step> {
        if self.hops > MAX_HOPS {
            return Err(Error::TooManyHops);
        }
        self.hops += 1;

        self.history[self.position] = self.offset;
        if self.position >= self.literal.len() {
            return Err(Error::AddressExhausted);
        }

        let node = TrieNode::read(source, self.offset)?;
        let next = node.child(self.literal.is_set(self.position)) as u64;

        if next == 0 {
            if self.blacklist {
                return Err(Error::NotFound);
            }
            self.backtrack()?;
            return Ok(Step::Descending);
        }

        if next < self.tree_end {
            self.offset = next;
            self.position += 1;
            return Ok(Step::Descending);
        }

        Ok(Step::Resolved(next))
    }

    /// Return to the most recent right turn and take the left branch there.
    fn backtrack(&mut self) -> Result<()> {
        let ancestor = (0..=self.position)
            .rev()
            .find(|&p| self.literal.is_set(p))
            .ok_or(Error::NotFound)?;

        log::trace!(
            "Unassigned branch at bit {}, backtracking to bit {}",
            self.position,
            ancestor
        );

        self.literal.borrow_at(ancestor);
        self.position = ancestor;
        self.offset = self.history[ancestor];
        Ok(())
    }

    /// Step until the walk resolves or fails.
    pub fn run<R: ReadAt + ?Sized>(mut self, source: &R) -> Result<u64> {
        loop {
            if let Step::Resolved(offset) = self.step(source)? {
                return Ok(offset);
            }
        }
    }
}

/// Locate the record offset for `literal`.
pub fn locate<R: ReadAt + ?Sized>(source: &R, schema: &FileSchema, literal: Literal) -> Result<u64> {
    TrieWalk::new(schema, literal).run(source)
}
