//! Comments bound to nodes by identity.

use std::collections::BTreeMap;

use crate::{NodeId, TextRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentKind {
    Line,
    Block,
    Doc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub kind: CommentKind,
    pub text: String,
    /// Position in the source the comment was parsed from.
    pub range: TextRange,
}

impl Comment {
    pub fn is_line(&self) -> bool {
        self.kind == CommentKind::Line
    }
}

/// Comments attached to one node.
///
/// `leading` precede the node on their own lines, `trailing` follow it on the
/// same line, `dangling` sit inside the node's body after its last member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trivia {
    pub leading: Vec<Comment>,
    pub trailing: Vec<Comment>,
    pub dangling: Vec<Comment>,
}

impl Trivia {
    pub fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.trailing.is_empty() && self.dangling.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriviaTable {
    entries: BTreeMap<NodeId, Trivia>,
}

impl TriviaTable {
    pub fn get(&self, id: NodeId) -> Option<&Trivia> {
        self.entries.get(&id)
    }

    pub fn leading(&self, id: NodeId) -> &[Comment] {
        self.get(id).map_or(&[], |t| t.leading.as_slice())
    }

    pub fn trailing(&self, id: NodeId) -> &[Comment] {
        self.get(id).map_or(&[], |t| t.trailing.as_slice())
    }

    pub fn dangling(&self, id: NodeId) -> &[Comment] {
        self.get(id).map_or(&[], |t| t.dangling.as_slice())
    }

    /// Replace the trivia of `id`. Empty trivia removes the entry.
    pub fn insert(&mut self, id: NodeId, trivia: Trivia) {
        if trivia.is_empty() {
            self.entries.remove(&id);
        } else {
            self.entries.insert(id, trivia);
        }
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Trivia> {
        self.entries.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Trivia)> {
        self.entries.iter().map(|(id, t)| (*id, t))
    }
}
