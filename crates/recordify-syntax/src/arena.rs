use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node in a [`SyntaxTree`](crate::SyntaxTree).
///
/// Ids are stable across [`TreeBuilder::fork`](crate::TreeBuilder::fork): a
/// node that survives a transform keeps the id it had in the input tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn from_raw(raw: u32) -> Self {
        NodeId(raw)
    }

    #[must_use]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Append-only node storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arena<T> {
    data: Vec<T>,
}

impl<T> Arena<T> {
    pub fn alloc(&mut self, value: T) -> NodeId {
        let idx = self.data.len() as u32;
        self.data.push(value);
        NodeId::from_raw(idx)
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.data.get(id.idx())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (NodeId::from_raw(i as u32), v))
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena { data: Vec::new() }
    }
}

impl<T> std::ops::Index<NodeId> for Arena<T> {
    type Output = T;

    fn index(&self, index: NodeId) -> &Self::Output {
        &self.data[index.idx()]
    }
}
