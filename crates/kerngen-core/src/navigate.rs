use crate::ir::{NodeId, NodeKind, NodeTag};
use crate::schedule::Schedule;

/// Lazy depth-first (pre-order) traversal. Each call to [`Schedule::walk`]
/// starts over from the current tree.
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    schedule: &'a Schedule,
    stack: Vec<NodeId>,
    filter: Option<NodeTag>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.stack.pop() {
            let children = self.schedule.children(id);
            self.stack.extend(children.iter().rev().copied());
            let matches = match (self.filter, self.schedule.kind(id)) {
                (None, Some(_)) => true,
                (Some(tag), Some(kind)) => kind.tag() == tag,
                (_, None) => false,
            };
            if matches {
                return Some(id);
            }
        }
        None
    }
}

impl Schedule {
    pub fn walk(&self, filter: Option<NodeTag>) -> Walk<'_> {
        self.walk_from(self.root(), filter)
    }

    /// Walks the subtree rooted at `start`, `start` included.
    pub fn walk_from(&self, start: NodeId, filter: Option<NodeTag>) -> Walk<'_> {
        let stack = if self.contains(start) {
            vec![start]
        } else {
            Vec::new()
        };
        Walk {
            schedule: self,
            stack,
            filter,
        }
    }

    /// Strict descendants of `id` matching `filter`.
    pub fn descendants(&self, id: NodeId, filter: Option<NodeTag>) -> Walk<'_> {
        Walk {
            schedule: self,
            stack: self.children(id).iter().rev().copied().collect(),
            filter,
        }
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |node| self.parent(*node))
    }

    /// Nearest strict ancestor of the given kind.
    pub fn ancestor(&self, id: NodeId, tag: NodeTag) -> Option<NodeId> {
        self.ancestors(id)
            .find(|node| self.kind(*node).map(NodeKind::tag) == Some(tag))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let position = self.position(id)?;
        self.child(parent, position + 1)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let position = self.position(id)?;
        position
            .checked_sub(1)
            .and_then(|index| self.child(parent, index))
    }

    /// Depth of the loop nest rooted at `id`: zero for statements without
    /// loops, one for a loop with no inner loop, and so on.
    pub fn loop_depth(&self, id: NodeId) -> usize {
        let own = usize::from(matches!(self.kind(id), Some(NodeKind::Loop(_))));
        let inner = self
            .children(id)
            .iter()
            .map(|child| self.loop_depth(*child))
            .max()
            .unwrap_or(0);
        own + inner
    }

    pub fn node_at_path(&self, path: &[usize]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root(), |node, index| self.child(node, *index))
    }

    pub fn path_of(&self, id: NodeId) -> Option<Vec<usize>> {
        if !self.contains(id) {
            return None;
        }
        let mut path = Vec::new();
        let mut current = id;
        while current != self.root() {
            path.push(self.position(current)?);
            current = self.parent(current)?;
        }
        path.reverse();
        Some(path)
    }

    /// Resolves a dotted child-index path such as `"0.1"`. The empty string
    /// names the root.
    pub fn resolve(&self, path: &str) -> Option<NodeId> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Some(self.root());
        }
        let indices = trimmed
            .split('.')
            .map(|part| part.trim().parse::<usize>().ok())
            .collect::<Option<Vec<_>>>()?;
        self.node_at_path(&indices)
    }
}

pub fn format_path(path: &[usize]) -> String {
    path.iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(".")
}
