use crate::error::{Error, Result};
use crate::ir::{NodeData, NodeId, NodeKind, ScheduleRoot};
use std::ops::Index;

/// The IR of one invocation.
///
/// Nodes live in an arena owned by the schedule. Parent, child and position
/// links are arena indices; a node is owned by exactly one parent's child
/// list, and `children(parent)[position(node)] == node` holds between any
/// two public calls.
#[derive(Debug, Clone)]
pub struct Schedule {
    nodes: Vec<Option<NodeData>>,
    root: NodeId,
}

impl Schedule {
    pub fn new(invoke: impl Into<String>) -> Self {
        let root = NodeData {
            kind: NodeKind::Schedule(ScheduleRoot {
                invoke: invoke.into(),
            }),
            parent: None,
            position: 0,
            children: Vec::new(),
        };
        Self {
            nodes: vec![Some(root)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn invoke(&self) -> &str {
        match self.kind(self.root) {
            Some(NodeKind::Schedule(root)) => &root.invoke,
            _ => "",
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.data(id).is_some()
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.data(id).map(|data| &data.kind)
    }

    pub(crate) fn kind_mut(&mut self, id: NodeId) -> Option<&mut NodeKind> {
        self.data_mut(id).map(|data| &mut data.kind)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.data(id)
            .map(|data| data.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).and_then(|data| data.parent)
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.data(id)
            .filter(|data| data.parent.is_some())
            .map(|data| data.position)
    }

    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Creates an unparented node. It must be inserted or discarded before
    /// the surrounding tree edit completes.
    pub fn create(&mut self, kind: NodeKind) -> Result<NodeId> {
        if matches!(kind, NodeKind::Schedule(_)) {
            return Err(Error::structural("a schedule has exactly one root node"));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(NodeData {
            kind,
            parent: None,
            position: 0,
            children: Vec::new(),
        }));
        Ok(id)
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.check_insertable(parent, child)?;
        let len = self.children(parent).len();
        if index > len {
            return Err(Error::structural(format!(
                "insert position {index} out of range for {parent} with {len} children"
            )));
        }
        let parent_data = self.require_mut(parent)?;
        parent_data.children.insert(index, child);
        self.require_mut(child)?.parent = Some(parent);
        self.reindex(parent)
    }

    pub fn push_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child)
    }

    /// Removes `id` from its parent's children. The node keeps its own
    /// subtree and may be re-inserted elsewhere.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let parent = self
            .require(id)?
            .parent
            .ok_or_else(|| Error::structural(format!("{id} has no parent to detach from")))?;
        let position = self.require(id)?.position;
        let parent_data = self.require_mut(parent)?;
        if parent_data.children.get(position) != Some(&id) {
            return Err(Error::structural(format!(
                "{id} is not at position {position} of {parent}"
            )));
        }
        parent_data.children.remove(position);
        let data = self.require_mut(id)?;
        data.parent = None;
        data.position = 0;
        self.reindex(parent)
    }

    /// Puts `node` at `index` of `parent` and returns the detached previous
    /// occupant.
    pub fn set_child_at(&mut self, parent: NodeId, index: usize, node: NodeId) -> Result<NodeId> {
        self.check_insertable(parent, node)?;
        let old = self
            .children(parent)
            .get(index)
            .copied()
            .ok_or_else(|| {
                Error::structural(format!("{parent} has no child at position {index}"))
            })?;
        if self.is_ancestor(old, parent) || old == parent {
            return Err(Error::structural(format!(
                "{old} cannot be replaced from inside its own subtree"
            )));
        }
        self.require_mut(parent)?.children[index] = node;
        let old_data = self.require_mut(old)?;
        old_data.parent = None;
        old_data.position = 0;
        self.require_mut(node)?.parent = Some(parent);
        self.reindex(parent)?;
        Ok(old)
    }

    /// Swaps `old` for the unparented `new` at the same position. `new`
    /// keeps its children unchanged; `old` is left detached.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let parent = self
            .parent(old)
            .ok_or_else(|| Error::structural(format!("{old} has no parent to replace in")))?;
        let position = self.require(old)?.position;
        self.set_child_at(parent, position, new).map(|_| ())
    }

    /// Frees an unparented node and its whole subtree.
    pub fn discard(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(Error::structural("the schedule root cannot be discarded"));
        }
        if self.require(id)?.parent.is_some() {
            return Err(Error::structural(format!(
                "{id} must be detached before it is discarded"
            )));
        }
        let mut pending = vec![id];
        while let Some(node) = pending.pop() {
            if let Some(data) = self.nodes.get_mut(node.0).and_then(Option::take) {
                pending.extend(data.children);
            }
        }
        Ok(())
    }

    /// Checks every structural invariant of the tree.
    pub fn verify(&self) -> Result<()> {
        let mut reachable = vec![false; self.nodes.len()];
        let mut pending = vec![self.root];
        while let Some(id) = pending.pop() {
            let data = self.require(id)?;
            if reachable[id.0] {
                return Err(Error::structural(format!("{id} is reachable twice")));
            }
            reachable[id.0] = true;
            match &data.kind {
                NodeKind::Loop(_) if data.children.is_empty() => {
                    return Err(Error::structural(format!("loop {id} has an empty body")));
                }
                NodeKind::Directive(_) if data.children.is_empty() => {
                    return Err(Error::structural(format!(
                        "directive {id} has an empty region"
                    )));
                }
                kind if kind.is_leaf() && !data.children.is_empty() => {
                    return Err(Error::structural(format!("leaf {id} has children")));
                }
                NodeKind::Schedule(_) if id != self.root => {
                    return Err(Error::structural(format!("{id} is a nested schedule root")));
                }
                _ => {}
            }
            for (index, child) in data.children.iter().enumerate() {
                let child_data = self.require(*child)?;
                if child_data.parent != Some(id) || child_data.position != index {
                    return Err(Error::structural(format!(
                        "{child} is listed at position {index} of {id} but records parent {:?} position {}",
                        child_data.parent, child_data.position
                    )));
                }
                pending.push(*child);
            }
        }
        for (index, slot) in self.nodes.iter().enumerate() {
            if let Some(data) = slot {
                if !reachable[index] && data.parent.is_some() {
                    return Err(Error::structural(format!(
                        "#{index} has a parent but is not reachable from the root"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Ids of nodes that are alive but not attached to the tree.
    pub fn orphans(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Some(data) if data.parent.is_none() && NodeId(index) != self.root => {
                    Some(NodeId(index))
                }
                _ => None,
            })
            .collect()
    }

    pub(crate) fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn require(&self, id: NodeId) -> Result<&NodeData> {
        self.data(id)
            .ok_or_else(|| Error::structural(format!("unknown node {id}")))
    }

    fn require_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.data_mut(id)
            .ok_or_else(|| Error::structural(format!("unknown node {id}")))
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_data = self.require(parent)?;
        if parent_data.kind.is_leaf() {
            return Err(Error::structural(format!(
                "{parent} is a {} and cannot own children",
                parent_data.kind.tag().as_str()
            )));
        }
        let child_data = self.require(child)?;
        if child == self.root {
            return Err(Error::structural("the schedule root cannot be re-parented"));
        }
        if let Some(owner) = child_data.parent {
            return Err(Error::structural(format!(
                "{child} is already a child of {owner}"
            )));
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(Error::structural(format!(
                "inserting {child} under {parent} would create a cycle"
            )));
        }
        Ok(())
    }

    fn reindex(&mut self, parent: NodeId) -> Result<()> {
        let children = self.require(parent)?.children.clone();
        for (index, child) in children.into_iter().enumerate() {
            self.require_mut(child)?.position = index;
        }
        Ok(())
    }
}

impl Index<usize> for Schedule {
    type Output = NodeId;

    fn index(&self, index: usize) -> &NodeId {
        &self.children(self.root)[index]
    }
}
