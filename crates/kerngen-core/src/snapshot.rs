use crate::ir::{NodeId, NodeKind, ScheduleRoot};
use crate::navigate::format_path;
use crate::schedule::Schedule;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Owned, serializable copy of a schedule subtree for back-end writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub path: String,
    #[serde(flatten)]
    pub node: NodeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(NodeSnapshot::count).sum::<usize>()
    }
}

impl Schedule {
    pub fn snapshot(&self) -> NodeSnapshot {
        let root = NodeKind::Schedule(ScheduleRoot {
            invoke: self.invoke().to_string(),
        });
        NodeSnapshot {
            path: String::new(),
            node: root,
            children: self.snapshot_children(self.root(), &mut Vec::new()),
        }
    }

    fn snapshot_children(&self, id: NodeId, path: &mut Vec<usize>) -> Vec<NodeSnapshot> {
        let mut children = Vec::with_capacity(self.children(id).len());
        for (index, child) in self.children(id).iter().enumerate() {
            let Some(kind) = self.kind(*child) else {
                continue;
            };
            path.push(index);
            children.push(NodeSnapshot {
                path: format_path(path),
                node: kind.clone(),
                children: self.snapshot_children(*child, path),
            });
            path.pop();
        }
        children
    }
}

/// Hex sha256 of the tree shape and node attributes. Node ids do not
/// contribute, so two copies transformed the same way share a fingerprint.
pub fn fingerprint(schedule: &Schedule) -> String {
    let mut hasher = Sha256::new();
    let mut stack = vec![(schedule.root(), 0usize)];
    while let Some((id, depth)) = stack.pop() {
        if let Some(kind) = schedule.kind(id) {
            hasher.update(format!("{depth}:{kind:?}\n").as_bytes());
        }
        for child in schedule.children(id).iter().rev() {
            stack.push((*child, depth + 1));
        }
    }
    hex::encode(hasher.finalize())
}
