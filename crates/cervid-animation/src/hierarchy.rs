//! Read-only node graph of a loaded model.
//!
//! Nodes live in an arena and always appear after their parent, so a single
//! forward pass visits every parent before its children.

use cervid_core::{CervidError, Result};
use glam::Mat4;

/// Strips the model-specific prefix (everything up to and including the
/// first `_`) from a raw node name.
pub fn bone_name(raw: &str) -> &str {
    match raw.find('_') {
        Some(pos) => &raw[pos + 1..],
        None => raw,
    }
}

#[derive(Debug, Clone)]
pub struct HierarchyNode {
    /// Raw name as imported, prefix included.
    pub name: String,
    /// Rest transform relative to the parent node.
    pub transform: Mat4,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl HierarchyNode {
    pub fn bone_name(&self) -> &str {
        bone_name(&self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoneHierarchy {
    nodes: Vec<HierarchyNode>,
}

impl BoneHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node. The first node is the root; every later node needs an
    /// existing parent.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        transform: Mat4,
    ) -> Result<usize> {
        let index = self.nodes.len();
        match parent {
            Some(p) if p >= index => {
                return Err(CervidError::InvalidConfiguration(format!(
                    "parent index {p} out of range for node {index}"
                )))
            }
            None if index > 0 => {
                return Err(CervidError::InvalidConfiguration(
                    "hierarchy already has a root".to_string(),
                ))
            }
            Some(p) => self.nodes[p].children.push(index),
            None => {}
        }

        self.nodes.push(HierarchyNode {
            name: name.into(),
            transform,
            parent,
            children: Vec::new(),
        });
        Ok(index)
    }

    pub fn root(&self) -> Option<usize> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    pub fn node(&self, index: usize) -> Option<&HierarchyNode> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[HierarchyNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node whose processed name equals `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.bone_name() == name)
    }

    /// Inverse of the root transform; maps the model's world into the space
    /// the skeleton is posed in.
    pub fn global_inverse(&self) -> Mat4 {
        self.nodes
            .first()
            .map(|root| root.transform.inverse())
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Rest-pose model-space transform of every node.
    pub fn world_transforms(&self) -> Vec<Mat4> {
        let mut accumulated = vec![Mat4::IDENTITY; self.nodes.len()];

        for (i, node) in self.nodes.iter().enumerate() {
            let parent_matrix = node
                .parent
                .map(|p| accumulated[p])
                .unwrap_or(Mat4::IDENTITY);

            accumulated[i] = parent_matrix * node.transform;
        }

        let global_inverse = self.global_inverse();
        accumulated
            .into_iter()
            .map(|m| global_inverse * m)
            .collect()
    }

    /// Pre-order `(node, depth)` pairs, children in insertion order.
    pub fn depth_first(&self) -> Vec<(usize, usize)> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, usize)> = self.root().map(|r| (r, 0)).into_iter().collect();

        while let Some((node, depth)) = stack.pop() {
            order.push((node, depth));
            for &child in self.nodes[node].children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }

        order
    }

    /// Node indices from the node named `end` up to and including the
    /// nearest ancestor-or-self named `start`, end-effector first.
    ///
    /// Names are compared after [`bone_name`] processing. Returns `None` when
    /// no `end` node has `start` on its path to the root.
    pub fn find_chain(&self, start: &str, end: &str) -> Option<Vec<usize>> {
        let root = self.root()?;
        // (node, index of the next child to visit)
        let mut path: Vec<(usize, usize)> = Vec::new();
        let mut pending = Some(root);

        loop {
            if let Some(node) = pending.take() {
                path.push((node, 0));
                if self.nodes[node].bone_name() == end {
                    if let Some(chain) = self.collect_chain(&path, start) {
                        return Some(chain);
                    }
                }
            }

            let (node, cursor) = path.last_mut()?;
            match self.nodes[*node].children.get(*cursor) {
                Some(&child) => {
                    *cursor += 1;
                    pending = Some(child);
                }
                None => {
                    path.pop();
                }
            }
        }
    }

    fn collect_chain(&self, path: &[(usize, usize)], start: &str) -> Option<Vec<usize>> {
        let mut chain = Vec::new();
        for &(node, _) in path.iter().rev() {
            chain.push(node);
            if self.nodes[node].bone_name() == start {
                return Some(chain);
            }
        }
        None
    }
}
