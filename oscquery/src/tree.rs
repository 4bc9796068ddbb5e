//! Path-indexed parameter tree.
//!
//! Nodes are stored flat, keyed by their normalized full path, each entry
//! listing the names of its children. The nested [`OscQueryNode`] shape is
//! produced on demand, which is also when value getters run.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use shared::error::{Error, Result};

use crate::attributes::AccessValues;
use crate::node::{OscQueryNode, node_name, parent_path};
use crate::value::{OscValue, ValueProvider};

const ROOT_PATH: &str = "/";

#[derive(Debug, Clone, Default)]
struct Entry {
    description: Option<String>,
    access: AccessValues,
    osc_type: Option<String>,
    value: Option<Vec<OscValue>>,
    getter: Option<ValueProvider>,
    children: BTreeSet<String>,
}

/// Normalizes an OSC address: it must start with `/`, empty segments and
/// trailing slashes are dropped.
///
/// ```rust
/// use oscquery::normalize_path;
///
/// assert_eq!(normalize_path("/foo//bar/").unwrap(), "/foo/bar");
/// assert!(normalize_path("foo").is_err());
/// ```
pub fn normalize_path(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        return Err(Error::ErrInvalidPath(path.to_owned()));
    }
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        Ok(ROOT_PATH.to_owned())
    } else {
        Ok(format!("/{}", segments.join("/")))
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent == ROOT_PATH {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// The parameter namespace of one OSCQuery service.
#[derive(Debug, Clone)]
pub struct OscQueryTree {
    index: HashMap<String, Entry>,
}

impl Default for OscQueryTree {
    fn default() -> Self {
        let mut index = HashMap::new();
        index.insert(ROOT_PATH.to_owned(), Entry::default());
        Self { index }
    }
}

impl OscQueryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, creating missing ancestors as value-less containers.
    ///
    /// Fails with [`Error::ErrPathExists`] when the path is already in the
    /// tree; remove it first to replace it.
    pub fn add_node(
        &mut self,
        path: &str,
        access: AccessValues,
        osc_type: Option<&str>,
        value: Option<Vec<OscValue>>,
        description: Option<&str>,
    ) -> Result<OscQueryNode> {
        let path = normalize_path(path)?;
        if self.index.contains_key(&path) {
            return Err(Error::ErrPathExists(path));
        }

        self.insert(
            &path,
            Entry {
                description: description.map(str::to_owned),
                access,
                osc_type: osc_type.map(str::to_owned),
                value,
                ..Default::default()
            },
        );
        self.render(&path)
            .ok_or_else(|| Error::ErrPathNotFound(path.clone()))
    }

    /// Inserts `entry` at a normalized path, linking it and any missing
    /// ancestors into their parents.
    fn insert(&mut self, path: &str, entry: Entry) {
        let mut parent = ROOT_PATH.to_owned();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for (i, segment) in segments.iter().enumerate() {
            let current = child_path(&parent, segment);
            if let Some(p) = self.index.get_mut(&parent) {
                p.children.insert((*segment).to_owned());
            }
            if i + 1 == segments.len() {
                self.index.insert(current, entry);
                return;
            }
            if !self.index.contains_key(&current) {
                log::trace!("Creating container {current}");
                self.index.insert(current.clone(), Entry::default());
            }
            parent = current;
        }
    }

    /// Attaches a value getter to an existing node.
    pub fn set_getter(&mut self, path: &str, getter: ValueProvider) -> Result<()> {
        let path = normalize_path(path)?;
        let entry = self
            .index
            .get_mut(&path)
            .ok_or(Error::ErrPathNotFound(path.clone()))?;
        entry.getter = Some(getter);
        Ok(())
    }

    /// The node at `path` with its subtree, `None` when unknown.
    pub fn get_node_with_path(&self, path: &str) -> Option<OscQueryNode> {
        let path = normalize_path(path).ok()?;
        self.render(&path)
    }

    pub fn contains(&self, path: &str) -> bool {
        normalize_path(path)
            .map(|path| self.index.contains_key(&path))
            .unwrap_or(false)
    }

    /// Declared type of the node at `path`.
    pub fn osc_type(&self, path: &str) -> Option<String> {
        let path = normalize_path(path).ok()?;
        self.index.get(&path)?.osc_type.clone()
    }

    /// Removes a node and all its descendants. Ancestors stay.
    ///
    /// Returns false for unknown paths and for the root.
    pub fn remove_node(&mut self, path: &str) -> bool {
        let Ok(path) = normalize_path(path) else {
            return false;
        };
        if path == ROOT_PATH || !self.index.contains_key(&path) {
            return false;
        }

        if let Some(parent) = self.index.get_mut(parent_path(&path)) {
            parent.children.remove(node_name(&path));
        }

        let mut pending = vec![path];
        while let Some(current) = pending.pop() {
            if let Some(entry) = self.index.remove(&current) {
                pending.extend(
                    entry
                        .children
                        .iter()
                        .map(|name| child_path(&current, name)),
                );
            }
        }
        true
    }

    /// Sets the value of a node, creating a bare untyped node (and its
    /// ancestors) when the path is unknown.
    pub fn set_value(&mut self, path: &str, value: Vec<OscValue>) -> Result<()> {
        let path = normalize_path(path)?;
        if let Some(entry) = self.index.get_mut(&path) {
            entry.value = Some(value);
            return Ok(());
        }

        log::debug!("Creating bare node {path} for late value");
        self.insert(
            &path,
            Entry {
                value: Some(value),
                ..Default::default()
            },
        );
        Ok(())
    }

    /// The root node with the whole namespace below it.
    pub fn root(&self) -> OscQueryNode {
        self.render(ROOT_PATH)
            .unwrap_or_else(|| OscQueryNode::new(ROOT_PATH))
    }

    /// Number of nodes, the root included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.len() <= 1
    }

    /// Every path in the tree, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.index.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn render(&self, path: &str) -> Option<OscQueryNode> {
        let entry = self.index.get(path)?;

        let value = match &entry.getter {
            Some(getter) => Some(getter.get()),
            None => entry.value.clone(),
        };

        let contents = if entry.children.is_empty() && path != ROOT_PATH {
            None
        } else {
            let mut contents = BTreeMap::new();
            for name in &entry.children {
                if let Some(child) = self.render(&child_path(path, name)) {
                    contents.insert(name.clone(), child);
                }
            }
            Some(contents)
        };

        Some(OscQueryNode {
            description: entry.description.clone(),
            full_path: path.to_owned(),
            access: entry.access,
            contents,
            osc_type: entry.osc_type.clone(),
            value,
        })
    }

    /// Rebuilds a tree, index included, from a deserialized root node.
    ///
    /// Child paths are derived from their parent path and their key in
    /// `CONTENTS`.
    pub fn from_root(root: OscQueryNode) -> Result<Self> {
        let root_path = normalize_path(&root.full_path)?;
        if root_path != ROOT_PATH {
            return Err(Error::ErrInvalidPath(root.full_path));
        }

        let mut tree = OscQueryTree {
            index: HashMap::new(),
        };
        let mut pending = vec![(ROOT_PATH.to_owned(), root)];
        while let Some((path, node)) = pending.pop() {
            let mut children = BTreeSet::new();
            for (name, child) in node.contents.into_iter().flatten() {
                if name.is_empty() || name.contains('/') {
                    log::warn!("Skipping child with invalid name {name:?} under {path}");
                    continue;
                }
                if child.full_path != child_path(&path, &name) {
                    log::debug!(
                        "Child {name} of {path} claims path {}, using derived path",
                        child.full_path
                    );
                }
                pending.push((child_path(&path, &name), child));
                children.insert(name);
            }
            tree.index.insert(
                path,
                Entry {
                    description: node.description,
                    access: node.access,
                    osc_type: node.osc_type,
                    value: node.value,
                    getter: None,
                    children,
                },
            );
        }
        Ok(tree)
    }

    /// Parses a JSON tree as served at `/`.
    pub fn from_json(json: &str) -> Result<Self> {
        let root: OscQueryNode = serde_json::from_str(json)?;
        Self::from_root(root)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.root())?)
    }
}

#[cfg(test)]
#[path = "tree_test.rs"]
mod tree_test;
