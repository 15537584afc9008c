//! The house tree — a declarative description of every device the runtime
//! should keep alive.
//!
//! Applications rebuild the whole tree from the model on every change; the
//! runtime diffs the new tree against the previously applied one and invokes
//! device lifecycle hooks only where something differs. A device's identity
//! is its position: the chain of container keys plus its own key.

use serde::Serialize;

/// A device specification carried by a leaf node.
///
/// Applications define one closed enum covering every device kind they use
/// and implement this trait on it. [`kind`](Self::kind) returns the registry
/// tag the runtime uses to pick the handler for a leaf.
pub trait DeviceSpec:
    Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static
{
    fn kind(&self) -> &'static str;
}

/// One node of the house tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node<D> {
    /// An interior grouping (a room, a floor, the whole house).
    Container(Container<D>),
    /// A leaf bound to a physical or virtual device.
    Device(DeviceNode<D>),
}

impl<D> Node<D> {
    /// Build a device leaf.
    #[must_use]
    pub fn device(key: impl Into<String>, spec: D) -> Self {
        Self::Device(DeviceNode {
            key: key.into(),
            spec,
        })
    }

    /// The node's key, unique among its siblings.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Container(container) => &container.key,
            Self::Device(device) => &device.key,
        }
    }

    #[must_use]
    pub fn as_container(&self) -> Option<&Container<D>> {
        match self {
            Self::Container(container) => Some(container),
            Self::Device(_) => None,
        }
    }

    #[must_use]
    pub fn as_device(&self) -> Option<&DeviceNode<D>> {
        match self {
            Self::Device(device) => Some(device),
            Self::Container(_) => None,
        }
    }
}

impl<D> From<Container<D>> for Node<D> {
    fn from(container: Container<D>) -> Self {
        Self::Container(container)
    }
}

impl<D> From<DeviceNode<D>> for Node<D> {
    fn from(device: DeviceNode<D>) -> Self {
        Self::Device(device)
    }
}

/// An interior node holding an ordered list of children.
///
/// Child order is preserved: lifecycle hooks run in the order children are
/// declared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Container<D> {
    pub key: String,
    pub children: Vec<Node<D>>,
}

impl<D> Container<D> {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            children: Vec::new(),
        }
    }

    /// The empty tree. Reconciling against it adds everything; reconciling
    /// it against a previous tree removes everything.
    #[must_use]
    pub fn empty() -> Self {
        Self::new("")
    }

    /// Append a child node.
    #[must_use]
    pub fn child(mut self, node: impl Into<Node<D>>) -> Self {
        self.children.push(node.into());
        self
    }

    /// Append a child when present; absent entries simply do not exist in
    /// the tree (there is no tombstone).
    #[must_use]
    pub fn maybe(mut self, node: Option<impl Into<Node<D>>>) -> Self {
        if let Some(node) = node {
            self.children.push(node.into());
        }
        self
    }

    /// Append every node from an iterator.
    #[must_use]
    pub fn children(mut self, nodes: impl IntoIterator<Item = Node<D>>) -> Self {
        self.children.extend(nodes);
        self
    }

    /// Find a direct child by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Node<D>> {
        self.children.iter().find(|node| node.key() == key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A leaf node binding a key to a device specification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceNode<D> {
    pub key: String,
    pub spec: D,
}

impl<D: DeviceSpec> DeviceNode<D> {
    /// The registry tag of the underlying spec.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.spec.kind()
    }
}
