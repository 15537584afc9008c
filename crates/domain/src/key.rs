//! Hierarchical keys addressing positions in the house tree.
//!
//! Timers and topic subscriptions are registered under the full path of the
//! node that owns them, so two devices with the same local key in different
//! rooms never collide.

/// Immutable path of container keys from the tree root.
///
/// [`push`](Self::push) returns an extended copy; existing paths are never
/// mutated, so a context handed to a child scope cannot affect its parent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// The empty path at the tree root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Return a new path with `segment` appended.
    #[must_use]
    pub fn push(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Render the full registry key for a leaf under this path.
    ///
    /// Segments are joined with `.`; at the root the leaf stands alone.
    #[must_use]
    pub fn join(&self, leaf: &str) -> String {
        if self.segments.is_empty() {
            leaf.to_string()
        } else {
            format!("{}.{leaf}", self.segments.join("."))
        }
    }

    /// The path segments, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl std::fmt::Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}
