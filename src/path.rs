use std::fmt::Display;

#[derive(Clone, Debug, PartialEq, Default)]
/// Tag names from the document root down to the node being visited
pub struct NodePath {
    components: Vec<String>,
}

impl Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for component in self.components.iter() {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl NodePath {
    pub fn push(&mut self, tag: impl Into<String>) {
        self.components.push(tag.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.components.pop()
    }

    pub fn tags(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.components.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Tag of the node being visited
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Tag of the parent of the node being visited
    pub fn parent(&self) -> Option<&str> {
        self.components
            .len()
            .checked_sub(2)
            .and_then(|i| self.components.get(i))
            .map(|s| s.as_str())
    }

    /// Is there an ancestor (excluding the node itself) with this tag?
    pub fn has_ancestor(&self, tag: &str) -> bool {
        self.components
            .iter()
            .rev()
            .skip(1)
            .any(|component| component == tag)
    }
}

/// The pattern a rule is registered under. A very small subset of XPath:
///
/// * `persname` matches that tag at any depth
/// * `controlaccess/persname` matches when the path ends with these tags
/// * `/ead/archdesc` is anchored at the document root and must match the full path
/// * `*` matches any single tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    anchored: bool,
    segments: Vec<String>,
}

impl Pattern {
    pub fn new(expression: &str) -> Self {
        let expression = expression.trim();
        Self {
            anchored: expression.starts_with('/'),
            segments: expression
                .trim_start_matches('/')
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Matches a node path against this pattern
    pub fn test(&self, path: &NodePath) -> bool {
        if self.segments.is_empty() || self.segments.len() > path.len() {
            return false;
        }
        if self.anchored && self.segments.len() != path.len() {
            return false;
        }
        self.segments
            .iter()
            .rev()
            .zip(path.tags().rev())
            .all(|(pat, tag)| pat == "*" || pat == tag)
    }

    /// Ordering key for dispatch: anchored patterns first, then the number of
    /// literal tags, then the overall length.
    pub fn specificity(&self) -> (bool, usize, usize) {
        (
            self.anchored,
            self.segments.iter().filter(|s| s.as_str() != "*").count(),
            self.segments.len(),
        )
    }

    /// Bare tag patterns return their tag
    pub fn tag(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [tag] if !self.anchored && tag != "*" => Some(tag.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for Pattern {
    fn from(expression: &str) -> Self {
        Self::new(expression)
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.anchored {
            f.write_str("/")?;
        }
        f.write_str(&self.segments.join("/"))
    }
}
