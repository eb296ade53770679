use std::collections::BTreeMap;

use fieldlens_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Ambient page information used when markup alone cannot name the object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageContext {
    /// URL path component, e.g. `/lightning/r/WorkOrder/0WO5g000000abcd/view`.
    pub path: String,
    /// Full URL including query and fragment.
    pub full_url: String,
    /// Document title.
    pub title: String,
}

impl PageContext {
    /// Creates a page context from already split components.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        full_url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            full_url: full_url.into(),
            title: title.into(),
        }
    }

    /// Parses a full page URL and pairs it with the document title.
    pub fn from_url(full_url: &str, title: impl Into<String>) -> AppResult<Self> {
        let parsed = Url::parse(full_url).map_err(|error| {
            AppError::Validation(format!("invalid page url '{full_url}': {error}"))
        })?;

        Ok(Self {
            path: parsed.path().to_owned(),
            full_url: parsed.as_str().to_owned(),
            title: title.into(),
        })
    }

    /// Returns the host portion of the full URL, if any.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        Url::parse(self.full_url.as_str())
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned))
    }
}

/// Serializable element snapshot handed over by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DomElement {
    /// Tag name, matched case-insensitively.
    pub tag: String,
    /// Element attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Child elements in document order.
    #[serde(default)]
    pub children: Vec<DomElement>,
}

impl DomElement {
    /// Creates an element without attributes or children.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Appends a child element.
    #[must_use]
    pub fn with_child(mut self, child: DomElement) -> Self {
        self.children.push(child);
        self
    }
}

/// Stable identity of an element inside one [`DomTree`].
///
/// Ids follow document order, so sorting them sorts elements the way they
/// appear on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the document-order index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct DomNode {
    tag: String,
    attributes: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    subtree_end: usize,
}

/// Read-only element tree flattened in document order.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<DomNode>,
}

impl DomTree {
    /// Flattens an element snapshot into an addressable tree.
    #[must_use]
    pub fn from_root(root: DomElement) -> Self {
        let mut nodes = Vec::new();
        push_node(&mut nodes, root, None);
        Self { nodes }
    }

    /// Returns the root element.
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Returns the number of elements in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the tree is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the lower-cased tag name of an element.
    #[must_use]
    pub fn tag(&self, node: NodeId) -> &str {
        self.nodes
            .get(node.0)
            .map(|value| value.tag.as_str())
            .unwrap_or_default()
    }

    /// Returns whether the element has the given tag.
    #[must_use]
    pub fn is_tag(&self, node: NodeId, tag: &str) -> bool {
        self.tag(node).eq_ignore_ascii_case(tag)
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(node.0)
            .and_then(|value| value.attributes.get(name))
            .map(String::as_str)
    }

    /// Returns whether the element carries the attribute, even with an empty value.
    #[must_use]
    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// Returns whether the element's `class` list contains `class_name`.
    #[must_use]
    pub fn has_class(&self, node: NodeId, class_name: &str) -> bool {
        self.attribute(node, "class")
            .map(|classes| classes.split_ascii_whitespace().any(|value| value == class_name))
            .unwrap_or(false)
    }

    /// Returns the parent element.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|value| value.parent)
    }

    /// Returns the direct children of an element.
    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|value| value.children.as_slice())
            .unwrap_or_default()
    }

    /// Iterates over the ancestors of an element, nearest first.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), |current| self.parent(*current))
    }

    /// Iterates over the descendants of an element in document order.
    pub fn descendants(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let end = self
            .nodes
            .get(node.0)
            .map(|value| value.subtree_end)
            .unwrap_or(node.0);
        (node.0.saturating_add(1)..end).map(NodeId)
    }

    /// Returns whether `node` sits strictly below `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.nodes
            .get(ancestor.0)
            .map(|value| ancestor.0 < node.0 && node.0 < value.subtree_end)
            .unwrap_or(false)
    }

    /// Returns the element itself or its nearest ancestor matching `predicate`.
    pub fn closest(
        &self,
        node: NodeId,
        mut predicate: impl FnMut(&Self, NodeId) -> bool,
    ) -> Option<NodeId> {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .find(|candidate| predicate(self, *candidate))
    }

    /// Returns the first descendant matching `predicate`.
    pub fn find_descendant(
        &self,
        node: NodeId,
        mut predicate: impl FnMut(&Self, NodeId) -> bool,
    ) -> Option<NodeId> {
        self.descendants(node)
            .find(|candidate| predicate(self, *candidate))
    }
}

fn push_node(nodes: &mut Vec<DomNode>, element: DomElement, parent: Option<NodeId>) -> NodeId {
    let id = NodeId(nodes.len());
    nodes.push(DomNode {
        tag: element.tag.to_ascii_lowercase(),
        attributes: element.attributes,
        parent,
        children: Vec::new(),
        subtree_end: id.0.saturating_add(1),
    });

    let mut children = Vec::with_capacity(element.children.len());
    for child in element.children {
        children.push(push_node(nodes, child, Some(id)));
    }

    let subtree_end = nodes.len();
    if let Some(node) = nodes.get_mut(id.0) {
        node.children = children;
        node.subtree_end = subtree_end;
    }

    id
}

#[cfg(test)]
mod tests {
    use super::{DomElement, DomTree, PageContext};

    fn sample_tree() -> DomTree {
        DomTree::from_root(
            DomElement::new("body").with_child(
                DomElement::new("FLEXIPAGE-FIELD")
                    .with_attribute("data-field-id", "RecordStatusField")
                    .with_child(
                        DomElement::new("span")
                            .with_attribute("class", "test-id__field-label extra"),
                    )
                    .with_child(DomElement::new("lightning-input")),
            ),
        )
    }

    #[test]
    fn tree_is_flattened_in_document_order() {
        let tree = sample_tree();
        let root = tree.root();
        let order: Vec<&str> = std::iter::once(root)
            .chain(tree.descendants(root))
            .map(|node| tree.tag(node))
            .collect();

        assert_eq!(order, vec!["body", "flexipage-field", "span", "lightning-input"]);
    }

    #[test]
    fn closest_includes_the_element_itself() {
        let tree = sample_tree();
        let input = tree
            .find_descendant(tree.root(), |tree, node| tree.is_tag(node, "lightning-input"));
        assert!(input.is_some());
        let input = input.unwrap_or(tree.root());

        let container = tree.closest(input, |tree, node| tree.is_tag(node, "flexipage-field"));
        assert_eq!(container, tree.parent(input));
        assert_eq!(tree.closest(input, |tree, node| tree.is_tag(node, "lightning-input")), Some(input));
    }

    #[test]
    fn class_matching_is_token_based() {
        let tree = sample_tree();
        let label = tree.find_descendant(tree.root(), |tree, node| tree.is_tag(node, "span"));
        assert!(label.is_some_and(|node| tree.has_class(node, "test-id__field-label")));
        assert!(!label.is_some_and(|node| tree.has_class(node, "test-id")));
    }

    #[test]
    fn page_context_keeps_fragment_in_full_url() {
        let page = PageContext::from_url(
            "https://acme.lightning.force.com/one/one.app#/sObject/Case/view",
            "Case | Salesforce",
        );
        assert!(page.is_ok());
        let page = page.unwrap_or_default();
        assert_eq!(page.path, "/one/one.app");
        assert!(page.full_url.ends_with("#/sObject/Case/view"));
        assert_eq!(page.host().as_deref(), Some("acme.lightning.force.com"));
    }
}
