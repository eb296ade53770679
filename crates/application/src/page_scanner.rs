use std::collections::BTreeSet;

use fieldlens_domain::{DomTree, FieldIdentity, NodeId, PageContext};
use serde::Serialize;
use tracing::debug;

use crate::field_resolver::{
    FIELD_CONTAINER_TAG, SELECTION_TARGET_ATTRIBUTE, is_field_container, resolve_field_identity,
};

const FIELD_LABEL_CLASS: &str = "test-id__field-label";
const FORM_ELEMENT_CLASS: &str = "slds-form-element";
const FORM_ELEMENT_LABEL_CLASS: &str = "slds-form-element__label";
const CHECKBOX_LABEL_CLASS: &str = "slds-checkbox__label";

/// Element shapes that may represent a field on a record page.
#[derive(Debug, Clone, Copy)]
enum FieldSelector {
    Container,
    FormElementLabel,
    Tag(&'static str),
    SelectionTarget,
}

const FIELD_SELECTORS: &[FieldSelector] = &[
    FieldSelector::Container,
    FieldSelector::FormElementLabel,
    FieldSelector::Tag("lightning-input"),
    FieldSelector::Tag("lightning-textarea"),
    FieldSelector::Tag("lightning-combobox"),
    FieldSelector::Tag("lightning-dual-listbox"),
    FieldSelector::SelectionTarget,
];

impl FieldSelector {
    fn matches(self, tree: &DomTree, node: NodeId) -> bool {
        match self {
            Self::Container => is_field_container(tree, node),
            Self::FormElementLabel => tree.has_class(node, FORM_ELEMENT_LABEL_CLASS),
            Self::Tag(tag) => tree.is_tag(node, tag),
            Self::SelectionTarget => {
                tree.is_tag(node, "div") && tree.has_attribute(node, SELECTION_TARGET_ATTRIBUTE)
            }
        }
    }
}

/// Field found on the page that should receive a permissions affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldAnchor {
    /// Element the field was resolved from.
    pub node: NodeId,
    /// Element the affordance should be appended to.
    pub insertion_point: NodeId,
    /// Resolved field identity.
    pub identity: FieldIdentity,
}

/// Elements already handled during earlier passes over the same tree.
///
/// Pass the same state to every scan of a page so repeated mutation
/// notifications never produce a second affordance for one field.
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    anchored: BTreeSet<NodeId>,
}

impl ScanState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether an affordance was placed at or below `node`.
    fn holds_affordance(&self, tree: &DomTree, node: NodeId) -> bool {
        self.anchored
            .range(node..)
            .next()
            .is_some_and(|anchored| *anchored == node || tree.is_descendant_of(*anchored, node))
    }

    fn is_anchored(&self, node: NodeId) -> bool {
        self.anchored.contains(&node)
    }

    fn mark(&mut self, anchor: &FieldAnchor) {
        self.anchored.insert(anchor.node);
        self.anchored.insert(anchor.insertion_point);
    }
}

/// Finds every inspectable field below `root`.
///
/// Anchors come back grouped by selector and in document order within each
/// group. An element is skipped when its own subtree already holds an
/// affordance, or when it or any ancestor up to and including the enclosing
/// field container was itself anchored.
pub fn scan_page(
    tree: &DomTree,
    root: NodeId,
    page: &PageContext,
    state: &mut ScanState,
) -> Vec<FieldAnchor> {
    let mut anchors = Vec::new();

    for selector in FIELD_SELECTORS {
        let candidates: Vec<NodeId> = tree
            .descendants(root)
            .filter(|node| selector.matches(tree, *node))
            .collect();

        for node in candidates {
            if is_already_processed(tree, node, state) {
                continue;
            }

            let identity = resolve_field_identity(tree, node, page);
            if !identity.is_usable() {
                debug!(
                    node = node.index(),
                    object_name = identity.object_name(),
                    field_name = identity.field_name(),
                    "skipping element without an inspectable field"
                );
                continue;
            }

            let anchor = FieldAnchor {
                node,
                insertion_point: insertion_point(tree, node),
                identity,
            };
            state.mark(&anchor);
            anchors.push(anchor);
        }
    }

    anchors
}

fn is_already_processed(tree: &DomTree, node: NodeId, state: &ScanState) -> bool {
    if state.holds_affordance(tree, node) {
        return true;
    }

    for ancestor in tree.ancestors(node) {
        if state.is_anchored(ancestor) {
            return true;
        }
        if tree.is_tag(ancestor, FIELD_CONTAINER_TAG) {
            break;
        }
    }

    false
}

fn insertion_point(tree: &DomTree, node: NodeId) -> NodeId {
    if tree.is_tag(node, FIELD_CONTAINER_TAG)
        && let Some(label) = tree.find_descendant(node, |tree, candidate| {
            tree.has_class(candidate, FIELD_LABEL_CLASS)
        })
    {
        return label;
    }

    let checkbox = tree.find_descendant(node, |tree, candidate| {
        tree.is_tag(candidate, "input") && tree.attribute(candidate, "type") == Some("checkbox")
    });
    if let Some(checkbox) = checkbox {
        let label = tree
            .closest(checkbox, |tree, candidate| {
                tree.is_tag(candidate, "label") && tree.has_class(candidate, CHECKBOX_LABEL_CLASS)
            })
            .or_else(|| {
                tree.find_descendant(node, |tree, candidate| {
                    tree.has_class(candidate, FORM_ELEMENT_LABEL_CLASS)
                })
            });
        if let Some(label) = label {
            return label;
        }
    }

    let is_label = |tree: &DomTree, candidate: NodeId| tree.is_tag(candidate, "label");
    let is_field_label = |tree: &DomTree, candidate: NodeId| tree.has_class(candidate, FIELD_LABEL_CLASS);
    let form_element = tree.closest(node, |tree, candidate| tree.has_class(candidate, FORM_ELEMENT_CLASS));

    tree.find_descendant(node, is_label)
        .or_else(|| tree.find_descendant(node, is_field_label))
        .or_else(|| form_element.and_then(|form| tree.find_descendant(form, is_label)))
        .or_else(|| form_element.and_then(|form| tree.find_descendant(form, is_field_label)))
        .unwrap_or(node)
}
