use std::sync::LazyLock;

use fieldlens_domain::{DomTree, FieldIdentity, NodeId, PageContext};
use regex::Regex;
use tracing::debug;

pub(crate) const SELECTION_TARGET_ATTRIBUTE: &str = "data-target-selection-name";
pub(crate) const FIELD_CONTAINER_TAG: &str = "flexipage-field";
pub(crate) const FIELD_CONTAINER_ID_ATTRIBUTE: &str = "data-field-id";

const FALLBACK_FIELD_ATTRIBUTES: &[&str] = &["data-field-name", "field-name", "name"];
const ANCESTOR_FIELD_ATTRIBUTES: &[&str] = &["data-field-name", "field-name"];

static SELECTION_TARGET: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\w+:RecordField\.(\w+)\.(\w+)").ok());
static CONTAINER_FIELD_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Record(.+)Field$").ok());
static OBJECT_URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"/lightning/r/(\w+)/",
        r"/(\w+)/view",
        r"/one/one\.app#/sObject/(\w+)/view",
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});
static TITLE_OBJECT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(\w+)\s*\|").ok());

/// Infers the field API name and owning object for an element.
///
/// Heuristics run in a fixed order and the first one that yields a field name
/// wins. A structured selection target short-circuits everything, including
/// object-name inference from the page. Missing parts come back empty.
#[must_use]
pub fn resolve_field_identity(tree: &DomTree, node: NodeId, page: &PageContext) -> FieldIdentity {
    if let Some(identity) = selection_target_identity(tree, node) {
        debug!(
            object_name = identity.object_name(),
            field_name = identity.field_name(),
            "resolved field from selection target"
        );
        return identity;
    }

    let field_name = field_name_from_markup(tree, node).unwrap_or_default();
    let object_name = object_name_from_page(page).unwrap_or_default();

    debug!(
        object_name = object_name.as_str(),
        field_name = field_name.as_str(),
        node = node.index(),
        "resolved field from markup"
    );

    FieldIdentity::new(object_name, field_name)
}

fn selection_target_identity(tree: &DomTree, node: NodeId) -> Option<FieldIdentity> {
    let target = tree.attribute(node, SELECTION_TARGET_ATTRIBUTE)?;
    let captures = SELECTION_TARGET.as_ref()?.captures(target)?;

    Some(FieldIdentity::new(
        captures.get(1)?.as_str(),
        captures.get(2)?.as_str(),
    ))
}

fn field_name_from_markup(tree: &DomTree, node: NodeId) -> Option<String> {
    if tree.is_tag(node, FIELD_CONTAINER_TAG) {
        return container_field_name(tree, node);
    }

    let own_value = FALLBACK_FIELD_ATTRIBUTES
        .iter()
        .find_map(|attribute| tree.attribute(node, attribute))
        .filter(|value| !value.is_empty());
    if let Some(value) = own_value {
        return Some(value.to_owned());
    }

    let carrier = tree.closest(node, |tree, candidate| {
        ANCESTOR_FIELD_ATTRIBUTES
            .iter()
            .any(|attribute| tree.has_attribute(candidate, attribute))
            || is_field_container(tree, candidate)
    })?;

    if tree.is_tag(carrier, FIELD_CONTAINER_TAG) {
        return container_field_name(tree, carrier);
    }

    ANCESTOR_FIELD_ATTRIBUTES
        .iter()
        .filter_map(|attribute| tree.attribute(carrier, attribute))
        .find(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Returns whether the element is a field container carrying a composite id.
pub(crate) fn is_field_container(tree: &DomTree, node: NodeId) -> bool {
    tree.is_tag(node, FIELD_CONTAINER_TAG) && tree.has_attribute(node, FIELD_CONTAINER_ID_ATTRIBUTE)
}

fn container_field_name(tree: &DomTree, node: NodeId) -> Option<String> {
    let field_id = tree.attribute(node, FIELD_CONTAINER_ID_ATTRIBUTE)?;
    let captures = CONTAINER_FIELD_ID.as_ref()?.captures(field_id)?;

    Some(normalize_custom_suffix(captures.get(1)?.as_str()))
}

/// Turns the `_c` suffix used in composite ids into the `__c` API convention.
fn normalize_custom_suffix(name: &str) -> String {
    match name.strip_suffix("_c") {
        Some(stem) if !stem.ends_with('_') => format!("{stem}__c"),
        _ => name.to_owned(),
    }
}

fn object_name_from_page(page: &PageContext) -> Option<String> {
    let from_url = OBJECT_URL_PATTERNS.iter().find_map(|pattern| {
        [page.path.as_str(), page.full_url.as_str()]
            .into_iter()
            .find_map(|source| pattern.captures(source))
            .and_then(|captures| captures.get(1))
            .map(|value| value.as_str().to_owned())
    });
    if from_url.is_some() {
        return from_url;
    }

    TITLE_OBJECT
        .as_ref()?
        .captures(page.title.as_str())
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().to_owned())
}
