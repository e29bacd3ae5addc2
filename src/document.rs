//! DOM support for SVG injection
//!
//! Thin helpers over `kuchiki` node trees: parsing a fetched body into an SVG
//! root, deep-cloning subtrees, and walking elements in document order. Tag
//! names are matched case-insensitively throughout — the HTML parser's
//! foreign-content handling restores camelCase SVG names (`clipPath`,
//! `linearGradient`), but nothing here depends on that.

use std::rc::Rc;

use kuchiki::iter::NodeIterator;
use kuchiki::traits::TendrilSink;
use kuchiki::{ElementData, NodeData, NodeDataRef, NodeRef};

use crate::error::InjectError;

/// Parse a fetched body and extract the `<svg>` document root.
///
/// The root is detached from the surrounding parse tree so the caller owns a
/// standalone subtree. A body with no SVG root is reported as a parse failure
/// for `locator`.
pub fn parse_svg_document(text: &str, locator: &str) -> Result<NodeRef, InjectError> {
    let document = kuchiki::parse_html().one(text);

    let root = document
        .inclusive_descendants()
        .elements()
        .find(|el| el.name.local.as_ref().eq_ignore_ascii_case("svg"))
        .ok_or_else(|| InjectError::ParseFailed(locator.to_string()))?;

    let node = root.as_node().clone();
    node.detach();
    Ok(node)
}

/// Structural deep copy of a node subtree.
///
/// A node can be attached to only one tree location at a time, so the
/// canonical cached node is never handed out directly; every consumer receives
/// its own copy built here.
pub fn deep_clone(node: &NodeRef) -> NodeRef {
    let copy = match node.data() {
        NodeData::Element(data) => NodeRef::new_element(
            data.name.clone(),
            data.attributes
                .borrow()
                .map
                .iter()
                .map(|(name, attr)| (name.clone(), attr.clone())),
        ),
        NodeData::Text(value) => NodeRef::new_text(value.borrow().clone()),
        NodeData::Comment(value) => NodeRef::new_comment(value.borrow().clone()),
        NodeData::ProcessingInstruction(value) => {
            let (target, data) = value.borrow().clone();
            NodeRef::new_processing_instruction(target, data)
        }
        NodeData::Doctype(doctype) => NodeRef::new_doctype(
            doctype.name.clone(),
            doctype.public_id.clone(),
            doctype.system_id.clone(),
        ),
        NodeData::Document(_) => NodeRef::new_document(),
        NodeData::DocumentFragment => NodeRef::new(NodeData::DocumentFragment),
    };

    for child in node.children() {
        copy.append(deep_clone(&child));
    }

    copy
}

/// Stable pointer identity for a node, used for in-flight membership tracking.
pub fn node_identity(node: &NodeRef) -> usize {
    Rc::as_ptr(&node.0) as usize
}

/// All elements of a subtree (the root included) in document order.
pub fn descendant_elements(root: &NodeRef) -> impl Iterator<Item = NodeDataRef<ElementData>> {
    root.inclusive_descendants().elements()
}

/// Case-insensitive SVG tag-name check.
pub fn element_is(el: &ElementData, name: &str) -> bool {
    el.name.local.as_ref().eq_ignore_ascii_case(name)
}
