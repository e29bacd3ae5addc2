//! Identifier rewriting for repeated injection
//!
//! Two live copies of the same SVG must not share ids for IRI-referenceable
//! definitions: the second copy's `url(#gradient)` would silently resolve into
//! the first copy's defs. Before a clone enters the live tree, every
//! defs-scoped definition id is suffixed with the injection ordinal and every
//! reference to it is retargeted.

use kuchiki::NodeRef;

use crate::document::{descendant_elements, element_is};

/// IRI-referenceable definition categories and the attributes that may
/// reference them, in the fixed order they are processed.
pub const IRI_CATEGORIES: &[(&str, &[&str])] = &[
    ("clipPath", &["clip-path"]),
    ("color-profile", &["color-profile"]),
    ("cursor", &["cursor"]),
    ("filter", &["filter"]),
    ("linearGradient", &["fill", "stroke"]),
    ("marker", &["marker", "marker-start", "marker-mid", "marker-end"]),
    ("mask", &["mask"]),
    ("pattern", &["fill", "stroke"]),
    ("radialGradient", &["fill", "stroke"]),
];

/// Rewrite every defs-scoped definition id in `root` to `{id}-{ordinal}` and
/// retarget all referencing attributes, returning the number of definitions
/// renamed.
///
/// Must run while `root` is still detached: renaming after attachment would
/// open a window where two live trees share an identifier.
///
/// Reference matching is by substring, not exact value, so `url(#fade)`,
/// `url("#fade")` and other quoting variations all retarget; the rewritten
/// attribute always takes the canonical `url(#fade-3)` form.
pub fn make_ids_unique(root: &NodeRef, ordinal: u64) -> usize {
    let mut renamed = 0;

    for &(tag, ref_attrs) in IRI_CATEGORIES {
        // Collect before mutating: renames touch the same elements the walk
        // visits.
        let definitions: Vec<_> = descendant_elements(root)
            .filter(|el| element_is(el, tag))
            .filter(|el| el.as_node().ancestors().any(|a| is_defs(&a)))
            .collect();

        for def in definitions {
            let old_id = {
                let attrs = def.attributes.borrow();
                attrs.get("id").map(str::to_string)
            };
            let Some(old_id) = old_id else { continue };
            if old_id.is_empty() {
                continue;
            }

            let new_id = format!("{old_id}-{ordinal}");
            retarget_references(root, ref_attrs, &old_id, &new_id);
            def.attributes.borrow_mut().insert("id", new_id);
            renamed += 1;
        }
    }

    if renamed > 0 {
        log::debug!("Rewrote {renamed} definition id(s) with ordinal {ordinal}");
    }
    renamed
}

fn is_defs(node: &NodeRef) -> bool {
    node.as_element().is_some_and(|el| element_is(el, "defs"))
}

/// Point every referencing attribute whose value mentions `old_id` at
/// `new_id`, in canonical `url(#...)` form.
fn retarget_references(root: &NodeRef, ref_attrs: &[&str], old_id: &str, new_id: &str) {
    for el in descendant_elements(root) {
        for &attr in ref_attrs {
            let referenced = {
                let attrs = el.attributes.borrow();
                attrs.get(attr).is_some_and(|value| value.contains(old_id))
            };
            if referenced {
                el.attributes
                    .borrow_mut()
                    .insert(attr, format!("url(#{new_id})"));
            }
        }
    }
}
