//! Embedded script extraction and conditional execution
//!
//! `<script>` elements carried by a fetched SVG never enter the live tree.
//! Whether their payloads also *run* is governed by a per-injection
//! [`ScriptPolicy`] and by whether the caller wired up a [`ScriptHost`] at
//! all: evaluation of arbitrary payload text is an explicit opt-in capability,
//! not something the pipeline does silently.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use kuchiki::NodeRef;

use crate::document::{descendant_elements, element_is};

/// Script media types treated as executable. An absent or empty `type`
/// attribute counts as executable too; anything else is opaque and is left in
/// the tree untouched.
const EXECUTABLE_TYPES: &[&str] = &["application/ecmascript", "application/javascript"];

/// When embedded script payloads run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScriptPolicy {
    /// Execute every payload on every injection.
    #[default]
    Always,
    /// Execute payloads the first time a given resource is injected, never
    /// again for that resource.
    Once,
    /// Never execute.
    Never,
}

/// Narrow evaluation interface handed to payloads.
///
/// The host itself is the single global binding a payload sees; there is no
/// other implicit scope. Implementations accept source text and do whatever
/// "execute" means in their environment.
pub trait ScriptHost {
    fn eval(&self, source: &str) -> anyhow::Result<()>;
}

/// A payload that threw during execution.
///
/// Non-fatal: reported alongside a successful injection, never blocking later
/// payloads or tree insertion.
#[derive(Debug, Clone, thiserror::Error)]
#[error("embedded script from {locator} failed: {message}")]
pub struct ScriptError {
    pub locator: String,
    pub message: String,
}

/// Extracts script payloads from fetched trees and runs them per policy.
pub struct ScriptRunner {
    host: Option<Rc<dyn ScriptHost>>,
    /// Resource locators whose payloads have already run (Once policy).
    executed: RefCell<HashSet<String>>,
}

impl ScriptRunner {
    pub fn new(host: Option<Rc<dyn ScriptHost>>) -> Self {
        Self {
            host,
            executed: RefCell::new(HashSet::new()),
        }
    }

    /// Strip executable scripts out of `tree` and run their payloads per
    /// `policy`, returning any per-payload failures.
    ///
    /// Extraction always happens, execution only when the policy and a
    /// configured host allow it. A failing payload is caught and reported; the
    /// remaining payloads still run.
    pub fn run(&self, tree: &NodeRef, locator: &str, policy: ScriptPolicy) -> Vec<ScriptError> {
        let payloads = extract_payloads(tree);
        if payloads.is_empty() {
            return Vec::new();
        }

        let Some(host) = &self.host else {
            log::debug!(
                "No script host configured; dropped {} script payload(s) from {locator}",
                payloads.len()
            );
            return Vec::new();
        };

        let should_run = match policy {
            ScriptPolicy::Never => false,
            ScriptPolicy::Always => true,
            // insert() is false when this locator already ran.
            ScriptPolicy::Once => self.executed.borrow_mut().insert(locator.to_string()),
        };
        if !should_run {
            return Vec::new();
        }

        let mut errors = Vec::new();
        for source in &payloads {
            if let Err(err) = host.eval(source) {
                log::warn!("Embedded script from {locator} failed: {err:#}");
                errors.push(ScriptError {
                    locator: locator.to_string(),
                    message: err.to_string(),
                });
            }
        }
        errors
    }

    /// Forget which resources have already executed. Test isolation only.
    pub fn reset(&self) {
        self.executed.borrow_mut().clear();
    }
}

/// Detach every executable `<script>` element from `tree` and return their
/// textual payloads in document order.
fn extract_payloads(tree: &NodeRef) -> Vec<String> {
    // Collect before detaching: detach() during the walk would skip nodes.
    let scripts: Vec<_> = descendant_elements(tree)
        .filter(|el| element_is(el, "script"))
        .filter(|el| {
            let attrs = el.attributes.borrow();
            match attrs.get("type") {
                None => true,
                Some(declared) => {
                    let declared = declared.trim();
                    declared.is_empty() || EXECUTABLE_TYPES.contains(&declared)
                }
            }
        })
        .collect();

    scripts
        .into_iter()
        .map(|el| {
            let source = el.as_node().text_contents();
            el.as_node().detach();
            source
        })
        .collect()
}
