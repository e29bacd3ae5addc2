//! Injection orchestration
//!
//! [`SvgInjector`] composes the cache, the id rewriter, and the script runner
//! into the per-placeholder pipeline, and owns all cross-injection state: the
//! in-flight placeholder set, the script execution record, and the ordinal
//! counter that makes rewritten identifiers globally unique. It is one
//! explicit service object — construct it, share it by reference on one
//! cooperative thread, and `reset()` it between tests.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use kuchiki::NodeRef;

use crate::cache::ResourceCache;
use crate::config::InjectorConfig;
use crate::document::{descendant_elements, element_is, node_identity};
use crate::error::InjectError;
use crate::fetcher::SvgFetcher;
use crate::id_rewriter::make_ids_unique;
use crate::script::{ScriptError, ScriptHost, ScriptPolicy, ScriptRunner};

/// Successful outcome of a single injection attempt.
#[derive(Debug)]
pub enum Injected {
    /// The placeholder was replaced with a sanitized SVG clone. Script
    /// payload failures, if any, are non-fatal and reported here.
    Replaced {
        node: NodeRef,
        script_errors: Vec<ScriptError>,
    },
    /// The environment cannot render SVG; the placeholder now points at its
    /// raster fallback. No caching or rewriting happened.
    PngFallback,
    /// Another injection attempt for this exact placeholder is still in
    /// flight; this call had no effect.
    AlreadyInFlight,
}

/// One failed element out of a batched [`SvgInjector::inject_all`] run.
#[derive(Debug, Clone)]
pub struct InjectionFailure {
    pub locator: String,
    pub error: InjectError,
}

/// Result of a batched injection with success and failure tracking.
#[derive(Debug, Clone, Default)]
pub struct InjectionReport {
    pub successes: usize,
    pub failures: Vec<InjectionFailure>,
}

impl InjectionReport {
    /// Total number of placeholders processed
    #[must_use]
    pub fn total(&self) -> usize {
        self.successes + self.failures.len()
    }

    /// Check if any failures occurred
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Get failure rate as a ratio between 0.0 and 1.0
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.failures.len() as f64 / total as f64
        }
    }
}

/// Inlines externally-referenced SVG documents in place of placeholder
/// elements.
pub struct SvgInjector {
    cache: ResourceCache,
    scripts: ScriptRunner,
    config: InjectorConfig,
    /// Placeholders with an injection attempt in flight. Best-effort dedupe,
    /// valid under single-threaded cooperative scheduling.
    injecting: RefCell<HashSet<usize>>,
    /// Incremented once per successful injection; never reused.
    ordinal: Cell<u64>,
}

impl SvgInjector {
    pub fn new(fetcher: Rc<dyn SvgFetcher>) -> Self {
        Self::with_config(fetcher, InjectorConfig::default())
    }

    pub fn with_config(fetcher: Rc<dyn SvgFetcher>, config: InjectorConfig) -> Self {
        Self {
            cache: ResourceCache::new(fetcher),
            scripts: ScriptRunner::new(None),
            config,
            injecting: RefCell::new(HashSet::new()),
            ordinal: Cell::new(0),
        }
    }

    /// Opt in to embedded script execution through `host`.
    #[must_use]
    pub fn with_script_host(mut self, host: Rc<dyn ScriptHost>) -> Self {
        self.scripts = ScriptRunner::new(Some(host));
        self
    }

    /// Number of injections completed so far (the next ordinal suffix).
    pub fn injection_count(&self) -> u64 {
        self.ordinal.get()
    }

    /// The underlying cache, for state inspection.
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Clear all cross-injection state: cache entries, the script execution
    /// record, the in-flight set, and the ordinal counter. Test isolation
    /// only; never part of normal operation.
    pub fn reset(&self) {
        self.cache.reset();
        self.scripts.reset();
        self.injecting.borrow_mut().clear();
        self.ordinal.set(0);
    }

    /// Replace `element` with an inlined, sanitized copy of the SVG its
    /// locator attribute points at.
    ///
    /// Exactly one of an error or a success is reported, always through the
    /// returned future — never by unwinding. Concurrent calls for the same
    /// unresolved locator share one fetch; concurrent calls for the same
    /// placeholder collapse to one attempt. A placeholder that lost its
    /// parent mid-flight still completes successfully, minus the tree
    /// replacement.
    pub async fn inject(
        &self,
        element: &NodeRef,
        policy: ScriptPolicy,
    ) -> Result<Injected, InjectError> {
        let locator = locator_of(element).unwrap_or_default();
        if !has_svg_extension(&locator) {
            return Err(InjectError::UnsupportedFileType(locator));
        }

        if !self.config.svg_supported {
            return self.apply_raster_fallback(element, &locator);
        }

        let identity = node_identity(element);
        if !self.injecting.borrow_mut().insert(identity) {
            log::debug!("Injection already in flight for this placeholder: {locator}");
            return Ok(Injected::AlreadyInFlight);
        }

        // Neutralize the content-loading attribute so the original asset is
        // not loaded while the injection is in flight.
        if let Some(el) = element.as_element() {
            el.attributes.borrow_mut().insert("src", String::new());
        }

        let svg = match self.cache.request(&locator).await {
            Ok(svg) => svg,
            Err(err) => {
                self.injecting.borrow_mut().remove(&identity);
                return Err(err);
            }
        };

        // Fill the container and drop the aspect-ratio constraint before the
        // clone becomes visible.
        if let Some(el) = svg.as_element() {
            let mut attrs = el.attributes.borrow_mut();
            attrs.insert("width", "100%".to_string());
            attrs.insert("height", "100%".to_string());
            attrs.insert("preserveAspectRatio", "none".to_string());
        }

        let ordinal = self.ordinal.get();
        make_ids_unique(&svg, ordinal);
        let script_errors = self.scripts.run(&svg, &locator, policy);
        refresh_styles(&svg);

        if element.parent().is_some() {
            element.insert_before(svg.clone());
            element.detach();
        } else {
            // The placeholder was removed mid-flight; completion tolerates
            // this as a no-op rather than a crash.
            log::debug!("Placeholder for {locator} is no longer attached; skipping replacement");
        }

        self.injecting.borrow_mut().remove(&identity);
        self.ordinal.set(ordinal + 1);
        log::debug!("Injected SVG #{ordinal}: {locator}");

        Ok(Injected::Replaced {
            node: svg,
            script_errors,
        })
    }

    /// Inject every placeholder in `elements`, sharing fetches between them,
    /// and report successes and per-element failures.
    pub async fn inject_all(
        &self,
        elements: &[NodeRef],
        policy: ScriptPolicy,
    ) -> InjectionReport {
        let attempts = elements.iter().map(|element| async move {
            let locator = locator_of(element).unwrap_or_default();
            (locator, self.inject(element, policy).await)
        });

        let outcomes = futures::future::join_all(attempts).await;

        let mut report = InjectionReport::default();
        for (locator, outcome) in outcomes {
            match outcome {
                Ok(_) => report.successes += 1,
                Err(error) => {
                    log::warn!("Failed to inject {locator}: {error}");
                    report.failures.push(InjectionFailure { locator, error });
                }
            }
        }
        report
    }

    /// The distinct success path for environments without native SVG
    /// rendering: point the placeholder at its raster fallback, or fail if it
    /// has none.
    fn apply_raster_fallback(
        &self,
        element: &NodeRef,
        locator: &str,
    ) -> Result<Injected, InjectError> {
        let Some(el) = element.as_element() else {
            return Err(InjectError::UnsupportedEnvironment);
        };
        let fallback = {
            let attrs = el.attributes.borrow();
            attrs
                .get("data-fallback")
                .or_else(|| attrs.get("data-png"))
                .map(str::to_string)
        };
        match fallback {
            Some(raster) => {
                log::debug!("No SVG support; applying raster fallback for {locator}");
                el.attributes.borrow_mut().insert("src", raster);
                Ok(Injected::PngFallback)
            }
            None => Err(InjectError::UnsupportedEnvironment),
        }
    }
}

/// Read the placeholder's resource locator (`data-src`, falling back to
/// `src`).
pub fn locator_of(element: &NodeRef) -> Option<String> {
    let el = element.as_element()?;
    let attrs = el.attributes.borrow();
    attrs
        .get("data-src")
        .or_else(|| attrs.get("src"))
        .map(str::to_string)
}

/// Locator names an SVG file: path portion (query and fragment stripped) ends
/// in `.svg`, case-insensitive.
fn has_svg_extension(locator: &str) -> bool {
    let path = locator.split(['?', '#']).next().unwrap_or(locator);
    let path = path.to_ascii_lowercase();
    path.len() > 4 && path.ends_with(".svg")
}

/// Style-tag refresh workaround: append an empty text node to every embedded
/// `<style>` payload, forcing environments that do not auto-apply dynamically
/// inserted styles to re-evaluate them.
fn refresh_styles(root: &NodeRef) {
    let styles: Vec<_> = descendant_elements(root)
        .filter(|el| element_is(el, "style"))
        .collect();
    for style in styles {
        style.as_node().append(NodeRef::new_text(""));
    }
}
