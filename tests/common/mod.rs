//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use svg_inject::document::parse_svg_document;
use svg_inject::{FetchFuture, InjectError, Injected, ScriptHost, SvgFetcher};

/// One defs-scoped identifier, one reference to it. The canonical fixture for
/// the id-rewriting tests.
pub const CLIP_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg">
    <defs><clipPath id="c1"><rect width="4" height="4"/></clipPath></defs>
    <rect clip-path="url(#c1)" width="10" height="10"/>
</svg>"##;

/// Initialize test logging; safe to call from every test.
pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An SVG carrying an executable script payload.
pub const SCRIPT_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg">
    <script>init()</script>
    <circle r="5"/>
</svg>"#;

/// Fetcher serving canned markup. Yields once before resolving so concurrent
/// callers pile onto the pending cache entry, and counts fetch invocations so
/// coalescing is observable.
pub struct MockFetcher {
    body: String,
    pub calls: Cell<usize>,
    pub fail_remaining: Cell<usize>,
}

impl MockFetcher {
    pub fn serving(body: &str) -> Rc<Self> {
        Rc::new(Self {
            body: body.to_string(),
            calls: Cell::new(0),
            fail_remaining: Cell::new(0),
        })
    }

    /// Fail the first `times` fetches with a load failure, then serve `body`.
    pub fn failing(times: usize, body: &str) -> Rc<Self> {
        Rc::new(Self {
            body: body.to_string(),
            calls: Cell::new(0),
            fail_remaining: Cell::new(times),
        })
    }
}

impl SvgFetcher for MockFetcher {
    fn fetch(&self, locator: &str) -> FetchFuture<'_> {
        self.calls.set(self.calls.get() + 1);
        let locator = locator.to_string();
        Box::pin(async move {
            tokio::task::yield_now().await;
            if self.fail_remaining.get() > 0 {
                self.fail_remaining.set(self.fail_remaining.get() - 1);
                return Err(InjectError::LoadFailed(locator));
            }
            parse_svg_document(&self.body, &locator)
        })
    }
}

/// Script host that records every payload it evaluates.
pub struct RecordingHost {
    pub runs: RefCell<Vec<String>>,
}

impl RecordingHost {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            runs: RefCell::new(Vec::new()),
        })
    }
}

impl ScriptHost for RecordingHost {
    fn eval(&self, source: &str) -> anyhow::Result<()> {
        self.runs.borrow_mut().push(source.to_string());
        Ok(())
    }
}

/// Parse a host document around `body_markup` and return it along with its
/// first `<img>` placeholder.
pub fn document_with_placeholder(body_markup: &str) -> (NodeRef, NodeRef) {
    let document = kuchiki::parse_html().one(format!("<html><body>{body_markup}</body></html>"));
    let placeholder = document
        .select_first("img")
        .expect("fixture must contain an img placeholder")
        .as_node()
        .clone();
    (document, placeholder)
}

/// Unwrap a `Replaced` outcome into the inserted node.
pub fn expect_replaced(outcome: Injected) -> NodeRef {
    match outcome {
        Injected::Replaced { node, .. } => node,
        other => panic!("expected Replaced, got {other:?}"),
    }
}
