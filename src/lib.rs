//! Inline external SVG documents into a host DOM
//!
//! This crate replaces placeholder elements (typically `<img data-src="icon.svg">`)
//! in a parsed document tree with the inlined content of the SVG they point
//! at, while:
//!
//! - coalescing concurrent fetches so each resource is downloaded exactly once
//!   no matter how many placeholders reference it,
//! - rewriting defs-scoped element identifiers so two inlined copies of the
//!   same resource never collide,
//! - stripping embedded `<script>` payloads and optionally executing them
//!   under an explicit policy (`Always` / `Once` / `Never`).
//!
//! The pipeline is single-threaded and cooperative: the DOM is `Rc`-based, so
//! everything runs on one logical task queue (a tokio current-thread runtime
//! or a `LocalSet`). Concurrency comes from interleaving futures, not from
//! parallel threads, and no locks are involved.
//!
//! ```no_run
//! use std::rc::Rc;
//! use kuchiki::traits::TendrilSink;
//! use svg_inject::{HttpFetcher, ScriptPolicy, SvgInjector};
//!
//! # async fn demo() -> Result<(), svg_inject::InjectError> {
//! let document = kuchiki::parse_html().one("<img data-src=\"https://example.com/icon.svg\">");
//! let placeholder = document.select_first("img").unwrap().as_node().clone();
//!
//! let injector = SvgInjector::new(Rc::new(HttpFetcher::new()?));
//! injector.inject(&placeholder, ScriptPolicy::Never).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod fetcher;
pub mod id_rewriter;
pub mod injector;
pub mod script;

pub use cache::{CacheState, ResourceCache};
pub use config::{FetchLimits, InjectorConfig};
pub use error::InjectError;
pub use fetcher::{FetchFuture, FileFetcher, HttpFetcher, SvgFetcher};
pub use injector::{Injected, InjectionFailure, InjectionReport, SvgInjector};
pub use script::{ScriptError, ScriptHost, ScriptPolicy};
