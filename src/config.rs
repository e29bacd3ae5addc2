//! Configuration for the injector and its fetchers

use std::time::Duration;

/// Configuration for an [`crate::injector::SvgInjector`].
#[derive(Debug, Clone)]
pub struct InjectorConfig {
    /// Whether the host environment renders inline SVG natively.
    ///
    /// Feature detection itself is an external concern; callers probe their
    /// environment and record the verdict here. When `false`, placeholders
    /// with a raster fallback take the fallback path and placeholders without
    /// one fail with `UnsupportedEnvironment`.
    pub svg_supported: bool,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            svg_supported: true,
        }
    }
}

/// Download timeouts and size limits for [`crate::fetcher::HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchLimits {
    /// Timeout for a single SVG download
    pub timeout: Duration,

    /// Maximum size for SVG downloads (bytes)
    /// SVGs are text-based and should be small
    /// Typical: 5-50KB, Complex: 100-500KB
    pub max_svg_size: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_svg_size: 1024 * 1024, // 1MB
        }
    }
}
