//! Error taxonomy for SVG injection
//!
//! Every failure of an injection attempt is terminal for that attempt and is
//! surfaced through the injection result; nothing here is ever raised in a way
//! that could escape the orchestrator. Script payload failures are the one
//! exception to the terminal rule and live in [`crate::script::ScriptError`]
//! instead: they are reported alongside a successful injection.

/// Terminal failure of a single injection attempt.
///
/// The `Display` strings are part of the public contract; callers match on
/// them when presenting failures to end users.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectError {
    /// The placeholder's resource locator does not name an SVG file.
    #[error("Attempted to inject a file with a non-svg extension: {0}")]
    UnsupportedFileType(String),

    /// The host environment cannot render SVG and the placeholder carries no
    /// raster fallback.
    #[error("This browser does not support SVG and no PNG fallback was defined.")]
    UnsupportedEnvironment,

    /// The resource could not be loaded (404, unreadable local file, or an
    /// otherwise unusable response).
    #[error("Unable to load SVG file: {0}")]
    LoadFailed(String),

    /// The response body could not be parsed into an SVG document root.
    #[error("Unable to parse SVG file: {0}")]
    ParseFailed(String),

    /// Any other transport-level failure with a meaningful status.
    #[error("There was a problem injecting the SVG: {status} {status_text}")]
    Transport { status: u16, status_text: String },

    /// The host environment has no usable transport at all.
    #[error("No transport available to load SVG files: {0}")]
    TransportUnavailable(String),
}
