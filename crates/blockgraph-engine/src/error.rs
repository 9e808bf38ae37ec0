//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and the demo run.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: blockgraph_core::ConfigError,
    },

    /// Opening or driving the graph world failed.
    #[error("graph world error: {source}")]
    Core {
        /// The underlying core error.
        #[from]
        source: blockgraph_core::CoreError,
    },

    /// The `demo` config section is missing a sane value or failed to parse.
    #[error("demo error: {message}")]
    Demo {
        /// Description of the demo failure.
        message: String,
    },
}
