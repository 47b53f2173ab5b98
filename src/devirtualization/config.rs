//! Configuration of the analysis.

/// Tunables of an [`crate::AnalysisSession`].
///
/// None of the settings change which facts are found for a well-formed binary except
/// `include_nested_handlers` and the two limits, which bound how far the locator and the
/// constant evaluator look.
///
/// # Examples
///
/// ```rust
/// use vmscope::AnalysisConfig;
///
/// let config = AnalysisConfig::sequential().with_max_eval_depth(4);
/// assert!(!config.parallel);
/// assert_eq!(config.max_eval_depth, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Shard the method scan and handler matching across the rayon pool (default: true).
    ///
    /// Results are reassembled in declaration order either way.
    pub parallel: bool,
    /// Maximum number of argument-packing instructions between the key load and the
    /// dispatch call (default: 64).
    pub max_argument_window: usize,
    /// Maximum nesting of static field loads while evaluating a key initializer
    /// (default: 8).
    pub max_eval_depth: usize,
    /// Append the handlers of nested types of the interpreter type after its own
    /// (default: true).
    pub include_nested_handlers: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            parallel: true,
            max_argument_window: 64,
            max_eval_depth: 8,
            include_nested_handlers: true,
        }
    }
}

impl AnalysisConfig {
    /// The default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The default configuration without parallelism.
    #[must_use]
    pub fn sequential() -> Self {
        AnalysisConfig {
            parallel: false,
            ..Self::default()
        }
    }

    /// Enable or disable parallel scanning and matching.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the argument-packing window of the locator.
    #[must_use]
    pub fn with_max_argument_window(mut self, window: usize) -> Self {
        self.max_argument_window = window;
        self
    }

    /// Set the recursion limit of the constant evaluator.
    #[must_use]
    pub fn with_max_eval_depth(mut self, depth: usize) -> Self {
        self.max_eval_depth = depth;
        self
    }

    /// Include or exclude handlers declared on nested types.
    #[must_use]
    pub fn with_nested_handlers(mut self, include: bool) -> Self {
        self.include_nested_handlers = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AnalysisConfig::default();
        assert!(config.parallel);
        assert_eq!(config.max_argument_window, 64);
        assert_eq!(config.max_eval_depth, 8);
        assert!(config.include_nested_handlers);
        assert_eq!(AnalysisConfig::new(), config);
    }

    #[test]
    fn setters() {
        let config = AnalysisConfig::new()
            .with_parallel(false)
            .with_max_argument_window(2)
            .with_nested_handlers(false);

        assert_eq!(config, AnalysisConfig {
            parallel: false,
            max_argument_window: 2,
            max_eval_depth: 8,
            include_nested_handlers: false,
        });
    }
}
