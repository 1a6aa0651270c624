//! Analysis configuration

/// Tunables of an [`crate::AnalysisContext`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Maximum number of equation steps a single solve may take before it is
    /// abandoned as a failure
    pub solver_step_budget: usize,
    /// Maximum depth followed through parent types and progenitors by the
    /// derivation queries
    pub max_derivation_depth: usize,
    /// Whether the predefined `Standard` package is built and populated
    pub load_standard: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            solver_step_budget: 100_000,
            max_derivation_depth: 64,
            load_standard: true,
        }
    }
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_solver_step_budget(mut self, budget: usize) -> Self {
        self.solver_step_budget = budget;
        self
    }

    pub fn with_max_derivation_depth(mut self, depth: usize) -> Self {
        self.max_derivation_depth = depth;
        self
    }

    pub fn with_standard(mut self, load: bool) -> Self {
        self.load_standard = load;
        self
    }
}
