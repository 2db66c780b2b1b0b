/// Instructions a single `execute()` call may run before the VM gives up.
pub const DEFAULT_MAX_INSTRUCTIONS: usize = 10_000;

/// Seed used when none is given, so runs are reproducible by default.
pub const DEFAULT_RNG_SEED: u32 = 1;

/// VM configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VmConfig {
    /// Runaway-loop guard for one `execute()` call.
    pub max_instructions: usize,
    pub rng_seed: u32,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_instructions: DEFAULT_MAX_INSTRUCTIONS,
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

impl VmConfig {
    #[must_use]
    pub const fn with_max_instructions(mut self, max_instructions: usize) -> Self {
        self.max_instructions = max_instructions;
        self
    }

    #[must_use]
    pub const fn with_rng_seed(mut self, rng_seed: u32) -> Self {
        self.rng_seed = rng_seed;
        self
    }
}
