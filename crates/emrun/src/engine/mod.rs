use wasmparser::{Validator, WasmFeatures};

/// Default limit on nested wasm calls.
///
/// Host to guest re-entry counts too: a guest calling a host function that
/// calls back into the guest uses two levels. Native stack is grown on
/// demand, so the limit is reached as a trap rather than an overflow.
pub const DEFAULT_MAX_CALL_DEPTH: u32 = 1_000;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) max_call_depth: u32,
    pub(crate) features: WasmFeatures,
}

impl Config {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of nested calls before trapping with
    /// [`Trap::CallStackExhausted`](crate::Trap::CallStackExhausted).
    pub fn max_call_depth(&mut self, depth: u32) -> &mut Self {
        self.max_call_depth = depth;
        self
    }

    /// Features accepted by the validator.
    pub fn wasm_features(&mut self, features: WasmFeatures) -> &mut Self {
        self.features = features;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            features: WasmFeatures::default(),
        }
    }
}

/// Shared compilation configuration.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: Config,
}

impl Engine {
    /// Engine using a copy of `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Create a new validator with the engine's features.
    pub fn new_validator(&self) -> Validator {
        Validator::new_with_features(self.config.features)
    }

    pub(crate) fn max_call_depth(&self) -> u32 {
        self.config.max_call_depth
    }
}
