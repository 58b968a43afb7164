use std::env;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SOURCE_NAME: &str = "flux-embed.eval";
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Settings for a new [`crate::Interpreter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterOptions {
    /// Name used for evaluated code in error locations.
    pub source_name: String,
    pub max_call_depth: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            source_name: DEFAULT_SOURCE_NAME.to_string(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl InterpreterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Defaults overridden by `FLUX_EMBED_SOURCE_NAME` and
    /// `FLUX_EMBED_MAX_CALL_DEPTH`. Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(name) = env::var("FLUX_EMBED_SOURCE_NAME")
            && !name.is_empty()
        {
            options.source_name = name;
        }
        if let Some(depth) = env::var("FLUX_EMBED_MAX_CALL_DEPTH")
            .ok()
            .and_then(|value| value.trim().parse().ok())
        {
            options.max_call_depth = depth;
        }
        options
    }
}
