//! Token estimation used for per-conversation budget accounting.
//!
//! Two strategies are available. The primary one counts `cl100k_base` BPE
//! tokens. The fallback approximates one token per four characters and is
//! selected once, at construction, when the BPE tables cannot be loaded.
//! Estimation itself never fails.

use std::fmt;
use std::sync::Arc;

use tiktoken_rs::CoreBPE;
use tracing::warn;

pub const CHARS_PER_TOKEN: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimatorStrategy {
    Bpe,
    CharRatio,
}

impl EstimatorStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bpe => "cl100k_base",
            Self::CharRatio => "char_ratio",
        }
    }
}

#[derive(Clone)]
pub struct TokenEstimator {
    bpe: Option<Arc<CoreBPE>>,
}

impl TokenEstimator {
    /// Builds the BPE estimator, degrading to the character ratio if the
    /// encoding is unavailable.
    pub fn load() -> Self {
        match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Self { bpe: Some(Arc::new(bpe)) },
            Err(error) => {
                warn!(
                    event_name = "system.tokens.fallback",
                    correlation_id = "bootstrap",
                    error = %error,
                    "cl100k_base encoding unavailable, estimating one token per four characters"
                );
                Self::char_ratio()
            }
        }
    }

    pub fn char_ratio() -> Self {
        Self { bpe: None }
    }

    pub fn strategy(&self) -> EstimatorStrategy {
        if self.bpe.is_some() {
            EstimatorStrategy::Bpe
        } else {
            EstimatorStrategy::CharRatio
        }
    }

    pub fn estimate(&self, text: &str) -> i64 {
        let count = match &self.bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => text.chars().count() / CHARS_PER_TOKEN,
        };
        i64::try_from(count).unwrap_or(i64::MAX)
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::load()
    }
}

impl fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEstimator").field("strategy", &self.strategy()).finish()
    }
}
