//! Lifecycle of an ingestion run
//!
//! ```text
//! Idle -> Planning -> Loading(i) -> Analyzing(i) -> Releasing(i) -> Loading(i+1) ...
//!                                                               \-> Aggregating -> Done
//! Planning / Releasing(i) -> Cancelled
//! any non-terminal state  -> Failed
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Executor state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum IngestState {
    Idle,
    Planning,
    Loading { batch_index: usize },
    Analyzing { batch_index: usize },
    Releasing { batch_index: usize },
    Aggregating,
    Done,
    Cancelled,
    Failed { reason: String },
}

impl IngestState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed { .. })
    }

    /// Whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: &IngestState) -> bool {
        use IngestState::*;

        if let Failed { .. } = next {
            return !self.is_terminal();
        }

        match (self, next) {
            (Idle, Planning) => true,
            (Planning, Loading { batch_index: 0 }) => true,
            (Planning, Aggregating) | (Planning, Cancelled) => true,
            (Loading { batch_index: a }, Analyzing { batch_index: b }) => a == b,
            (Analyzing { batch_index: a }, Releasing { batch_index: b }) => a == b,
            (Releasing { batch_index: a }, Loading { batch_index: b }) => a + 1 == *b,
            (Releasing { .. }, Aggregating) | (Releasing { .. }, Cancelled) => true,
            (Aggregating, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Planning => write!(f, "PLANNING"),
            Self::Loading { batch_index } => write!(f, "LOADING({})", batch_index),
            Self::Analyzing { batch_index } => write!(f, "ANALYZING({})", batch_index),
            Self::Releasing { batch_index } => write!(f, "RELEASING({})", batch_index),
            Self::Aggregating => write!(f, "AGGREGATING"),
            Self::Done => write!(f, "DONE"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Failed { reason } => write!(f, "FAILED({})", reason),
        }
    }
}
