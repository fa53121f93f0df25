//! Target lifecycle events published by the presentation layer.

use crate::ids::TargetId;
use serde::{Deserialize, Serialize};

/// A change in a target's attachment to its live surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetEvent {
    /// The target became visible on its surface.
    Attached { target_id: TargetId },
    /// The target left its surface but may come back.
    Detached { target_id: TargetId },
    /// The target is gone for good.
    Destroyed { target_id: TargetId },
}

impl TargetEvent {
    pub fn target_id(&self) -> TargetId {
        match self {
            TargetEvent::Attached { target_id }
            | TargetEvent::Detached { target_id }
            | TargetEvent::Destroyed { target_id } => *target_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TargetEvent::Attached { .. } => "attached",
            TargetEvent::Detached { .. } => "detached",
            TargetEvent::Destroyed { .. } => "destroyed",
        }
    }
}
