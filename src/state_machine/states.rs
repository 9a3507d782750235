use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary lifecycle state of a work order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Initial state when the order is taken in
    Pending,
    /// Work is being planned
    Planning,
    /// Work is being carried out in the field
    Execution,
    /// Work was suspended and may resume
    Paused,
    /// Work finished and the order is closed
    Completed,
    /// Order was withdrawn before execution
    Cancelled,
}

impl OrderState {
    /// All primary states in lifecycle order
    pub const ALL: [OrderState; 6] = [
        Self::Pending,
        Self::Planning,
        Self::Execution,
        Self::Paused,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Target states that must be accompanied by a reason
    pub fn requires_reason(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// States from which an order may still be cancelled
    pub fn within_cancellation_window(&self) -> bool {
        matches!(self, Self::Pending | Self::Planning)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Planning => "planning",
            Self::Execution => "execution",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "planning" => Ok(Self::Planning),
            "execution" => Ok(Self::Execution),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid order state: {s}")),
        }
    }
}

/// Default state for new orders
impl Default for OrderState {
    fn default() -> Self {
        Self::Pending
    }
}
