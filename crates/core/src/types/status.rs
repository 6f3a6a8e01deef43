//! Status enums for orders and return requests.
//!
//! Both state machines are one-directional: no transition may revert a
//! later state to an earlier one. The legal-transition tables live here as
//! pure methods so they can be checked without any I/O; the server's
//! repositories additionally guard the hot transitions with conditional
//! updates.

use serde::{Deserialize, Serialize};

/// Coarse order status.
///
/// `Pending` is the created-but-unpaid state; payment confirmation moves an
/// order to `Processing`. `Cancelled` is reachable from the two early
/// states only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether no further transitions are allowed out of this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Re-asserting the current status is always allowed; staff actions and
    /// webhook retries are idempotent re-confirmations.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        match (self, next) {
            (a, b) if a as u8 == b as u8 => true,
            (Self::Pending, Self::Processing | Self::Shipped | Self::Cancelled)
            | (Self::Processing, Self::Shipped | Self::Delivered | Self::Cancelled)
            | (Self::Shipped, Self::Delivered) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Return request status.
///
/// `Rejected` branches off `Requested`; the approved path may skip
/// `PickedUp` on the way to `Completed` (courier pickup and completion are
/// sometimes reported as one staff action).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    #[default]
    Requested,
    Approved,
    PickedUp,
    Completed,
    Rejected,
}

impl ReturnStatus {
    /// Whether no further transitions are allowed out of this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Re-asserting the current status is allowed so staff can change the
    /// return type without advancing the state machine.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        match (self, next) {
            (a, b) if a as u8 == b as u8 => true,
            (Self::Requested, Self::Approved | Self::Rejected)
            | (Self::Approved, Self::PickedUp | Self::Completed)
            | (Self::PickedUp, Self::Completed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Requested => "requested",
            Self::Approved => "approved",
            Self::PickedUp => "picked_up",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ReturnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(Self::Requested),
            "approved" => Ok(Self::Approved),
            "picked_up" => Ok(Self::PickedUp),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("invalid return status: {s}")),
        }
    }
}

/// Whether the customer wants money back or a replacement item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    Return,
    Replace,
}

impl std::fmt::Display for ReturnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Return => write!(f, "return"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

impl std::str::FromStr for ReturnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "return" => Ok(Self::Return),
            "replace" => Ok(Self::Replace),
            _ => Err(format!("invalid return type: {s}")),
        }
    }
}
