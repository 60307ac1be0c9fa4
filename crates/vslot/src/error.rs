use thiserror::Error;

use crate::slot::SlotIndex;

/// Errors returned synchronously to whoever drives the slot table.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SlotError {
    #[error("slot capacity exceeded (limit {limit})")]
    CapacityExceeded { limit: u8 },

    #[error("no primary slot at index {0}")]
    NoSuchPrimary(SlotIndex),

    #[error("no slot at index {0}")]
    NoSuchSlot(SlotIndex),

    #[error("slot index {0} is out of range")]
    InvalidIndex(u8),

    #[error("invalid slot size {width}x{height}")]
    InvalidSize { width: i32, height: i32 },

    #[error("no mirror slot for display {0:?}")]
    NotFound(String),

    #[error("surface for slot {0} never became available")]
    SurfaceUnavailable(SlotIndex),

    #[error("host display lost")]
    HostDisplayLost,

    #[error("ui task queue is closed")]
    QueueClosed,
}

impl SlotError {
    pub fn kind(&self) -> &'static str {
        match self {
            SlotError::CapacityExceeded { .. } => "capacity_exceeded",
            SlotError::NoSuchPrimary(_) => "no_such_primary",
            SlotError::NoSuchSlot(_) => "no_such_slot",
            SlotError::InvalidIndex(_) => "invalid_index",
            SlotError::InvalidSize { .. } => "invalid_size",
            SlotError::NotFound(_) => "not_found",
            SlotError::SurfaceUnavailable(_) => "surface_unavailable",
            SlotError::HostDisplayLost => "host_display_lost",
            SlotError::QueueClosed => "queue_closed",
        }
    }
}

/// Failures reported by the external collaborator services.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HostError {
    #[error("window service: {0}")]
    Window(String),

    #[error("display registry: {0}")]
    Registry(String),

    #[error("input injection: {0}")]
    Injection(String),

    #[error("no host display available")]
    NoHostDisplay,
}
