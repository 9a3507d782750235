//! # System Constants
//!
//! Names shared between the state-change pipeline, its storage, and downstream
//! event listeners.

/// Domain events published after a committed transition
pub mod events {
    pub const ORDER_STATE_CHANGED: &str = "order.state_changed";
}

/// Audit action codes
pub mod audit_actions {
    pub const STATE_CHANGED: &str = "order.state_changed";
}

/// Entity type names recorded in the audit log
pub mod entity_types {
    pub const ORDER: &str = "order";
}

/// Operational defaults
pub mod system {
    /// Maximum length of transition reasons and notes
    pub const DEFAULT_MAX_NOTE_LENGTH: usize = 500;
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;
    /// Largest broadcast buffer the publisher will allocate
    pub const MAX_EVENT_CHANNEL_CAPACITY: usize = 1 << 20;
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    pub const DEFAULT_ACQUIRE_TIMEOUT_SECONDS: u64 = 30;
    pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/workorder_development";
}
