//! Execution triggers.

use std::fmt;

/// Why an execution is being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TriggerType {
    /// Block lifecycle hook before transactions apply.
    OnPersist = 0x01,
    /// Block lifecycle hook after transactions apply.
    PostPersist = 0x02,
    /// A witness check.
    Verification = 0x20,
    /// A user invocation.
    #[default]
    Application = 0x40,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerType::OnPersist => write!(f, "OnPersist"),
            TriggerType::PostPersist => write!(f, "PostPersist"),
            TriggerType::Verification => write!(f, "Verification"),
            TriggerType::Application => write!(f, "Application"),
        }
    }
}
