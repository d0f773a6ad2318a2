//! Notification events emitted by executing scripts.

use neodbg_core::UInt160;
use neodbg_vm::StackItem;
use serde_json::json;

/// One `System.Runtime.Notify` event, in execution order.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// The contract (owning script hash) that emitted the event.
    pub contract: UInt160,
    /// The event name.
    pub name: String,
    /// The event payload.
    pub item: StackItem,
}

impl NotificationEvent {
    /// Renders the event for the shell's `events` dump.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "contract": self.contract.to_string(),
            "name": self.name,
            "item": self.item.to_json(),
        })
    }
}
