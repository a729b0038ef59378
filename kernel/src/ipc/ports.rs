//! Named ports
//!
//! A port is a named kernel endpoint with its own queue, owned by exactly
//! one process. Names are unique across open ports and reusable after
//! destruction. Port queues draw from the same global entry pool as the
//! per-process queues and are not charged to any process's quota; a
//! chatty port can therefore starve process queues of pool entries.

use super::queue::MessageQueue;

/// Maximum number of simultaneously open ports.
pub const MAX_PORTS: usize = 128;

/// Maximum port name length in bytes (names are limited to 63 bytes).
pub const PORT_NAME_MAX: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Closed,
    Listening,
}

/// A named port.
#[derive(Clone, Copy)]
pub struct Port {
    pub id: u32,
    pub owner: u32,
    name: [u8; PORT_NAME_MAX],
    name_len: u8,
    pub state: PortState,
    pub queue: MessageQueue,
}

impl Port {
    pub const EMPTY: Port = Port {
        id: 0,
        owner: 0,
        name: [0; PORT_NAME_MAX],
        name_len: 0,
        state: PortState::Closed,
        queue: MessageQueue::new(),
    };

    pub fn is_open(&self) -> bool {
        self.state != PortState::Closed
    }

    pub fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(PORT_NAME_MAX - 1);
        self.name = [0; PORT_NAME_MAX];
        self.name[..len].copy_from_slice(&bytes[..len]);
        self.name_len = len as u8;
    }

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("")
    }
}
