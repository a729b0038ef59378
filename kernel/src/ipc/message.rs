//! IPC message format
//!
//! Fixed-size wire message: a header of identifiers, flags, and timing,
//! followed by an inline payload buffer of the fixed ceiling. The total
//! size is constant regardless of payload length, which keeps the entry
//! pool allocation trivial; only the first `length` bytes of `data` are
//! semantically valid.

use core::fmt;

use bitflags::bitflags;

use super::error::{IpcError, Result};

/// Maximum message payload size in bytes.
pub const MAX_PAYLOAD: usize = 4096;

/// Receive filter wildcard: accept a message from any sender.
pub const PID_ANY: u32 = 0xFFFF_FFFF;

bitflags! {
    /// Message type flags. A plain message carries no flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MessageFlags: u32 {
        /// High-priority delivery
        const URGENT = 1 << 0;
        /// Reply to a previous message (`reply_to` is set)
        const REPLY = 1 << 1;
        /// Asynchronous notification
        const NOTIFICATION = 1 << 2;
        /// Quantum-related message
        const QUANTUM = 1 << 3;
        /// Quantum circuit transfer
        const CIRCUIT_HANDOFF = 1 << 4;
    }
}

/// IPC message. Immutable from enqueue to dequeue.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// Sender PID, stamped by the kernel on send
    pub sender: u32,
    /// Receiver PID
    pub receiver: u32,
    /// Type flags
    pub flags: MessageFlags,
    /// Unique, monotonically increasing id, stamped on send
    pub message_id: u32,
    /// Message id this replies to (0 for originals)
    pub reply_to: u32,
    /// Valid payload length in bytes
    pub length: u32,
    /// Send timestamp (ns since boot), stamped on send
    pub timestamp: u64,
    /// Delivery deadline in ns (0 = none)
    pub deadline: u64,
    /// Inline payload buffer
    pub data: [u8; MAX_PAYLOAD],
}

impl Message {
    /// An empty message with no payload.
    pub const fn empty() -> Self {
        Self {
            sender: 0,
            receiver: 0,
            flags: MessageFlags::empty(),
            message_id: 0,
            reply_to: 0,
            length: 0,
            timestamp: 0,
            deadline: 0,
            data: [0; MAX_PAYLOAD],
        }
    }

    /// Build a message carrying `payload`.
    pub fn new(payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD {
            return Err(IpcError::MessageTooLarge);
        }
        let mut msg = Self::empty();
        msg.data[..payload.len()].copy_from_slice(payload);
        msg.length = payload.len() as u32;
        Ok(msg)
    }

    pub fn with_flags(mut self, flags: MessageFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_deadline(mut self, deadline_ns: u64) -> Self {
        self.deadline = deadline_ns;
        self
    }

    /// The semantically valid part of the payload buffer.
    pub fn payload(&self) -> &[u8] {
        let len = (self.length as usize).min(MAX_PAYLOAD);
        &self.data[..len]
    }

    pub fn is_reply(&self) -> bool {
        self.flags.contains(MessageFlags::REPLY)
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("flags", &self.flags)
            .field("message_id", &self.message_id)
            .field("reply_to", &self.reply_to)
            .field("length", &self.length)
            .field("timestamp", &self.timestamp)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trip() {
        let msg = Message::new(b"ping").unwrap();
        assert_eq!(msg.length, 4);
        assert_eq!(msg.payload(), b"ping");
        assert_eq!(msg.flags, MessageFlags::empty());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let huge = [0u8; MAX_PAYLOAD + 1];
        assert_eq!(Message::new(&huge), Err(IpcError::MessageTooLarge));
        // The ceiling itself is fine.
        let exact = [0u8; MAX_PAYLOAD];
        assert!(Message::new(&exact).is_ok());
    }

    #[test]
    fn test_builders() {
        let msg = Message::new(b"x")
            .unwrap()
            .with_flags(MessageFlags::URGENT | MessageFlags::QUANTUM)
            .with_deadline(5_000);
        assert!(msg.flags.contains(MessageFlags::URGENT));
        assert_eq!(msg.deadline, 5_000);
        assert!(!msg.is_reply());
    }
}
