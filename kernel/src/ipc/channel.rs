//! Bidirectional channels
//!
//! A channel binds exactly two endpoints with one queue per direction.
//! Only the two endpoints may send, and the sending side is derived from
//! the caller's identity, never from message fields.

use super::queue::MessageQueue;

/// Maximum number of simultaneously active channels.
pub const MAX_CHANNELS: usize = 64;

/// A two-endpoint channel.
#[derive(Debug, Clone, Copy)]
pub struct Channel {
    pub id: u32,
    pub endpoint_a: u32,
    pub endpoint_b: u32,
    /// Messages from A to B
    pub a_to_b: MessageQueue,
    /// Messages from B to A
    pub b_to_a: MessageQueue,
    pub active: bool,
}

impl Channel {
    pub const EMPTY: Channel = Channel {
        id: 0,
        endpoint_a: 0,
        endpoint_b: 0,
        a_to_b: MessageQueue::new(),
        b_to_a: MessageQueue::new(),
        active: false,
    };

    /// Whether `pid` is one of the two endpoints.
    pub fn has_endpoint(&self, pid: u32) -> bool {
        self.endpoint_a == pid || self.endpoint_b == pid
    }

    /// The opposite endpoint, if `pid` is an endpoint.
    pub fn peer_of(&self, pid: u32) -> Option<u32> {
        if pid == self.endpoint_a {
            Some(self.endpoint_b)
        } else if pid == self.endpoint_b {
            Some(self.endpoint_a)
        } else {
            None
        }
    }
}
