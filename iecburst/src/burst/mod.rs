//! Burst framing for digital audio links.
//!
//! Wraps validated compressed frames into the byte sequences a receiver
//! expects: IEC 61937 bursts for the S/PDIF/HDMI link, and ADTS headers for
//! raw AAC frames before they reach the IEC 61937 stage.

use std::collections::VecDeque;

pub mod adts;
pub mod spdif;

pub use adts::AdtsFramer;
pub use spdif::SpdifFramer;

/// Pending wrapped output for one framer instance.
///
/// Wrapped packets accumulate here until the caller drains them as one
/// contiguous block. Replaces the opaque read-packet callback of a container
/// writer with a plain sink owned by the framer.
#[derive(Debug, Default)]
pub struct OutputQueue {
    packets: VecDeque<Vec<u8>>,
    queued: usize,
    consumed: usize,
    wrote_header: bool,
}

impl OutputQueue {
    pub fn push(&mut self, packet: Vec<u8>) {
        self.queued += packet.len();
        self.packets.push_back(packet);
    }

    /// Total bytes currently queued.
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Input bytes accepted since the queue was last drained.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn add_consumed(&mut self, bytes: usize) {
        self.consumed += bytes;
    }

    /// Drains everything queued into one contiguous block and clears the
    /// consumed counter. Returns an empty vec when nothing is pending.
    pub fn take(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.queued);
        while let Some(packet) = self.packets.pop_front() {
            out.extend_from_slice(&packet);
        }
        self.queued = 0;
        self.consumed = 0;
        out
    }

    /// Discards all pending output.
    pub fn reset(&mut self) {
        self.packets.clear();
        self.queued = 0;
        self.consumed = 0;
    }

    pub fn mark_header_written(&mut self) {
        self.wrote_header = true;
    }

    pub fn header_written(&self) -> bool {
        self.wrote_header
    }
}

#[cfg(test)]
mod tests {
    use super::OutputQueue;

    #[test]
    fn take_drains_in_order() {
        let mut queue = OutputQueue::default();
        queue.push(vec![1, 2]);
        queue.push(vec![3]);
        queue.add_consumed(10);

        assert_eq!(queue.queued(), 3);
        assert_eq!(queue.take(), vec![1, 2, 3]);
        assert_eq!(queue.queued(), 0);
        assert_eq!(queue.consumed(), 0);
        assert!(queue.take().is_empty());
    }

    #[test]
    fn reset_discards_pending_output() {
        let mut queue = OutputQueue::default();
        queue.push(vec![1, 2, 3]);
        queue.reset();
        assert!(queue.take().is_empty());
    }
}
