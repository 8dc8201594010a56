//! IEC 61937 burst framing.
//!
//! Each validated compressed frame becomes one data burst: the Pa/Pb sync
//! preamble, a Pc word carrying the data type, a Pd word carrying the
//! payload length, the payload swapped into 16-bit little-endian words, and
//! zero padding up to the codec's repetition period.

use log::debug;

use crate::burst::OutputQueue;
use crate::engine::{CodecId, StreamHints};
use crate::sync::StreamType;

pub const BURST_SYNC_PA: u16 = 0xF872;
pub const BURST_SYNC_PB: u16 = 0x4E1F;

/// IEC 61937 burst data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Ac3 = 0x01,
    MpegLayer1 = 0x04,
    MpegLayer23 = 0x05,
    Aac = 0x07,
    Dts1 = 0x0B,
    Dts2 = 0x0C,
    Dts3 = 0x0D,
    DtsHd = 0x11,
    Eac3 = 0x15,
    TrueHd = 0x16,
}

impl DataType {
    /// Data rate of the burst stream relative to the coded sample rate.
    /// High-bandwidth types ship over a faster link frame.
    fn rate_multiplier(self) -> usize {
        match self {
            DataType::Eac3 | DataType::DtsHd => 4,
            DataType::TrueHd => 16,
            _ => 1,
        }
    }

    /// Pd counts payload bits for the classic types and payload bytes for
    /// the high-bandwidth ones.
    fn length_in_bytes(self) -> bool {
        matches!(self, DataType::Eac3 | DataType::DtsHd | DataType::TrueHd)
    }
}

/// Wraps compressed frames into IEC 61937 bursts and queues the result.
#[derive(Debug)]
pub struct SpdifFramer {
    queue: OutputQueue,
    codec: CodecId,
    sample_rate: u32,
    bit_rate: u32,
    oversize_logged: bool,
}

impl SpdifFramer {
    /// Establishes the stream header state for one passthrough stream.
    pub fn new(hints: &StreamHints) -> Self {
        let mut framer = Self {
            queue: OutputQueue::default(),
            codec: hints.codec,
            sample_rate: hints.sample_rate,
            bit_rate: hints.bit_rate,
            oversize_logged: false,
        };
        framer.queue.mark_header_written();
        framer
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Updates the stream header in place on a mid-stream rate change.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    pub fn bit_rate(&self) -> u32 {
        self.bit_rate
    }

    pub fn consumed(&self) -> usize {
        self.queue.consumed()
    }

    pub fn pending(&self) -> usize {
        self.queue.queued()
    }

    /// Wraps one frame into a burst. `frame_samples` selects the repetition
    /// period; `stream_type` refines the data type beyond the codec id.
    pub fn write_frame(
        &mut self,
        frame: &[u8],
        frame_samples: usize,
        stream_type: Option<StreamType>,
    ) {
        let data_type = self.data_type(stream_type, frame_samples);
        let period = frame_samples * 4 * data_type.rate_multiplier();

        // 16-bit stereo link frames; a burst occupies one repetition period.
        let burst_len = frame.len() + 8;
        let padded_len = if burst_len <= period && period % 4 == 0 {
            period
        } else {
            if !self.oversize_logged {
                debug!(
                    "{} byte frame exceeds its {} byte burst period, sending unpadded",
                    frame.len(),
                    period
                );
                self.oversize_logged = true;
            }
            burst_len + (burst_len & 1)
        };

        let pd = if data_type.length_in_bytes() {
            frame.len()
        } else {
            frame.len() * 8
        };
        if pd > u16::MAX as usize {
            debug!("burst length word overflows for a {} byte frame", frame.len());
        }

        let mut burst = Vec::with_capacity(padded_len);
        burst.extend_from_slice(&BURST_SYNC_PA.to_le_bytes());
        burst.extend_from_slice(&BURST_SYNC_PB.to_le_bytes());
        burst.extend_from_slice(&(data_type as u16).to_le_bytes());
        burst.extend_from_slice(&(pd as u16).to_le_bytes());

        // Payload bytes ride the link as 16-bit little-endian words.
        let mut chunks = frame.chunks_exact(2);
        for pair in &mut chunks {
            burst.push(pair[1]);
            burst.push(pair[0]);
        }
        if let [last] = chunks.remainder() {
            burst.push(0);
            burst.push(*last);
        }

        burst.resize(padded_len, 0);

        self.queue.add_consumed(frame.len());
        self.queue.push(burst);
    }

    /// Drains all pending bursts as one contiguous block.
    pub fn take(&mut self) -> Vec<u8> {
        self.queue.take()
    }

    /// Discards unwrapped queued output.
    pub fn reset(&mut self) {
        self.queue.reset();
    }

    /// Finalizes the wrapper. IEC 61937 streams carry no trailer; this only
    /// drops whatever the caller never drained.
    pub fn finish(&mut self) {
        if self.queue.header_written() {
            self.queue.reset();
        }
    }

    fn data_type(&self, stream_type: Option<StreamType>, frame_samples: usize) -> DataType {
        match stream_type {
            Some(StreamType::Ac3) => DataType::Ac3,
            Some(StreamType::Eac3) => DataType::Eac3,
            Some(StreamType::DtsHd) => DataType::DtsHd,
            Some(StreamType::Dts) | Some(StreamType::DtsHdCore) => match frame_samples {
                512 => DataType::Dts1,
                1024 => DataType::Dts2,
                _ => DataType::Dts3,
            },
            Some(StreamType::Mlp) | Some(StreamType::TrueHd) => DataType::TrueHd,
            None => match self.codec {
                CodecId::Aac => DataType::Aac,
                CodecId::Mp1 => DataType::MpegLayer1,
                CodecId::Mp2 | CodecId::Mp3 => DataType::MpegLayer23,
                CodecId::Eac3 => DataType::Eac3,
                CodecId::Dts => DataType::Dts1,
                CodecId::Mlp | CodecId::TrueHd => DataType::TrueHd,
                _ => DataType::Ac3,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ac3_hints() -> StreamHints {
        let mut hints = StreamHints::new(CodecId::Ac3);
        hints.sample_rate = 48000;
        hints
    }

    #[test]
    fn ac3_burst_layout() {
        let mut framer = SpdifFramer::new(&ac3_hints());
        let frame: Vec<u8> = (0..256u32).map(|i| i as u8).collect();

        framer.write_frame(&frame, 1536, Some(StreamType::Ac3));
        let burst = framer.take();

        // One repetition period of 16-bit stereo frames.
        assert_eq!(burst.len(), 1536 * 4);
        assert_eq!(&burst[0..2], &BURST_SYNC_PA.to_le_bytes());
        assert_eq!(&burst[2..4], &BURST_SYNC_PB.to_le_bytes());
        assert_eq!(u16::from_le_bytes([burst[4], burst[5]]), 0x01);
        assert_eq!(u16::from_le_bytes([burst[6], burst[7]]), 256 * 8);

        // Payload is byte swapped into LE16 words.
        assert_eq!(burst[8], frame[1]);
        assert_eq!(burst[9], frame[0]);

        // Everything after the payload is zero padding.
        assert!(burst[8 + 256..].iter().all(|&b| b == 0));
    }

    #[test]
    fn odd_length_payload_pads_the_last_word() {
        let mut framer = SpdifFramer::new(&ac3_hints());
        framer.write_frame(&[0xAA, 0xBB, 0xCC], 1536, Some(StreamType::Ac3));
        let burst = framer.take();

        assert_eq!(&burst[8..12], &[0xBB, 0xAA, 0x00, 0xCC]);
    }

    #[test]
    fn dts_data_type_tracks_the_block_count() {
        let mut framer = SpdifFramer::new(&StreamHints::new(CodecId::Dts));

        for (samples, expected) in [
            (512usize, DataType::Dts1 as u16),
            (1024, DataType::Dts2 as u16),
            (2048, DataType::Dts3 as u16),
        ] {
            framer.write_frame(&[0u8; 96], samples, Some(StreamType::Dts));
            let burst = framer.take();
            assert_eq!(u16::from_le_bytes([burst[4], burst[5]]), expected);
            assert_eq!(burst.len(), samples * 4);
        }
    }

    #[test]
    fn eac3_length_word_counts_bytes() {
        let mut framer = SpdifFramer::new(&StreamHints::new(CodecId::Eac3));
        framer.write_frame(&[0u8; 512], 1536, Some(StreamType::Eac3));
        let burst = framer.take();

        assert_eq!(u16::from_le_bytes([burst[4], burst[5]]), DataType::Eac3 as u16);
        assert_eq!(u16::from_le_bytes([burst[6], burst[7]]), 512);
        assert_eq!(burst.len(), 1536 * 4 * 4);
    }

    #[test]
    fn oversize_frame_is_sent_unpadded() {
        let mut framer = SpdifFramer::new(&ac3_hints());
        framer.write_frame(&[0u8; 700], 128, Some(StreamType::Ac3));
        let burst = framer.take();

        assert_eq!(burst.len(), 708);
    }

    #[test]
    fn reset_discards_queued_bursts() {
        let mut framer = SpdifFramer::new(&ac3_hints());
        framer.write_frame(&[0u8; 128], 1536, Some(StreamType::Ac3));
        assert!(framer.pending() > 0);

        framer.reset();
        assert_eq!(framer.pending(), 0);
        assert!(framer.take().is_empty());
    }
}
