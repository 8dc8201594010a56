//! ADTS framing for raw AAC streams.
//!
//! Raw AAC packets carry no self-describing header, so each one is prefixed
//! with a fixed-size ADTS header before IEC 61937 wrapping. The header
//! fields are seeded from the stream hints and refined from the
//! AudioSpecificConfig extradata when the container supplied one.

use log::{debug, warn};

use crate::burst::OutputQueue;
use crate::engine::StreamHints;
use crate::utils::bitstream::BitSliceReader;
use crate::utils::errors::OpenError;

pub const ADTS_HEADER_SIZE: usize = 7;

/// Maximum representable aac_frame_length (13 bits).
const MAX_FRAME_LENGTH: usize = (1 << 13) - 1;

/// Sample rates indexed by the ADTS sampling_frequency_index.
const ADTS_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Inserts an ADTS header in front of each raw AAC frame.
#[derive(Debug)]
pub struct AdtsFramer {
    queue: OutputQueue,
    /// 2-bit profile field (audio object type minus one).
    profile: u8,
    rate_index: u8,
    channel_config: u8,
}

impl AdtsFramer {
    pub fn new(hints: &StreamHints) -> Result<Self, OpenError> {
        // AAC LC at the hinted rate and channel count unless the extradata
        // says otherwise.
        let mut object_type = 2u8;
        let mut rate_index = rate_to_index(hints.sample_rate);
        let mut channel_config = hints.channels.min(7) as u8;

        if !hints.extradata.is_empty() {
            let mut reader = BitSliceReader::from_slice(&hints.extradata);
            (object_type, rate_index, channel_config) =
                read_audio_specific_config(&mut reader).map_err(|_| OpenError::InvalidExtradata)?;
            debug!(
                "audio specific config: object type {object_type}, rate index {rate_index}, \
                 {channel_config} channel(s)"
            );
        }

        let mut framer = Self {
            queue: OutputQueue::default(),
            profile: object_type.saturating_sub(1).min(3),
            rate_index,
            channel_config,
        };
        framer.queue.mark_header_written();
        Ok(framer)
    }

    pub fn consumed(&self) -> usize {
        self.queue.consumed()
    }

    /// Prefixes one raw AAC frame with its ADTS header and queues the result.
    /// Input that already begins with an ADTS sync passes through untouched.
    pub fn write_frame(&mut self, frame: &[u8]) {
        if frame.len() >= 2 && frame[0] == 0xFF && frame[1] & 0xF0 == 0xF0 {
            self.queue.add_consumed(frame.len());
            self.queue.push(frame.to_vec());
            return;
        }

        let length = frame.len() + ADTS_HEADER_SIZE;
        if length > MAX_FRAME_LENGTH {
            warn!("dropping {} byte AAC packet, too large for ADTS", frame.len());
            return;
        }

        let mut packet = Vec::with_capacity(length);
        packet.push(0xFF);
        packet.push(0xF1); // MPEG-4, layer 0, no CRC
        packet.push((self.profile << 6) | (self.rate_index << 2) | (self.channel_config >> 2));
        packet.push(((self.channel_config & 0x3) << 6) | ((length >> 11) as u8 & 0x3));
        packet.push((length >> 3) as u8);
        packet.push((((length & 0x7) as u8) << 5) | 0x1F); // buffer fullness all ones
        packet.push(0xFC);
        packet.extend_from_slice(frame);

        self.queue.add_consumed(frame.len());
        self.queue.push(packet);
    }

    pub fn take(&mut self) -> Vec<u8> {
        self.queue.take()
    }

    pub fn reset(&mut self) {
        self.queue.reset();
    }

    pub fn finish(&mut self) {
        if self.queue.header_written() {
            self.queue.reset();
        }
    }
}

fn rate_to_index(sample_rate: u32) -> u8 {
    ADTS_SAMPLE_RATES
        .iter()
        .position(|&rate| rate == sample_rate)
        .unwrap_or(3) as u8
}

/// Reads the leading fields of an AudioSpecificConfig: object type, sampling
/// frequency index and channel configuration.
fn read_audio_specific_config(reader: &mut BitSliceReader) -> std::io::Result<(u8, u8, u8)> {
    let mut object_type: u8 = reader.get_n(5)?;
    if object_type == 31 {
        object_type = 32 + reader.get_n::<u8>(6)?;
    }

    let mut rate_index: u8 = reader.get_n(4)?;
    if rate_index == 15 {
        // Explicit 24-bit rate; map back to the nearest table entry.
        let rate: u32 = reader.get_n(24)?;
        rate_index = ADTS_SAMPLE_RATES
            .iter()
            .position(|&table| table <= rate)
            .unwrap_or(ADTS_SAMPLE_RATES.len() - 1) as u8;
    }

    let channel_config: u8 = reader.get_n(4)?;
    Ok((object_type, rate_index, channel_config))
}

/// Builds one ADTS frame with a deterministic payload.
#[cfg(test)]
pub(crate) fn test_adts_frame(payload: usize) -> Vec<u8> {
    let mut hints = StreamHints::new(crate::engine::CodecId::Aac);
    hints.sample_rate = 48000;
    hints.channels = 2;

    let body: Vec<u8> = (0..payload).map(|i| (i * 31 + 1) as u8).collect();
    let mut framer = AdtsFramer::new(&hints).unwrap();
    framer.write_frame(&body);
    framer.take()
}
