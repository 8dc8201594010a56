//! AC-3 transcode fallback.
//!
//! When the destination cannot accept the native format, multichannel audio
//! is decoded and re-encoded to AC-3 before burst framing. The decoder and
//! encoder are external collaborators consumed through narrow traits; this
//! module only owns the glue that keeps the encoder fed with exact packets.

use anyhow::Result;
use log::info;

use crate::burst::SpdifFramer;
use crate::sync::StreamType;
use crate::utils::errors::DecodeError;

/// External decoder feeding the fallback path.
pub trait AudioDecoder {
    /// Consumes input bytes, returning how many were accepted.
    fn decode(&mut self, data: &[u8]) -> Result<usize>;

    /// Drains interleaved PCM produced since the last call. Empty output for
    /// the first few frames is expected while the decoder locks on.
    fn take_samples(&mut self) -> Vec<u8>;

    fn channels(&self) -> usize;
    fn sample_rate(&self) -> u32;
    fn bits_per_sample(&self) -> usize;

    fn reset(&mut self) {}
}

/// External AC-3 encoder feeding the burst framer.
pub trait AudioEncoder {
    /// Configures the encoder once the decoder has revealed the channel
    /// layout. Failure here is fatal to the stream.
    fn initialize(&mut self, channels: usize, bits_per_sample: usize, sample_rate: u32)
    -> Result<()>;

    /// Bytes of PCM the encoder consumes per packet. Valid after
    /// [`initialize`](AudioEncoder::initialize).
    fn packet_size(&self) -> usize;

    fn bit_rate(&self) -> u32;

    /// Encodes exactly one packet of PCM, returning the bytes consumed.
    fn encode(&mut self, packet: &[u8]) -> usize;

    /// Drains one coded frame, or an empty vec when none is pending.
    fn take_coded(&mut self) -> Vec<u8>;

    fn reset(&mut self) {}
}

/// Glue between the external decoder/encoder pair and the burst framer.
pub struct Transcoder {
    decoder: Box<dyn AudioDecoder>,
    encoder: Box<dyn AudioEncoder>,
    init_encoder: bool,
    packet_size: usize,
    /// Decoded PCM awaiting encoding; holds at most two packets.
    pending: Vec<u8>,
}

impl Transcoder {
    pub fn new(decoder: Box<dyn AudioDecoder>, encoder: Box<dyn AudioEncoder>) -> Self {
        Self {
            decoder,
            encoder,
            init_encoder: true,
            packet_size: 0,
            pending: Vec::new(),
        }
    }

    pub fn encoder_bit_rate(&self) -> u32 {
        self.encoder.bit_rate()
    }

    /// PCM bytes buffered between encoder packets.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.decoder.reset();
        self.encoder.reset();
    }

    /// Feeds input through decode, packet assembly and encode, writing every
    /// coded frame into the burst framer. Returns input bytes consumed.
    pub fn process(&mut self, data: &[u8], spdif: &mut SpdifFramer) -> Result<usize, DecodeError> {
        let used = self.decoder.decode(data).map_err(DecodeError::Fallback)?;
        let decoded = self.decoder.take_samples();

        // No data for a few frames is expected.
        if decoded.is_empty() {
            return Ok(used);
        }

        // With samples flowing the channel map is known, so the encoder can
        // be brought up.
        if self.init_encoder {
            self.encoder
                .initialize(
                    self.decoder.channels(),
                    self.decoder.bits_per_sample(),
                    self.decoder.sample_rate(),
                )
                .map_err(DecodeError::EncoderSetup)?;
            self.init_encoder = false;
            self.packet_size = self.encoder.packet_size();
            self.pending = Vec::with_capacity(self.packet_size * 2);
            info!(
                "fallback encoder ready, {} byte packets at {} bit/s",
                self.packet_size,
                self.encoder.bit_rate()
            );
        }

        let mut avail = decoded.len() + self.pending.len();
        let mut pos = 0;
        while self.packet_size > 0 && avail >= self.packet_size {
            // Top the pending buffer up to one packet.
            if self.pending.len() < self.packet_size {
                let copy = (decoded.len() - pos).min(self.packet_size);
                self.pending.extend_from_slice(&decoded[pos..pos + copy]);
                pos += copy;
            }

            let consumed = self.encoder.encode(&self.pending[..self.packet_size]);
            avail -= consumed;
            self.pending.drain(..consumed);

            loop {
                let coded = self.encoder.take_coded();
                if coded.is_empty() {
                    break;
                }
                spdif.write_frame(&coded, 1536, Some(StreamType::Ac3));
            }
        }

        // Keep whatever is left for the next call.
        self.pending.extend_from_slice(&decoded[pos..]);
        Ok(used)
    }
}

#[cfg(test)]
pub(crate) mod stubs {
    use super::*;
    use anyhow::bail;

    /// Decoder stub that emits a fixed number of PCM bytes per input byte.
    pub struct StubDecoder {
        pub gain: usize,
        pub warmup_calls: usize,
        pub channels: usize,
    }

    impl AudioDecoder for StubDecoder {
        fn decode(&mut self, data: &[u8]) -> Result<usize> {
            Ok(data.len())
        }

        fn take_samples(&mut self) -> Vec<u8> {
            if self.warmup_calls > 0 {
                self.warmup_calls -= 1;
                return Vec::new();
            }
            vec![0x5A; self.gain]
        }

        fn channels(&self) -> usize {
            self.channels
        }

        fn sample_rate(&self) -> u32 {
            48000
        }

        fn bits_per_sample(&self) -> usize {
            16
        }
    }

    /// Encoder stub producing one fixed-size coded frame per packet.
    pub struct StubEncoder {
        pub packet_size: usize,
        pub fail_init: bool,
        pub coded: Vec<Vec<u8>>,
    }

    impl AudioEncoder for StubEncoder {
        fn initialize(&mut self, channels: usize, _bits: usize, _rate: u32) -> Result<()> {
            if self.fail_init {
                bail!("no encoder for {channels} channels");
            }
            Ok(())
        }

        fn packet_size(&self) -> usize {
            self.packet_size
        }

        fn bit_rate(&self) -> u32 {
            640_000
        }

        fn encode(&mut self, packet: &[u8]) -> usize {
            self.coded.push(vec![0xC3; 64]);
            packet.len()
        }

        fn take_coded(&mut self) -> Vec<u8> {
            self.coded.pop().unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::stubs::{StubDecoder, StubEncoder};
    use super::*;
    use crate::engine::{CodecId, StreamHints};

    fn framer() -> SpdifFramer {
        let mut hints = StreamHints::new(CodecId::Ac3);
        hints.sample_rate = 48000;
        SpdifFramer::new(&hints)
    }

    #[test]
    fn packets_are_assembled_across_calls() {
        let decoder = StubDecoder {
            gain: 100,
            warmup_calls: 0,
            channels: 6,
        };
        let encoder = StubEncoder {
            packet_size: 256,
            fail_init: false,
            coded: Vec::new(),
        };

        let mut transcoder = Transcoder::new(Box::new(decoder), Box::new(encoder));
        let mut spdif = framer();

        // 100 PCM bytes per call: the first two calls stay below one packet.
        assert_eq!(transcoder.process(&[0; 10], &mut spdif).unwrap(), 10);
        assert_eq!(transcoder.process(&[0; 10], &mut spdif).unwrap(), 10);
        assert!(spdif.take().is_empty());
        assert_eq!(transcoder.buffered(), 200);

        // The third call crosses the packet boundary.
        transcoder.process(&[0; 10], &mut spdif).unwrap();
        assert!(!spdif.take().is_empty());
        assert_eq!(transcoder.buffered(), 300 - 256);
    }

    #[test]
    fn warmup_frames_produce_no_output() {
        let decoder = StubDecoder {
            gain: 4096,
            warmup_calls: 2,
            channels: 6,
        };
        let encoder = StubEncoder {
            packet_size: 1024,
            fail_init: false,
            coded: Vec::new(),
        };

        let mut transcoder = Transcoder::new(Box::new(decoder), Box::new(encoder));
        let mut spdif = framer();

        assert_eq!(transcoder.process(&[0; 8], &mut spdif).unwrap(), 8);
        assert_eq!(transcoder.process(&[0; 8], &mut spdif).unwrap(), 8);
        assert!(spdif.take().is_empty());

        transcoder.process(&[0; 8], &mut spdif).unwrap();
        assert!(!spdif.take().is_empty());
    }

    #[test]
    fn encoder_init_failure_is_fatal() {
        let decoder = StubDecoder {
            gain: 64,
            warmup_calls: 0,
            channels: 6,
        };
        let encoder = StubEncoder {
            packet_size: 32,
            fail_init: true,
            coded: Vec::new(),
        };

        let mut transcoder = Transcoder::new(Box::new(decoder), Box::new(encoder));
        let mut spdif = framer();

        assert!(matches!(
            transcoder.process(&[0; 8], &mut spdif),
            Err(DecodeError::EncoderSetup(_))
        ));
    }
}
