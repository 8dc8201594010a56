//! The passthrough codec engine.
//!
//! Bridges arbitrarily chunked elementary-stream input and whole-frame burst
//! output: buffers input in a bounded working buffer, lets the codec's sync
//! detector establish frame boundaries, and hands each completed frame to
//! the IEC 61937 framer. AAC input is ADTS-wrapped first; streams the device
//! cannot accept natively are routed through the AC-3 transcode fallback.

use log::{debug, info};

use crate::burst::{AdtsFramer, SpdifFramer};
use crate::engine::transcode::{AudioDecoder, AudioEncoder, Transcoder};
use crate::engine::{
    CodecId, DeviceCaps, DtsLevel, OUT_BITS_PER_SAMPLE, OUT_CHANNELS, OutputEncoding, StreamHints,
};
use crate::sync::{Ac3Sync, AacSync, DtsSync, FrameSync, MlpSync, StreamType, SyncState};
use crate::utils::buffer::FrameBuffer;
use crate::utils::errors::{DecodeError, OpenError};

/// Working buffer capacity, sized to hold the largest elementary frame.
const WORKING_BUFFER_SIZE: usize = 192_000;

/// DTS-HD link rate hint applied when the stream level reaches HRA.
const DTSHD_RATE: u32 = 768_000;

pub struct PassthroughEngine {
    spdif: SpdifFramer,
    adts: Option<AdtsFramer>,
    sync: Option<FrameSync>,
    state: SyncState,
    buffer: FrameBuffer,
    transcoder: Option<Transcoder>,
    encoding: OutputEncoding,
    closed: bool,
}

impl PassthroughEngine {
    /// Opens a direct passthrough stream. Fails cleanly when the device does
    /// not accept the hinted format; no resources are allocated in that case.
    pub fn open(hints: StreamHints, caps: &DeviceCaps) -> Result<Self, OpenError> {
        Self::open_inner(hints, caps, None)
    }

    /// Opens with the AC-3 transcode fallback available. The fallback is only
    /// engaged when direct passthrough is impossible, the source has more
    /// than two channels and the device accepts AC-3.
    pub fn open_with_fallback(
        hints: StreamHints,
        caps: &DeviceCaps,
        decoder: Box<dyn AudioDecoder>,
        encoder: Box<dyn AudioEncoder>,
    ) -> Result<Self, OpenError> {
        Self::open_inner(hints, caps, Some((decoder, encoder)))
    }

    fn open_inner(
        mut hints: StreamHints,
        caps: &DeviceCaps,
        fallback: Option<(Box<dyn AudioDecoder>, Box<dyn AudioEncoder>)>,
    ) -> Result<Self, OpenError> {
        let mut transcoder = None;

        let sync = match select_sync(&mut hints, caps) {
            Ok(sync) => sync,
            Err(err) => {
                let Some((decoder, encoder)) = fallback else {
                    return Err(err);
                };

                if hints.channels <= OUT_CHANNELS {
                    return Err(OpenError::TranscodeChannelCount(hints.channels));
                }
                if !caps.ac3 {
                    return Err(OpenError::TranscodeUnavailable);
                }

                info!("setting up the AC-3 transcode fallback for {:?}", hints.codec);
                let glue = Transcoder::new(decoder, encoder);

                // Adjust the hints to what the encoder will emit and retry.
                hints.codec = CodecId::Ac3;
                hints.bit_rate = glue.encoder_bit_rate();
                hints.channels = OUT_CHANNELS;
                let sync = select_sync(&mut hints, caps)?;
                transcoder = Some(glue);
                sync
            }
        };

        // Raw AAC needs ADTS wrapping before burst framing.
        let adts = if transcoder.is_none() && hints.codec == CodecId::Aac {
            Some(AdtsFramer::new(&hints)?)
        } else {
            None
        };

        if hints.sample_rate == 0 && hints.codec == CodecId::Ac3 {
            hints.sample_rate = 48000;
        }
        if hints.codec == CodecId::Dts && hints.dts_level >= Some(DtsLevel::HdHra) {
            hints.bit_rate = DTSHD_RATE;
        }

        let encoding = encoding_for(&hints);
        let spdif = SpdifFramer::new(&hints);
        let mut state = SyncState::new(hints.sample_rate);

        // Pre-framed MPEG input never passes a detector, so the burst period
        // comes from the layer's fixed frame duration.
        if sync.is_none() {
            state.frame_samples = match hints.codec {
                CodecId::Mp1 => 384,
                _ => 1152,
            };
        }

        info!(
            "passthrough ready for {:?}, output encoding {}",
            hints.codec, encoding
        );

        Ok(Self {
            spdif,
            adts,
            sync,
            state,
            buffer: FrameBuffer::with_capacity(WORKING_BUFFER_SIZE),
            transcoder,
            encoding,
            closed: false,
        })
    }

    /// Consumes a chunk of elementary-stream bytes, producing bursts into the
    /// internal queue. Returns how many input bytes were consumed; the caller
    /// resubmits the remainder on the next call.
    pub fn decode(&mut self, input: &[u8]) -> Result<usize, DecodeError> {
        if let Some(transcoder) = &mut self.transcoder {
            return transcoder.process(input, &mut self.spdif);
        }

        // AAC first passes through the ADTS wrapping stage; the wrapped
        // stream is then consumed in full below.
        let adts_output;
        let (data, adts_used) = match &mut self.adts {
            Some(adts) => {
                adts.write_frame(input);
                adts_output = adts.take();
                (adts_output.as_slice(), Some(input.len()))
            }
            None => (input, None),
        };

        let mut pos = 0;
        let mut used = 0;
        loop {
            let mut progressed = false;

            // Search for a frame start while the frame size is unknown.
            if self.state.in_frame_size == 0 {
                let copied = self.buffer.append_limited(&data[pos..], usize::MAX);
                pos += copied;
                used += copied;
                progressed |= copied > 0;

                match &mut self.sync {
                    Some(sync) => {
                        let skip = sync.scan(&mut self.state, self.buffer.as_slice());
                        if skip > 0 {
                            self.buffer.consume_front(skip);
                            progressed = true;
                        }
                    }
                    // Already-framed input: the present buffer is one frame.
                    None => {
                        self.state.set_frame(self.buffer.len());
                    }
                }

                if self.state.in_frame_size > self.buffer.capacity() {
                    let size = self.state.in_frame_size;
                    self.state.reset();
                    self.buffer.clear();
                    return Err(DecodeError::FrameExceedsBuffer {
                        size,
                        capacity: WORKING_BUFFER_SIZE,
                    });
                }
            }

            let mut repeat = pos < data.len();

            // Collect the frame and hand it to the framer.
            if self.state.in_frame_size > 0 {
                let need = self.state.in_frame_size.saturating_sub(self.buffer.len());
                let copied = self.buffer.append_limited(&data[pos..], need);
                pos += copied;
                used += copied;
                progressed |= copied > 0;
                repeat = pos < data.len();

                if self.buffer.len() >= self.state.in_frame_size {
                    self.spdif.write_frame(
                        &self.buffer.as_slice()[..self.state.out_frame_size],
                        self.state.frame_samples,
                        self.state.stream_type,
                    );
                    self.buffer.consume_front(self.state.in_frame_size);
                    self.state.in_frame_size = 0;
                    progressed = true;
                    repeat |= !self.buffer.is_empty();
                }
            }

            if self.spdif.sample_rate() != self.state.sample_rate {
                debug!(
                    "stream changed sample rate from {} to {}",
                    self.spdif.sample_rate(),
                    self.state.sample_rate
                );
                self.spdif.set_sample_rate(self.state.sample_rate);
            }

            // A pass that moved nothing will not move anything next time
            // either; report what was consumed and let the caller resubmit.
            if !repeat || !progressed {
                break;
            }
        }

        Ok(adts_used.unwrap_or(used))
    }

    /// Drains one burst of wrapped output, possibly covering several frames
    /// when the caller lags. Empty when nothing is pending.
    pub fn get_data(&mut self) -> Vec<u8> {
        self.spdif.take()
    }

    /// Discards all buffered and queued state and re-enters sync searching.
    /// Safe to call between any two `decode` calls.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state.reset();
        self.spdif.reset();
        if let Some(adts) = &mut self.adts {
            adts.reset();
        }
        if let Some(transcoder) = &mut self.transcoder {
            transcoder.reset();
        }
    }

    /// Releases framer and fallback resources. Idempotent; also run on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.reset();
        self.spdif.finish();
        if let Some(adts) = &mut self.adts {
            adts.finish();
        }
        self.transcoder = None;
    }

    /// The wrapper encoding the renderer should announce.
    pub fn encoding(&self) -> OutputEncoding {
        self.encoding
    }

    /// Stream type established by the last successful sync.
    pub fn stream_type(&self) -> Option<StreamType> {
        self.state.stream_type
    }

    pub fn sample_rate(&self) -> u32 {
        self.spdif.sample_rate()
    }

    /// The link signal is always presented as stereo; real channel layout
    /// is the receiver's business.
    pub fn channels(&self) -> usize {
        OUT_CHANNELS
    }

    pub fn bits_per_sample(&self) -> usize {
        OUT_BITS_PER_SAMPLE
    }

    /// Bytes buffered inside the engine, for pipeline latency accounting.
    pub fn buffer_size(&self) -> usize {
        match &self.transcoder {
            Some(transcoder) => transcoder.buffered(),
            None => {
                self.spdif.consumed()
                    + self.adts.as_ref().map_or(0, |adts| adts.consumed())
                    + self.buffer.len()
            }
        }
    }
}

impl Drop for PassthroughEngine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Picks the sync detector for the hinted codec, honoring the capability
/// flags. For DTS the requested level is clamped to the device ceiling,
/// degrading to a core level when the device allows it. MP1/2/3 input
/// arrives pre-framed and needs no detector.
fn select_sync(
    hints: &mut StreamHints,
    caps: &DeviceCaps,
) -> Result<Option<FrameSync>, OpenError> {
    let unsupported = OpenError::UnsupportedFormat(hints.codec);
    let sync = match hints.codec {
        CodecId::Ac3 if caps.ac3 => Some(FrameSync::Ac3(Ac3Sync::default())),
        CodecId::Eac3 if caps.eac3 => Some(FrameSync::Ac3(Ac3Sync::default())),
        CodecId::Dts => {
            let Some(ceiling) = caps.dts_level else {
                return Err(unsupported);
            };

            let mut level = hints.dts_level.unwrap_or(DtsLevel::Core);
            if level > ceiling {
                if !caps.dts_core_fallback {
                    return Err(unsupported);
                }
                level = match ceiling {
                    DtsLevel::HdMa => DtsLevel::HdMa,
                    // HRA devices take the 96/24 core when degraded.
                    DtsLevel::HdHra => DtsLevel::Hd9624,
                    DtsLevel::Hd9624 => DtsLevel::Hd9624,
                    DtsLevel::Es => DtsLevel::Es,
                    DtsLevel::Core => DtsLevel::Core,
                };
                info!(
                    "degrading DTS level {} to {} for this device",
                    hints.dts_level.unwrap_or(DtsLevel::Core),
                    level
                );
                hints.dts_level = Some(level);
            }

            let core_only = level <= DtsLevel::Hd9624;
            Some(FrameSync::Dts(DtsSync::new(core_only)))
        }
        CodecId::Aac if caps.aac => Some(FrameSync::Aac(AacSync::default())),
        CodecId::Mp1 if caps.mp1 => None,
        CodecId::Mp2 if caps.mp2 => None,
        CodecId::Mp3 if caps.mp3 => None,
        CodecId::TrueHd if caps.truehd => Some(FrameSync::Mlp(MlpSync::default())),
        CodecId::Mlp if caps.mlp => Some(FrameSync::Mlp(MlpSync::default())),
        _ => return Err(unsupported),
    };

    Ok(sync)
}

fn encoding_for(hints: &StreamHints) -> OutputEncoding {
    match hints.codec {
        CodecId::Ac3 => OutputEncoding::Ac3,
        CodecId::Eac3 => OutputEncoding::Eac3,
        CodecId::Dts => {
            if hints.dts_level >= Some(DtsLevel::HdHra) {
                OutputEncoding::DtsHd
            } else {
                OutputEncoding::Dts
            }
        }
        CodecId::Mp1 | CodecId::Mp2 | CodecId::Mp3 => OutputEncoding::Mpeg,
        CodecId::Mlp | CodecId::TrueHd => OutputEncoding::Mat,
        CodecId::Aac => OutputEncoding::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::transcode::stubs::{StubDecoder, StubEncoder};
    use crate::sync::{ac3, dts};

    fn ac3_hints() -> StreamHints {
        let mut hints = StreamHints::new(CodecId::Ac3);
        hints.channels = 6;
        hints.sample_rate = 48000;
        hints
    }

    #[test]
    fn open_fails_cleanly_for_unsupported_formats() {
        let mut caps = DeviceCaps::all();
        caps.eac3 = false;

        let result = PassthroughEngine::open(StreamHints::new(CodecId::Eac3), &caps);
        assert!(matches!(result, Err(OpenError::UnsupportedFormat(_))));
    }

    #[test]
    fn round_trip_counts_frames_and_bytes() {
        let frame = ac3::test_frame(0, 2, 8);
        let mut stream = Vec::new();
        for _ in 0..5 {
            stream.extend_from_slice(&frame);
        }

        let mut engine = PassthroughEngine::open(ac3_hints(), &DeviceCaps::all()).unwrap();

        let mut consumed = 0;
        let mut bursts = 0;
        while consumed < stream.len() {
            let used = engine.decode(&stream[consumed..]).unwrap();
            assert!(used > 0);
            consumed += used;

            let out = engine.get_data();
            bursts += out.chunks(1536 * 4).count();
        }

        assert_eq!(consumed, stream.len());
        assert_eq!(bursts, 5);
        assert_eq!(engine.stream_type(), Some(StreamType::Ac3));
    }

    #[test]
    fn split_input_produces_identical_output() {
        let frame = ac3::test_frame(0, 2, 8);

        // Two copies so the second frame confirms the first one's boundary.
        let mut stream = frame.clone();
        stream.extend_from_slice(&frame);

        let reference = {
            let mut engine = PassthroughEngine::open(ac3_hints(), &DeviceCaps::all()).unwrap();
            let used = engine.decode(&stream).unwrap();
            assert_eq!(used, stream.len());
            engine.get_data()
        };

        for split in 0..stream.len() {
            let mut engine = PassthroughEngine::open(ac3_hints(), &DeviceCaps::all()).unwrap();
            let mut output = Vec::new();

            for part in [&stream[..split], &stream[split..]] {
                let mut fed = 0;
                while fed < part.len() {
                    let used = engine.decode(&part[fed..]).unwrap();
                    output.extend_from_slice(&engine.get_data());
                    if used == 0 {
                        break;
                    }
                    fed += used;
                }
            }

            assert_eq!(output, reference, "split at {split}");
        }
    }

    #[test]
    fn capability_downgrade_keeps_the_core() {
        let mut caps = DeviceCaps::all();
        caps.dts_level = Some(DtsLevel::Hd9624);
        caps.dts_core_fallback = true;

        let mut hints = StreamHints::new(CodecId::Dts);
        hints.channels = 6;
        hints.sample_rate = 48000;
        hints.dts_level = Some(DtsLevel::HdMa);

        let mut engine = PassthroughEngine::open(hints, &caps).unwrap();
        assert_eq!(engine.encoding(), OutputEncoding::Dts);

        let mut stream = Vec::new();
        for _ in 0..2 {
            let mut unit = dts::test_core_frame_16be(1024, 13, 2012);
            dts::append_hd_extension(&mut unit, 4096);
            stream.extend_from_slice(&unit);
        }
        stream.extend_from_slice(&[0u8; 16]);

        let mut consumed = 0;
        while consumed < stream.len() {
            let used = engine.decode(&stream[consumed..]).unwrap();
            if used == 0 {
                break;
            }
            consumed += used;
        }

        assert_eq!(engine.stream_type(), Some(StreamType::DtsHdCore));

        // Only the cores are forwarded: two 1024-sample DTS bursts, each
        // carrying the 2012 byte core and none of the extension.
        let out = engine.get_data();
        assert_eq!(out.len(), 2 * 1024 * 4);
        assert_eq!(u16::from_le_bytes([out[4], out[5]]), 0x0C);
        assert_eq!(u16::from_le_bytes([out[6], out[7]]) as usize, 2012 * 8);
    }

    #[test]
    fn downgrade_requires_the_fallback_flag() {
        let mut caps = DeviceCaps::all();
        caps.dts_level = Some(DtsLevel::Hd9624);
        caps.dts_core_fallback = false;

        let mut hints = StreamHints::new(CodecId::Dts);
        hints.dts_level = Some(DtsLevel::HdMa);

        assert!(matches!(
            PassthroughEngine::open(hints, &caps),
            Err(OpenError::UnsupportedFormat(CodecId::Dts))
        ));
    }

    #[test]
    fn preframed_input_is_forwarded_whole() {
        let mut hints = StreamHints::new(CodecId::Mp3);
        hints.sample_rate = 48000;

        let mut engine = PassthroughEngine::open(hints, &DeviceCaps::all()).unwrap();
        let packet = vec![0x11u8; 417];

        assert_eq!(engine.decode(&packet).unwrap(), packet.len());
        let out = engine.get_data();
        assert_eq!(out.len(), 1152 * 4);
        assert_eq!(u16::from_le_bytes([out[4], out[5]]), 0x05);
    }

    #[test]
    fn aac_input_is_adts_wrapped_and_consumed_whole() {
        let mut hints = StreamHints::new(CodecId::Aac);
        hints.sample_rate = 48000;
        hints.channels = 2;

        let mut engine = PassthroughEngine::open(hints, &DeviceCaps::all()).unwrap();
        let packet = vec![0x22u8; 300];

        assert_eq!(engine.decode(&packet).unwrap(), packet.len());

        let out = engine.get_data();
        assert_eq!(out.len(), 1024 * 4);
        assert_eq!(u16::from_le_bytes([out[4], out[5]]), 0x07);
        // Pd counts the ADTS-wrapped frame.
        assert_eq!(u16::from_le_bytes([out[6], out[7]]) as usize, (300 + 7) * 8);
    }

    #[test]
    fn reset_discards_pending_state() {
        let frame = ac3::test_frame(0, 2, 8);
        let mut engine = PassthroughEngine::open(ac3_hints(), &DeviceCaps::all()).unwrap();

        // Feed one and a half frames, then reset mid-frame.
        let mut stream = frame.clone();
        stream.extend_from_slice(&frame[..frame.len() / 2]);
        engine.decode(&stream).unwrap();
        engine.reset();

        assert!(engine.get_data().is_empty());
        assert_eq!(engine.buffer_size(), 0);
        assert_eq!(engine.stream_type(), None);

        // The engine re-syncs from scratch afterwards.
        let mut fed = 0;
        while fed < stream.len() {
            let used = engine.decode(&stream[fed..]).unwrap();
            if used == 0 {
                break;
            }
            fed += used;
        }
        assert!(!engine.get_data().is_empty());
    }

    #[test]
    fn transcode_fallback_requires_multichannel() {
        let mut caps = DeviceCaps::all();
        caps.eac3 = false;

        let mut hints = StreamHints::new(CodecId::Eac3);
        hints.channels = 2;

        let decoder = StubDecoder {
            gain: 64,
            warmup_calls: 0,
            channels: 2,
        };
        let encoder = StubEncoder {
            packet_size: 32,
            fail_init: false,
            coded: Vec::new(),
        };

        assert!(matches!(
            PassthroughEngine::open_with_fallback(
                hints,
                &caps,
                Box::new(decoder),
                Box::new(encoder)
            ),
            Err(OpenError::TranscodeChannelCount(2))
        ));
    }

    #[test]
    fn transcode_fallback_reencodes_to_ac3() {
        let mut caps = DeviceCaps::all();
        caps.eac3 = false;

        let mut hints = StreamHints::new(CodecId::Eac3);
        hints.channels = 6;
        hints.sample_rate = 48000;

        let decoder = StubDecoder {
            gain: 512,
            warmup_calls: 0,
            channels: 6,
        };
        let encoder = StubEncoder {
            packet_size: 256,
            fail_init: false,
            coded: Vec::new(),
        };

        let mut engine = PassthroughEngine::open_with_fallback(
            hints,
            &caps,
            Box::new(decoder),
            Box::new(encoder),
        )
        .unwrap();

        assert_eq!(engine.encoding(), OutputEncoding::Ac3);
        assert_eq!(engine.decode(&[0u8; 16]).unwrap(), 16);

        let out = engine.get_data();
        assert!(!out.is_empty());
        assert_eq!(u16::from_le_bytes([out[4], out[5]]), 0x01);
    }
}
