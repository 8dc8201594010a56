//! Frame synchronization for compressed audio elementary streams.
//!
//! Each detector scans an arbitrary byte window for its codec's sync pattern,
//! validates the candidate (checksum, parity or header sanity) and reports
//! how many leading bytes are definitely not part of a valid frame.
//!
//! ## Contract
//!
//! `scan(state, window)` returns a skip count. A return of `0` with
//! `state.lost_sync == false` and `state.in_frame_size > 0` means a frame
//! starts at offset 0 with known size. A non-zero skip means the caller may
//! discard that many bytes and try again, usually with more data appended.

use std::fmt::Display;

use crate::engine::CodecId;

pub mod aac;
pub mod ac3;
pub mod dts;
pub mod mlp;

pub use aac::AacSync;
pub use ac3::Ac3Sync;
pub use dts::DtsSync;
pub use mlp::MlpSync;

/// Stream classification established by a successful sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Ac3,
    Eac3,
    Dts,
    DtsHd,
    DtsHdCore,
    Mlp,
    TrueHd,
}

impl Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamType::Ac3 => write!(f, "AC-3"),
            StreamType::Eac3 => write!(f, "E-AC-3"),
            StreamType::Dts => write!(f, "DTS"),
            StreamType::DtsHd => write!(f, "DTS-HD"),
            StreamType::DtsHdCore => write!(f, "DTS-HD (core only)"),
            StreamType::Mlp => write!(f, "MLP"),
            StreamType::TrueHd => write!(f, "Dolby TrueHD"),
        }
    }
}

/// Mutable synchronization state shared between a detector and the engine.
///
/// Only the matching detector mutates it; the accumulator and orchestrator
/// read it. `out_frame_size` never exceeds `in_frame_size` (they differ only
/// for DTS-HD core-only truncation).
#[derive(Debug)]
pub struct SyncState {
    /// No valid frame located in the current window yet.
    pub lost_sync: bool,
    /// Bytes to consume from the input to complete one coded frame.
    pub in_frame_size: usize,
    /// Bytes of that frame to forward to the framer.
    pub out_frame_size: usize,
    pub sample_rate: u32,
    pub stream_type: Option<StreamType>,
    /// PCM samples represented by one coded frame; selects the burst period.
    pub frame_samples: usize,
    /// Substream count from the last MLP major audio unit.
    pub substreams: usize,
}

impl SyncState {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            lost_sync: true,
            in_frame_size: 0,
            out_frame_size: 0,
            sample_rate,
            stream_type: None,
            frame_samples: 0,
            substreams: 0,
        }
    }

    /// Re-enters the sync-searching state. The sample rate and substream
    /// count survive a reset; they are stream properties, not frame state.
    pub fn reset(&mut self) {
        self.lost_sync = true;
        self.in_frame_size = 0;
        self.out_frame_size = 0;
        self.stream_type = None;
    }

    pub(crate) fn set_frame(&mut self, size: usize) {
        self.in_frame_size = size;
        self.out_frame_size = size;
    }
}

/// One sync detector per codec family, dispatched as a tagged variant.
#[derive(Debug)]
pub enum FrameSync {
    Ac3(Ac3Sync),
    Dts(DtsSync),
    Aac(AacSync),
    Mlp(MlpSync),
}

impl FrameSync {
    /// Locates the next frame in `window`, updating `state` as a side effect.
    /// Returns the number of leading bytes to discard.
    pub fn scan(&mut self, state: &mut SyncState, window: &[u8]) -> usize {
        match self {
            FrameSync::Ac3(sync) => sync.scan(state, window),
            FrameSync::Dts(sync) => sync.scan(state, window),
            FrameSync::Aac(sync) => sync.scan(state, window),
            FrameSync::Mlp(sync) => sync.scan(state, window),
        }
    }
}

/// Classifies an unknown elementary stream by running each detector over a
/// probe window.
///
/// Detectors with strong validation (CRC, parity, header plausibility) are
/// tried first; the bare-sync ADTS match is only reported when nothing
/// stronger claims the stream. Returns the codec whose first valid frame
/// starts earliest in the window.
pub fn probe(window: &[u8]) -> Option<CodecId> {
    let mut best: Option<(usize, CodecId)> = None;

    let candidates: [(FrameSync, fn(&SyncState) -> CodecId); 3] = [
        (FrameSync::Ac3(Ac3Sync::default()), |state| {
            match state.stream_type {
                Some(StreamType::Eac3) => CodecId::Eac3,
                _ => CodecId::Ac3,
            }
        }),
        (FrameSync::Dts(DtsSync::new(false)), |_| CodecId::Dts),
        (FrameSync::Mlp(MlpSync::default()), |state| {
            match state.stream_type {
                Some(StreamType::Mlp) => CodecId::Mlp,
                _ => CodecId::TrueHd,
            }
        }),
    ];

    for (mut sync, codec_of) in candidates {
        let mut state = SyncState::new(0);
        let skip = sync.scan(&mut state, window);
        if !state.lost_sync && state.in_frame_size > 0 {
            let codec = codec_of(&state);
            if best.is_none_or(|(s, _)| skip < s) {
                best = Some((skip, codec));
            }
        }
    }

    if best.is_none() {
        let mut state = SyncState::new(0);
        let skip = AacSync::default().scan(&mut state, window);
        if !state.lost_sync && state.in_frame_size > 0 {
            best = Some((skip, CodecId::Aac));
        }
    }

    best.map(|(_, codec)| codec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_classifies_synthetic_streams() {
        let ac3 = ac3::test_frame(0, 0, 8);
        assert_eq!(probe(&ac3), Some(CodecId::Ac3));

        let mut dts = dts::test_core_frame_16be(512, 13, 1024);
        dts.extend_from_slice(&[0u8; 16]);
        assert_eq!(probe(&dts), Some(CodecId::Dts));

        let thd = mlp::test_major_unit(120, 0, 2, false);
        assert_eq!(probe(&thd), Some(CodecId::TrueHd));

        let aac = crate::burst::adts::test_adts_frame(64);
        assert_eq!(probe(&aac), Some(CodecId::Aac));
    }

    #[test]
    fn probe_rejects_noise() {
        let noise: Vec<u8> = (0..4096).map(|i| (i * 89 + 3) as u8).collect();
        assert_eq!(probe(&noise), None);
    }
}
