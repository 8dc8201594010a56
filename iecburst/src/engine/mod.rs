//! Passthrough orchestration.
//!
//! The [`PassthroughEngine`](passthrough::PassthroughEngine) owns the
//! capability decision, the sync detector, the frame accumulator and the
//! burst framers, and exposes the decode/drain/reset contract to the audio
//! pipeline. The [`transcode`] module supplies the AC-3 re-encoding fallback
//! used when a multichannel source cannot pass through natively.

use std::fmt::Display;

pub mod passthrough;
pub mod transcode;

pub use passthrough::PassthroughEngine;
pub use transcode::{AudioDecoder, AudioEncoder, Transcoder};

/// Output is always presented as a 16-bit stereo link signal.
pub const OUT_CHANNELS: usize = 2;
pub const OUT_BITS_PER_SAMPLE: usize = 16;
pub const OUT_SAMPLE_RATE: u32 = 48000;

/// Source codec identifier carried in the stream hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    Ac3,
    Eac3,
    Dts,
    Aac,
    Mp1,
    Mp2,
    Mp3,
    TrueHd,
    Mlp,
}

/// DTS decoding levels, ordered from the plain core upwards. Doubles as the
/// device's ceiling and the stream's requested level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DtsLevel {
    Core,
    Es,
    Hd9624,
    HdHra,
    HdMa,
}

impl Display for DtsLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DtsLevel::Core => write!(f, "DTS"),
            DtsLevel::Es => write!(f, "DTS-ES"),
            DtsLevel::Hd9624 => write!(f, "DTS 96/24"),
            DtsLevel::HdHra => write!(f, "DTS-HD HRA"),
            DtsLevel::HdMa => write!(f, "DTS-HD MA"),
        }
    }
}

/// Properties of the incoming elementary stream, as supplied by the demuxer.
#[derive(Debug, Clone)]
pub struct StreamHints {
    pub codec: CodecId,
    pub channels: usize,
    pub sample_rate: u32,
    pub bit_rate: u32,
    /// Requested DTS level; `None` means plain core.
    pub dts_level: Option<DtsLevel>,
    /// Codec-specific extradata (AudioSpecificConfig for AAC).
    pub extradata: Vec<u8>,
}

impl StreamHints {
    pub fn new(codec: CodecId) -> Self {
        Self {
            codec,
            channels: 0,
            sample_rate: 0,
            bit_rate: 0,
            dts_level: None,
            extradata: Vec::new(),
        }
    }
}

/// What the output device accepts, as negotiated by the settings layer.
#[derive(Debug, Clone, Default)]
pub struct DeviceCaps {
    pub ac3: bool,
    pub eac3: bool,
    pub aac: bool,
    pub mp1: bool,
    pub mp2: bool,
    pub mp3: bool,
    pub truehd: bool,
    pub mlp: bool,
    /// Highest DTS level the device decodes; `None` disables DTS entirely.
    pub dts_level: Option<DtsLevel>,
    /// Degrade a DTS request above the ceiling to the highest supported
    /// core level instead of failing outright.
    pub dts_core_fallback: bool,
}

impl DeviceCaps {
    /// Everything enabled, the usual profile for a full HDMI receiver.
    pub fn all() -> Self {
        Self {
            ac3: true,
            eac3: true,
            aac: true,
            mp1: true,
            mp2: true,
            mp3: true,
            truehd: true,
            mlp: true,
            dts_level: Some(DtsLevel::HdMa),
            dts_core_fallback: true,
        }
    }
}

/// The wrapper encoding handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    None,
    Ac3,
    Eac3,
    Dts,
    DtsHd,
    Mpeg,
    Mat,
}

impl Display for OutputEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputEncoding::None => write!(f, "none"),
            OutputEncoding::Ac3 => write!(f, "IEC 61937 AC-3"),
            OutputEncoding::Eac3 => write!(f, "IEC 61937 E-AC-3"),
            OutputEncoding::Dts => write!(f, "IEC 61937 DTS"),
            OutputEncoding::DtsHd => write!(f, "IEC 61937 DTS-HD"),
            OutputEncoding::Mpeg => write!(f, "IEC 61937 MPEG"),
            OutputEncoding::Mat => write!(f, "IEC 61937 MAT"),
        }
    }
}
