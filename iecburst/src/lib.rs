//! IEC 61937 passthrough engine for compressed audio bitstreams.
//!
//! ## Technical Overview
//!
//! Recognizes codec frames inside an arbitrary byte stream (AC-3, E-AC-3,
//! DTS/DTS-HD, AAC/ADTS, MLP/Dolby TrueHD), validates frame candidates with
//! the codec's checksum or parity scheme, and repackages each validated
//! frame into an IEC 61937 data burst for delivery to an external decoder
//! over an S/PDIF or HDMI link.
//!
//! ### Processing Stages
//!
//! 1. **Sync detection** ([`sync`]): per-codec detectors locate frame
//!    boundaries and report frame sizes.
//! 2. **Frame accumulation** ([`engine`]): arbitrarily chunked input is
//!    re-buffered until whole frames are available.
//! 3. **Burst framing** ([`burst`]): whole frames become IEC 61937 bursts;
//!    raw AAC is ADTS-wrapped first.
//!
//! When the output device cannot accept the native format, a multichannel
//! source can instead be decoded and re-encoded to AC-3 through the
//! [`engine::transcode`] fallback, feeding the same burst framer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iecburst::engine::{CodecId, DeviceCaps, PassthroughEngine, StreamHints};
//!
//! let mut hints = StreamHints::new(CodecId::Ac3);
//! hints.channels = 6;
//! hints.sample_rate = 48000;
//!
//! let mut engine = PassthroughEngine::open(hints, &DeviceCaps::all())?;
//!
//! let chunk: Vec<u8> = std::fs::read("stream.ac3")?;
//! let mut fed = 0;
//! while fed < chunk.len() {
//!     let used = engine.decode(&chunk[fed..])?;
//!     if used == 0 {
//!         break;
//!     }
//!     fed += used;
//!
//!     let burst = engine.get_data();
//!     // hand `burst` to the audio sink
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Burst framing: IEC 61937 wrapping and the ADTS pre-wrap stage for AAC.
pub mod burst;

/// The passthrough orchestrator and the AC-3 transcode fallback.
pub mod engine;

/// Per-codec sync detectors and stream probing.
pub mod sync;

/// Supporting infrastructure: working buffer, bit reader, CRC, errors.
pub mod utils;
