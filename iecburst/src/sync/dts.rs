//! DTS and DTS-HD frame synchronization.
//!
//! The core sync word exists in four physical encodings (14-bit and 16-bit
//! payload width, each in both byte orders), each with its own bit layout
//! for block count, frame size and sample rate code. A DTS-HD extension
//! substream may directly follow the core frame; its size is added to the
//! input frame size, and in core-only mode excluded from the output size.

use log::info;

use crate::sync::{StreamType, SyncState};

const DTS_PREAMBLE_14BE: u32 = 0x1FFFE800;
const DTS_PREAMBLE_14LE: u32 = 0xFF1F00E8;
const DTS_PREAMBLE_16BE: u32 = 0x7FFE8001;
const DTS_PREAMBLE_16LE: u32 = 0xFE7F0180;
const DTS_PREAMBLE_HD: u32 = 0x64582025;

/// Sample rates indexed by the core header's 4-bit code; 0 is invalid.
const DTS_SAMPLE_RATES: [u32; 16] = [
    0, 8000, 16000, 32000, 64000, 128000, 11025, 22050, 44100, 88200, 176400, 12000, 24000, 48000,
    96000, 192000,
];

/// Detector for the DTS core/extension sync word family.
#[derive(Debug)]
pub struct DtsSync {
    /// Forward only the backward-compatible core, discarding HD extensions.
    core_only: bool,
}

impl DtsSync {
    pub fn new(core_only: bool) -> Self {
        Self { core_only }
    }

    pub fn scan(&mut self, state: &mut SyncState, window: &[u8]) -> usize {
        state.in_frame_size = 0;

        let mut skip = 0;
        while window.len() - skip > 10 {
            let p = &window[skip..];
            let header = u32::from_be_bytes([p[0], p[1], p[2], p[3]]);

            let (matched, dts_blocks, frame_size, srate_code) = match header {
                DTS_PREAMBLE_14BE => (
                    p[4] == 0x07 && (p[5] & 0xf0) == 0xf0,
                    (((p[5] & 0x7) as usize) << 4 | ((p[6] & 0x3C) as usize) >> 2) + 1,
                    ((((p[6] & 0x3) as usize) << 12 | (p[7] as usize) << 4
                        | ((p[8] & 0x3C) as usize) >> 2)
                        + 1)
                        / 14
                        * 16,
                    (p[9] & 0xf) as usize,
                ),
                DTS_PREAMBLE_14LE => (
                    p[5] == 0x07 && (p[4] & 0xf0) == 0xf0,
                    (((p[4] & 0x7) as usize) << 4 | ((p[7] & 0x3C) as usize) >> 2) + 1,
                    ((((p[7] & 0x3) as usize) << 12 | (p[6] as usize) << 4
                        | ((p[9] & 0x3C) as usize) >> 2)
                        + 1)
                        / 14
                        * 16,
                    (p[8] & 0xf) as usize,
                ),
                DTS_PREAMBLE_16BE => (
                    true,
                    (((p[5] >> 2) & 0x7f) as usize) + 1,
                    ((((p[5] & 0x3) as usize) << 8 | p[6] as usize) << 4
                        | ((p[7] & 0xF0) as usize) >> 4)
                        + 1,
                    ((p[8] & 0x3C) as usize) >> 2,
                ),
                DTS_PREAMBLE_16LE => (
                    true,
                    (((p[4] >> 2) & 0x7f) as usize) + 1,
                    ((((p[4] & 0x3) as usize) << 8 | p[7] as usize) << 4
                        | ((p[6] & 0xF0) as usize) >> 4)
                        + 1,
                    ((p[9] & 0x3C) as usize) >> 2,
                ),
                _ => {
                    skip += 1;
                    continue;
                }
            };

            if !matched || srate_code == 0 || srate_code >= DTS_SAMPLE_RATES.len() {
                skip += 1;
                continue;
            }

            if !(96..=16384).contains(&frame_size) {
                skip += 1;
                continue;
            }

            let dts_blocks = dts_blocks << 5;
            if dts_blocks != 512 && dts_blocks != 1024 && dts_blocks != 2048 {
                skip += 1;
                continue;
            }

            // Checking for an HD extension needs bytes past the core frame.
            // Sync can be assumed here; the caller retries with more data.
            if window.len() - skip < frame_size + 10 {
                return skip;
            }

            state.set_frame(frame_size);

            let mut stream_type = StreamType::Dts;
            let hd_sync = u32::from_be_bytes([
                p[frame_size],
                p[frame_size + 1],
                p[frame_size + 2],
                p[frame_size + 3],
            ]);
            if hd_sync == DTS_PREAMBLE_HD {
                let blownup = (p[frame_size + 5] & 0x20) != 0;
                let coded_size = if blownup {
                    ((p[frame_size + 6] & 0x01) as usize) << 19
                        | (p[frame_size + 7] as usize) << 11
                        | (p[frame_size + 8] as usize) << 3
                        | ((p[frame_size + 9] & 0xe0) as usize) >> 5
                } else {
                    ((p[frame_size + 6] & 0x1f) as usize) << 11
                        | (p[frame_size + 7] as usize) << 3
                        | ((p[frame_size + 8] & 0xe0) as usize) >> 5
                };
                let hd_size = coded_size + 1;

                state.in_frame_size += hd_size;
                stream_type = if self.core_only {
                    StreamType::DtsHdCore
                } else {
                    state.out_frame_size = state.in_frame_size;
                    StreamType::DtsHd
                };
            }

            let sample_rate = DTS_SAMPLE_RATES[srate_code];
            state.frame_samples = dts_blocks;

            // A stream type or sample rate change is logged but does not by
            // itself count as lost sync.
            if state.lost_sync
                || skip != 0
                || state.stream_type != Some(stream_type)
                || state.sample_rate != sample_rate
            {
                state.lost_sync = false;
                state.stream_type = Some(stream_type);
                state.sample_rate = sample_rate;

                match stream_type {
                    StreamType::DtsHd => {
                        info!("DTS-HD stream detected ({} Hz)", state.sample_rate)
                    }
                    StreamType::DtsHdCore => info!(
                        "DTS-HD stream detected ({} Hz), only using the core",
                        state.sample_rate
                    ),
                    _ => info!("DTS stream detected ({} Hz)", state.sample_rate),
                }
            }

            return skip;
        }

        state.lost_sync = true;
        skip
    }
}

/// Builds a synthetic 16-bit big-endian DTS core frame.
#[cfg(test)]
pub(crate) fn test_core_frame_16be(
    block_samples: usize,
    srate_code: u8,
    frame_size: usize,
) -> Vec<u8> {
    let nblks = (block_samples >> 5) - 1;
    let fsize = frame_size - 1;

    let mut frame = vec![0u8; frame_size];
    frame[..4].copy_from_slice(&DTS_PREAMBLE_16BE.to_be_bytes());
    frame[5] = ((nblks << 2) as u8) | ((fsize >> 12) as u8 & 0x3);
    frame[6] = (fsize >> 4) as u8;
    frame[7] = ((fsize & 0xF) << 4) as u8;
    frame[8] = srate_code << 2;
    for i in 10..frame_size {
        frame[i] = (i as u8).wrapping_mul(73).wrapping_add(5);
    }

    frame
}

/// Appends a DTS-HD extension substream header announcing `hd_size` bytes.
#[cfg(test)]
pub(crate) fn append_hd_extension(stream: &mut Vec<u8>, hd_size: usize) {
    let coded = hd_size - 1;
    let mut ext = vec![0u8; hd_size];
    ext[..4].copy_from_slice(&DTS_PREAMBLE_HD.to_be_bytes());
    ext[5] = 0; // not blown up
    ext[6] = (coded >> 11) as u8 & 0x1f;
    ext[7] = (coded >> 3) as u8;
    ext[8] = ((coded & 0x7) << 5) as u8;
    stream.extend_from_slice(&ext);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_frame_without_extension() {
        // Trailing bytes so the extension probe has room to look.
        let mut stream = test_core_frame_16be(1024, 13, 2012);
        stream.extend_from_slice(&[0u8; 16]);

        let mut state = SyncState::new(0);
        let skip = DtsSync::new(false).scan(&mut state, &stream);

        assert_eq!(skip, 0);
        assert!(!state.lost_sync);
        assert_eq!(state.stream_type, Some(StreamType::Dts));
        assert_eq!(state.in_frame_size, 2012);
        assert_eq!(state.out_frame_size, 2012);
        assert_eq!(state.sample_rate, 48000);
        assert_eq!(state.frame_samples, 1024);
    }

    #[test]
    fn extension_marker_extends_the_input_frame() {
        let mut stream = test_core_frame_16be(1024, 13, 2012);
        append_hd_extension(&mut stream, 4096);
        stream.extend_from_slice(&[0u8; 16]);

        let mut state = SyncState::new(0);
        let skip = DtsSync::new(false).scan(&mut state, &stream);

        assert_eq!(skip, 0);
        assert_eq!(state.stream_type, Some(StreamType::DtsHd));
        assert_eq!(state.in_frame_size, 2012 + 4096);
        assert_eq!(state.out_frame_size, 2012 + 4096);
    }

    #[test]
    fn core_only_mode_truncates_the_output_frame() {
        let mut stream = test_core_frame_16be(1024, 13, 2012);
        append_hd_extension(&mut stream, 4096);
        stream.extend_from_slice(&[0u8; 16]);

        let mut state = SyncState::new(0);
        let skip = DtsSync::new(true).scan(&mut state, &stream);

        assert_eq!(skip, 0);
        assert_eq!(state.stream_type, Some(StreamType::DtsHdCore));
        assert_eq!(state.in_frame_size, 2012 + 4096);
        assert_eq!(state.out_frame_size, 2012);
    }

    #[test]
    fn partial_frame_defers_confirmation() {
        let stream = test_core_frame_16be(1024, 13, 2012);

        // Exactly the core frame: not enough trailing data to test for an
        // HD extension, so no frame size is committed yet.
        let mut state = SyncState::new(0);
        let skip = DtsSync::new(false).scan(&mut state, &stream);

        assert_eq!(skip, 0);
        assert_eq!(state.in_frame_size, 0);
        assert!(state.lost_sync);
    }

    #[test]
    fn invalid_sample_rate_code_is_rejected() {
        let mut stream = test_core_frame_16be(1024, 0, 2012);
        stream.extend_from_slice(&[0u8; 16]);

        let mut state = SyncState::new(0);
        let skip = DtsSync::new(false).scan(&mut state, &stream);
        assert!(state.lost_sync);
        assert_eq!(skip, stream.len() - 10);
    }

    #[test]
    fn rate_change_between_syncs_is_not_a_sync_loss() {
        let mut first = test_core_frame_16be(1024, 13, 2012);
        first.extend_from_slice(&[0u8; 16]);
        let mut second = test_core_frame_16be(1024, 14, 2012);
        second.extend_from_slice(&[0u8; 16]);

        let mut sync = DtsSync::new(false);
        let mut state = SyncState::new(0);
        sync.scan(&mut state, &first);
        assert_eq!(state.sample_rate, 48000);

        sync.scan(&mut state, &second);
        assert!(!state.lost_sync);
        assert_eq!(state.sample_rate, 96000);
    }
}
