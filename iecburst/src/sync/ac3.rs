//! AC-3 and Enhanced AC-3 frame synchronization.

use log::info;

use crate::sync::{StreamType, SyncState};
use crate::utils::crc::{CRC_AC3_FRAME_ALG, Crc16};

/// Nominal bitrates (kbit/s) indexed by `frmsizecod >> 1`.
const AC3_BITRATES: [u16; 19] = [
    32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 576, 640,
];

/// Sample rates indexed by `fscod`; code 3 is reserved.
const AC3_SAMPLE_RATES: [u32; 4] = [48000, 44100, 32000, 0];

/// Audio blocks per E-AC-3 frame indexed by `numblkscod`.
const EAC3_BLOCKS: [u8; 4] = [1, 2, 3, 6];

const SAMPLES_PER_BLOCK: usize = 256;

const CRC: Crc16 = Crc16::new(&CRC_AC3_FRAME_ALG);

/// Detector for the `0x0B77` sync word family (AC-3, bsid <= 10, and
/// E-AC-3, bsid 11..=17).
#[derive(Debug, Default)]
pub struct Ac3Sync;

impl Ac3Sync {
    pub fn scan(&mut self, state: &mut SyncState, window: &[u8]) -> usize {
        let mut skip = 0;
        while window.len() - skip > 6 {
            let p = &window[skip..];
            if p[0] != 0x0b || p[1] != 0x77 {
                skip += 1;
                continue;
            }

            let bsid = p[5] >> 3;
            if bsid > 0x11 {
                skip += 1;
                continue;
            }

            if bsid <= 10 {
                if self.scan_classic(state, p, window.len() - skip, skip == 0) {
                    return skip;
                }
            } else if self.scan_enhanced(state, p, skip == 0) {
                return skip;
            }

            skip += 1;
        }

        // The entire window is invalid.
        state.lost_sync = true;
        skip
    }

    /// Classic AC-3. Returns true when a frame is accepted at this offset.
    fn scan_classic(&mut self, state: &mut SyncState, p: &[u8], avail: usize, at_start: bool) -> bool {
        let fscod = p[4] >> 6;
        let frmsizecod = p[4] & 0x3F;
        if fscod == 3 || frmsizecod > 37 {
            return false;
        }

        let bit_rate = AC3_BITRATES[(frmsizecod >> 1) as usize] as usize;
        // Frame size in 16-bit words from the fixed rate tables.
        let framesize = match fscod {
            0 => bit_rate * 2,
            1 => 320 * bit_rate / 147 + (frmsizecod & 1) as usize,
            _ => bit_rate * 4,
        };

        state.set_frame(framesize * 2);
        state.sample_rate = AC3_SAMPLE_RATES[fscod as usize];
        state.frame_samples = 6 * SAMPLES_PER_BLOCK;

        // Skip exhaustive re-validation on a stable stream.
        if !state.lost_sync && at_start {
            return true;
        }

        // With the full frame buffered validate all of it, otherwise the
        // first 5/8 of the frame, which covers crc1. With less than that
        // available the candidate is accepted on the header alone.
        let crc_words = if framesize * 2 <= avail {
            framesize - 1
        } else {
            (framesize >> 1) + (framesize >> 3) - 1
        };
        if 2 + crc_words * 2 <= avail && CRC.update_msb(CRC.init, &p[2..2 + crc_words * 2]) != 0 {
            return false;
        }

        state.lost_sync = false;
        state.stream_type = Some(StreamType::Ac3);
        info!("AC-3 stream detected ({} Hz)", state.sample_rate);
        true
    }

    /// Enhanced AC-3. Returns true when a frame is accepted at this offset.
    fn scan_enhanced(&mut self, state: &mut SyncState, p: &[u8], at_start: bool) -> bool {
        let strmtyp = p[2] >> 6;
        if strmtyp == 3 {
            return false;
        }

        let framesize = ((((p[2] & 0x7) as usize) << 8) | p[3] as usize) + 1;
        let fscod = (p[4] >> 6) & 0x3;
        let cod = (p[4] >> 4) & 0x3;

        let blocks;
        if fscod == 0x3 {
            if cod == 0x3 {
                return false;
            }

            // Half sample rate path.
            blocks = 6;
            state.sample_rate = AC3_SAMPLE_RATES[cod as usize] >> 1;
        } else {
            blocks = EAC3_BLOCKS[cod as usize] as usize;
            state.sample_rate = AC3_SAMPLE_RATES[fscod as usize];
        }

        state.set_frame(framesize * 2);
        state.frame_samples = blocks * SAMPLES_PER_BLOCK;

        if !state.lost_sync && state.stream_type == Some(StreamType::Eac3) && at_start {
            return true;
        }

        state.lost_sync = false;
        state.stream_type = Some(StreamType::Eac3);
        info!("E-AC-3 stream detected ({} Hz)", state.sample_rate);
        true
    }
}

/// Builds a synthetic AC-3 frame whose crc1 (5/8 span) and crc2 (full span)
/// checks both pass.
#[cfg(test)]
pub(crate) fn test_frame(fscod: u8, frmsizecod: u8, bsid: u8) -> Vec<u8> {
    let bit_rate = AC3_BITRATES[(frmsizecod >> 1) as usize] as usize;
    let framesize = match fscod {
        0 => bit_rate * 2,
        1 => 320 * bit_rate / 147 + (frmsizecod & 1) as usize,
        2 => bit_rate * 4,
        _ => panic!("reserved fscod"),
    };

    let len = framesize * 2;
    let mut frame = vec![0u8; len];
    frame[0] = 0x0b;
    frame[1] = 0x77;
    frame[4] = (fscod << 6) | frmsizecod;
    frame[5] = bsid << 3;
    for i in 6..len {
        frame[i] = (i as u8).wrapping_mul(29).wrapping_add(17);
    }

    // Solve crc1 by brute force so the 5/8 span sums to zero, then append a
    // crc2 that zeroes the remainder of the frame.
    let crc1_words = (framesize >> 1) + (framesize >> 3) - 1;
    let crc1_end = 2 + crc1_words * 2;
    for candidate in 0..=u16::MAX {
        frame[2..4].copy_from_slice(&candidate.to_be_bytes());
        if CRC.update_msb(CRC.init, &frame[2..crc1_end]) == 0 {
            break;
        }
    }
    assert_eq!(CRC.update_msb(CRC.init, &frame[2..crc1_end]), 0);

    let crc2 = CRC.update_msb(CRC.init, &frame[crc1_end..len - 2]);
    frame[len - 2..].copy_from_slice(&crc2.to_be_bytes());
    assert_eq!(CRC.update_msb(CRC.init, &frame[2..]), 0);

    frame
}
