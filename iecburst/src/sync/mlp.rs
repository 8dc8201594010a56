//! MLP and Dolby TrueHD frame synchronization.
//!
//! Major audio units carry full stream parameters and are validated with a
//! 16-bit CRC over a 24-byte window. Dependent substream frames can only be
//! validated once a major unit has supplied the substream count; they carry
//! an 8-bit parity nibble over a per-substream sequence of byte pairs.

use log::info;

use crate::sync::{StreamType, SyncState};
use crate::utils::crc::{CRC_MLP_MAJOR_SYNC_ALG, Crc16};

/// Major sync words differ only in the lowest bit: odd for MLP, even for
/// Dolby TrueHD.
const MAJOR_SYNC_MASK: u32 = 0xFFFF_FFFE;
const MAJOR_SYNC_VALUE: u32 = 0xF872_6FBA;

const CRC: Crc16 = Crc16::new(&CRC_MLP_MAJOR_SYNC_ALG);

/// Detector for MLP and Dolby TrueHD access units.
#[derive(Debug, Default)]
pub struct MlpSync;

impl MlpSync {
    pub fn scan(&mut self, state: &mut SyncState, window: &[u8]) -> usize {
        let len = window.len();
        let mut skip = 0;

        while skip < len {
            let left = len - skip;

            // Without sync there is nothing to do for a window this small.
            if left < 8 {
                if state.lost_sync {
                    return len;
                }
                return skip;
            }

            let p = &window[skip..];
            let length = ((((p[0] & 0x0F) as usize) << 8) | p[1] as usize) << 1;
            let syncword = u32::from_be_bytes([p[4], p[5], p[6], p[7]]);

            if syncword & MAJOR_SYNC_MASK == MAJOR_SYNC_VALUE {
                // A major audio unit needs 32 bytes to validate.
                if left < 32 {
                    return skip;
                }

                let rate = (p[8 + (syncword & 1) as usize] & 0xF0) >> 4;
                if rate == 0xF {
                    skip += 1;
                    continue;
                }

                let mut crc = CRC.update(CRC.init, &p[4..28]);
                crc ^= (p[29] as u16) << 8 | p[28] as u16;
                if (p[31] as u16) << 8 | p[30] as u16 != crc {
                    skip += 1;
                    continue;
                }

                state.sample_rate =
                    (if rate & 0x8 != 0 { 44100 } else { 48000 }) << (rate & 0x7);
                state.substreams = ((p[20] & 0xF0) >> 4) as usize;
                state.frame_samples = (state.sample_rate / 44100) as usize * 40;

                if state.lost_sync {
                    if syncword & 1 != 0 {
                        info!("MLP stream detected ({} Hz)", state.sample_rate);
                    } else {
                        info!("Dolby TrueHD stream detected ({} Hz)", state.sample_rate);
                    }
                }

                state.lost_sync = false;
                state.set_frame(length);
                state.stream_type = Some(if syncword & 1 != 0 {
                    StreamType::Mlp
                } else {
                    StreamType::TrueHd
                });
                return skip;
            }

            // A dependent substream frame cannot be checked until a major
            // audio unit has supplied the substream count.
            if state.lost_sync {
                skip += 1;
                continue;
            }

            if left < state.substreams * 4 {
                return skip;
            }

            match substream_parity(p, state.substreams) {
                None => return skip,
                Some(true) => {
                    state.set_frame(length);
                    return skip;
                }
                Some(false) => {
                    state.lost_sync = true;
                    info!("sync lost on a dependent substream frame");
                    skip += 1;
                }
            }
        }

        state.lost_sync = true;
        skip
    }
}

/// Walks the access unit header and one directory entry per substream,
/// accumulating the parity byte. Entries with the high bit set carry two
/// extra bytes. Returns `None` when the window ends mid-walk.
fn substream_parity(p: &[u8], substreams: usize) -> Option<bool> {
    let mut pos = 0;
    let mut check = 0u8;

    for i in 0..=substreams {
        let b0 = *p.get(pos)?;
        let b1 = *p.get(pos + 1)?;
        check ^= b0;
        check ^= b1;
        pos += 2;

        if i == 0 || b0 & 0x80 != 0 {
            check ^= *p.get(pos)?;
            check ^= *p.get(pos + 1)?;
            pos += 2;
        }
    }

    Some(((check >> 4) ^ check) & 0xF == 0xF)
}

/// Builds a synthetic major audio unit with a valid CRC.
#[cfg(test)]
pub(crate) fn test_major_unit(length: usize, rate: u8, substreams: u8, mlp: bool) -> Vec<u8> {
    let mut unit = vec![0u8; length];
    let words = (length >> 1) as u16;
    unit[0] = (words >> 8) as u8 & 0x0F;
    unit[1] = words as u8;

    let syncword = MAJOR_SYNC_VALUE | mlp as u32;
    unit[4..8].copy_from_slice(&syncword.to_be_bytes());
    unit[8 + mlp as usize] = rate << 4;
    unit[20] = substreams << 4;
    for i in 21..28.min(length) {
        unit[i] = (i as u8).wrapping_mul(37).wrapping_add(11);
    }

    let crc = CRC.update(CRC.init, &unit[4..28]);
    unit[30] = crc as u8;
    unit[31] = (crc >> 8) as u8;

    unit
}

/// Builds a synthetic dependent substream frame passing the parity check.
#[cfg(test)]
pub(crate) fn test_substream_unit(length: usize, substreams: usize) -> Vec<u8> {
    let mut unit = vec![0u8; length];
    let words = (length >> 1) as u16;
    unit[0] = (words >> 8) as u8 & 0x0F;
    unit[1] = words as u8;
    // Bytes 4..8 must not resemble a major sync word; zeros are fine.

    // One two-byte directory entry per substream, high bits clear, after the
    // four header bytes the parity walk always covers.
    let mut pos = 4;
    for _ in 0..substreams {
        unit[pos] = 0x40;
        unit[pos + 1] = 0x00;
        pos += 2;
    }

    // Solve the last covered byte so the parity nibble checks out.
    let mut check = 0u8;
    for &byte in &unit[..pos - 1] {
        check ^= byte;
    }
    unit[pos - 1] = check ^ 0x0F;

    unit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_unit_with_valid_crc_is_accepted() {
        for (rate, expected) in [(0u8, 48000u32), (1, 96000), (8, 44100), (9, 88200)] {
            let unit = test_major_unit(96, rate, 1, false);

            let mut state = SyncState::new(0);
            let skip = MlpSync.scan(&mut state, &unit);

            assert_eq!(skip, 0);
            assert!(!state.lost_sync);
            assert_eq!(state.stream_type, Some(StreamType::TrueHd));
            assert_eq!(state.sample_rate, expected);
            assert_eq!(state.in_frame_size, 96);
        }
    }

    #[test]
    fn mlp_variant_sets_the_stream_type() {
        let unit = test_major_unit(96, 0, 1, true);

        let mut state = SyncState::new(0);
        MlpSync.scan(&mut state, &unit);
        assert_eq!(state.stream_type, Some(StreamType::Mlp));
    }

    #[test]
    fn flipped_crc_byte_rejects_the_unit() {
        let mut unit = test_major_unit(96, 0, 1, false);
        unit[30] ^= 0x01;

        let mut state = SyncState::new(0);
        let skip = MlpSync.scan(&mut state, &unit);

        assert!(state.lost_sync);
        assert_eq!(skip, unit.len());
    }

    #[test]
    fn flipped_payload_byte_rejects_the_unit() {
        let mut unit = test_major_unit(96, 0, 1, false);
        unit[22] ^= 0x10;

        let mut state = SyncState::new(0);
        MlpSync.scan(&mut state, &unit);
        assert!(state.lost_sync);
    }

    #[test]
    fn substream_frames_follow_a_major_unit() {
        let major = test_major_unit(64, 0, 2, false);
        let minor = test_substream_unit(48, 2);

        let mut sync = MlpSync;
        let mut state = SyncState::new(0);

        assert_eq!(sync.scan(&mut state, &major), 0);
        assert_eq!(state.substreams, 2);

        assert_eq!(sync.scan(&mut state, &minor), 0);
        assert!(!state.lost_sync);
        assert_eq!(state.in_frame_size, 48);
    }

    #[test]
    fn parity_failure_waits_for_the_next_major_unit() {
        let major = test_major_unit(64, 0, 2, false);
        let mut minor = test_substream_unit(48, 2);
        minor[5] ^= 0xFF;

        let mut sync = MlpSync;
        let mut state = SyncState::new(0);
        sync.scan(&mut state, &major);

        sync.scan(&mut state, &minor);
        assert!(state.lost_sync);

        // Recovery only happens on a fresh major audio unit.
        let mut stream = minor.clone();
        stream.extend_from_slice(&test_major_unit(64, 0, 2, false));
        let skip = sync.scan(&mut state, &stream);
        assert_eq!(skip, minor.len());
        assert!(!state.lost_sync);
    }

    #[test]
    fn dependent_frames_without_sync_are_not_claimed() {
        let minor = test_substream_unit(48, 2);

        let mut state = SyncState::new(0);
        let skip = MlpSync.scan(&mut state, &minor);

        assert!(state.lost_sync);
        assert_eq!(skip, minor.len());
    }
}
