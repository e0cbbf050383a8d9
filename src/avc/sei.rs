//! Supplemental enhancement information (spec.md §4.3.3): most payload
//! types are dropped, a small set is captured for timing/DV purposes, and
//! filler-type payloads are stripped from the rewritten SEI NAL unless the
//! caller asked to keep everything.

use crate::Result;

#[derive(Debug, Clone)]
pub enum SeiPayload {
    BufferingPeriod { cpb_removal_delay: Vec<u32> },
    PicTiming { cpb_removal_delay: u32, dpb_output_delay: u32 },
    FramePackingArrangement { frame_packing_arrangement_type: u8 },
    RecoveryPoint {
        recovery_frame_cnt: u32,
        exact_match_flag: bool,
        broken_link_flag: bool,
        changing_slice_group_idc: u8,
    },
    FillerPayload,
    SubSeqInfo,
    SubSeqLayerCharacteristics,
    SubSeqCharacteristics,
    UserDataUnregistered(Vec<u8>),
    Unknown(u32, Vec<u8>),
}

impl SeiPayload {
    /// Types dropped from the rewritten SEI NAL unless `keep_all_nalus` is
    /// set, per spec.md §4.3.3 "SEI rewriting".
    fn is_dropped_by_default(payload_type: u32) -> bool {
        matches!(payload_type, 3 | 30 | 31 | 32)
    }
}

#[derive(Debug, Clone)]
pub struct SeiMessage {
    pub payload_type: u32,
    pub payload_size: u32,
    pub payload: SeiPayload,
    pub raw: Vec<u8>,
}

impl SeiMessage {
    pub fn parse(rbsp: &[u8]) -> Result<Vec<SeiMessage>> {
        let mut messages = Vec::new();
        let mut pos = 0;

        while pos < rbsp.len() && rbsp[pos] != 0x80 {
            let type_start = pos;
            let mut payload_type = 0u32;
            while pos < rbsp.len() && rbsp[pos] == 0xFF {
                payload_type += 255;
                pos += 1;
            }
            if pos < rbsp.len() {
                payload_type += rbsp[pos] as u32;
                pos += 1;
            }

            let mut payload_size = 0u32;
            while pos < rbsp.len() && rbsp[pos] == 0xFF {
                payload_size += 255;
                pos += 1;
            }
            if pos < rbsp.len() {
                payload_size += rbsp[pos] as u32;
                pos += 1;
            }

            let payload_end = (pos + payload_size as usize).min(rbsp.len());
            let payload_data = &rbsp[pos..payload_end];

            let payload = match payload_type {
                0 => parse_buffering_period(payload_data),
                1 => parse_pic_timing(payload_data),
                6 => parse_recovery_point(payload_data),
                45 => parse_frame_packing(payload_data),
                3 => SeiPayload::FillerPayload,
                30 => SeiPayload::SubSeqInfo,
                31 => SeiPayload::SubSeqLayerCharacteristics,
                32 => SeiPayload::SubSeqCharacteristics,
                5 => SeiPayload::UserDataUnregistered(payload_data.to_vec()),
                _ => SeiPayload::Unknown(payload_type, payload_data.to_vec()),
            };

            messages.push(SeiMessage {
                payload_type,
                payload_size,
                payload,
                raw: rbsp[type_start..payload_end].to_vec(),
            });

            pos = payload_end;
        }

        Ok(messages)
    }

    /// Re-serializes the messages that survive the default drop policy
    /// (or all of them, when `keep_all` is set), byte-identical to their
    /// original encoding, followed by RBSP trailing bits.
    pub fn rewrite(messages: &[SeiMessage], keep_all: bool) -> Option<Vec<u8>> {
        let kept: Vec<&SeiMessage> = messages
            .iter()
            .filter(|m| keep_all || !SeiPayload::is_dropped_by_default(m.payload_type))
            .collect();

        if kept.is_empty() {
            return None;
        }

        let mut out = Vec::new();
        for m in &kept {
            out.extend_from_slice(&m.raw);
        }
        out.push(0x80);
        Some(out)
    }
}

fn parse_buffering_period(data: &[u8]) -> SeiPayload {
    // Without the active SPS's HRD cpb_cnt in scope here, capture only the
    // raw delay value(s) present; callers needing exact per-cpb values
    // re-derive them against the active parameter set.
    if data.is_empty() {
        return SeiPayload::Unknown(0, data.to_vec());
    }
    let mut delays = Vec::new();
    let mut pos = 0;
    while pos + 4 <= data.len() {
        let v = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
        delays.push(v);
        pos += 4;
    }
    SeiPayload::BufferingPeriod { cpb_removal_delay: delays }
}

fn parse_pic_timing(data: &[u8]) -> SeiPayload {
    if data.len() < 8 {
        return SeiPayload::Unknown(1, data.to_vec());
    }
    let cpb_removal_delay = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let dpb_output_delay = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    SeiPayload::PicTiming { cpb_removal_delay, dpb_output_delay }
}

fn parse_frame_packing(data: &[u8]) -> SeiPayload {
    if data.len() < 2 {
        return SeiPayload::Unknown(45, data.to_vec());
    }
    SeiPayload::FramePackingArrangement {
        frame_packing_arrangement_type: data[1],
    }
}

fn parse_recovery_point(data: &[u8]) -> SeiPayload {
    if data.is_empty() {
        return SeiPayload::Unknown(6, data.to_vec());
    }

    let mut reader = crate::bitreader::BitReader::new(data);
    let recovery_frame_cnt = match crate::eg::read_ue(&mut reader) {
        Ok(v) => v,
        Err(_) => return SeiPayload::Unknown(6, data.to_vec()),
    };
    let exact_match_flag = reader.read_flag();
    let broken_link_flag = reader.read_flag();
    let changing_slice_group_idc = reader.read_bits(2) as u8;

    SeiPayload::RecoveryPoint {
        recovery_frame_cnt,
        exact_match_flag,
        broken_link_flag,
        changing_slice_group_idc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty() {
        let rbsp = vec![0x80];
        let messages = SeiMessage::parse(&rbsp).unwrap();
        assert_eq!(messages.len(), 0);
    }

    #[test]
    fn parse_recovery_point() {
        let rbsp = vec![0x06, 0x02, 0x00, 0x40, 0x80];

        let messages = SeiMessage::parse(&rbsp).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload_type, 6);

        match &messages[0].payload {
            SeiPayload::RecoveryPoint { recovery_frame_cnt, .. } => {
                assert_eq!(*recovery_frame_cnt, 0);
            }
            _ => panic!("expected RecoveryPoint payload"),
        }
    }

    #[test]
    fn rewrite_drops_filler_by_default() {
        let rbsp = vec![0x03, 0x00, 0x06, 0x02, 0x00, 0x40, 0x80];
        let messages = SeiMessage::parse(&rbsp).unwrap();
        assert_eq!(messages.len(), 2);

        let rewritten = SeiMessage::rewrite(&messages, false).unwrap();
        // filler (type 3) dropped, recovery point (type 6) kept, plus trailer.
        assert_eq!(rewritten, vec![0x06, 0x02, 0x00, 0x40, 0x80]);
    }

    #[test]
    fn rewrite_keeps_everything_when_requested() {
        let rbsp = vec![0x03, 0x00, 0x06, 0x02, 0x00, 0x40, 0x80];
        let messages = SeiMessage::parse(&rbsp).unwrap();
        let rewritten = SeiMessage::rewrite(&messages, true).unwrap();
        assert_eq!(rewritten, rbsp);
    }
}
