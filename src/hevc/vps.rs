//! Video parameter set (§7.3.2.1), grounded on `decode_vps` in
//! `parser_hevc_dec.c`. Only the fields the AU/DSI path needs are retained:
//! `vps_video_parameter_set_id` for collision keying and the profile/tier
//! from the first sub-layer, matched against the active SPS.

use crate::bitreader::BitReader;
use crate::eg::read_ue;
use crate::error::{Error, Result};
use crate::hevc::ptl::ProfileTierLevel;

#[derive(Debug, Clone)]
pub struct Vps {
    pub vps_video_parameter_set_id: u8,
    pub vps_max_sub_layers_minus1: u8,
    pub vps_temporal_id_nesting_flag: bool,
    pub ptl: ProfileTierLevel,
}

impl Vps {
    pub fn parse(rbsp: &[u8]) -> Result<Self> {
        let mut r = BitReader::new(rbsp);

        let vps_video_parameter_set_id = r.read_bits(4) as u8;
        r.read_bits(2); // vps_base_layer_internal/available_flag
        r.read_bits(6); // vps_max_layers_minus1
        let vps_max_sub_layers_minus1 = r.read_bits(3) as u8;
        let vps_temporal_id_nesting_flag = r.read_flag();
        let reserved = r.read_bits(16);
        if reserved != 0xffff {
            return Err(Error::SyntaxError("vps_reserved_0xffff_16bits mismatch".into()));
        }

        let ptl = ProfileTierLevel::parse(&mut r, true, vps_max_sub_layers_minus1);

        // Sub-layer ordering info (may be conditional on a flag in later
        // profiles, but all decoders in this corpus read it unconditionally
        // starting at layer 0 or `vps_max_sub_layers_minus1` depending on
        // the flag; we follow the common, always-present path).
        let vps_sub_layer_ordering_info_present_flag = r.read_flag();
        let start = if vps_sub_layer_ordering_info_present_flag {
            0
        } else {
            vps_max_sub_layers_minus1
        };
        for _ in start..=vps_max_sub_layers_minus1 {
            read_ue(&mut r)?; // vps_max_dec_pic_buffering_minus1
            read_ue(&mut r)?; // vps_max_num_reorder_pics
            read_ue(&mut r)?; // vps_max_latency_increase_plus1
        }

        if r.eof() {
            return Err(Error::SyntaxError("truncated video parameter set".into()));
        }

        Ok(Vps {
            vps_video_parameter_set_id,
            vps_max_sub_layers_minus1,
            vps_temporal_id_nesting_flag,
            ptl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_reserved_field() {
        let bytes = vec![0x00, 0x00, 0x00, 0x00];
        assert!(Vps::parse(&bytes).is_err());
    }
}
