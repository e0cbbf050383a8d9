//! `profile_tier_level()` (§7.3.3), grounded on
//! `parse_profile_tier`/`parse_ptl` in the original decoder
//! (`parser_hevc_dec.c`): a fixed-size general section followed by one
//! optional sub-layer section per sub-layer.

use crate::bitreader::BitReader;

#[derive(Debug, Clone, Default)]
pub struct ProfileTierLevel {
    pub general_profile_space: u8,
    pub general_tier_flag: bool,
    pub general_profile_idc: u8,
    pub general_profile_compatibility_flags: u32,
    pub general_progressive_source_flag: bool,
    pub general_interlaced_source_flag: bool,
    pub general_non_packed_constraint_flag: bool,
    pub general_frame_only_constraint_flag: bool,
    pub general_level_idc: u8,
}

impl ProfileTierLevel {
    pub fn parse(r: &mut BitReader, profile_present: bool, max_sub_layers_minus1: u8) -> Self {
        let mut ptl = ProfileTierLevel::default();

        if profile_present {
            ptl.general_profile_space = r.read_bits(2) as u8;
            ptl.general_tier_flag = r.read_flag();
            ptl.general_profile_idc = r.read_bits(5) as u8;
            ptl.general_profile_compatibility_flags = r.read_bits(32);
            ptl.general_progressive_source_flag = r.read_flag();
            ptl.general_interlaced_source_flag = r.read_flag();
            ptl.general_non_packed_constraint_flag = r.read_flag();
            ptl.general_frame_only_constraint_flag = r.read_flag();
            // 43 reserved constraint bits + 1 inbld/reserved bit: matches the
            // original's 16+16+12 split.
            r.read_bits(16);
            r.read_bits(16);
            r.read_bits(12);
        }

        ptl.general_level_idc = r.read_bits(8) as u8;

        let mut sub_layer_profile_present = vec![false; max_sub_layers_minus1 as usize];
        let mut sub_layer_level_present = vec![false; max_sub_layers_minus1 as usize];
        for i in 0..max_sub_layers_minus1 as usize {
            sub_layer_profile_present[i] = r.read_flag();
            sub_layer_level_present[i] = r.read_flag();
        }
        if max_sub_layers_minus1 > 0 {
            for _ in max_sub_layers_minus1..8 {
                r.read_bits(2); // reserved_zero_2bits
            }
        }
        for i in 0..max_sub_layers_minus1 as usize {
            if sub_layer_profile_present[i] {
                r.read_bits(2);
                r.read_flag();
                r.read_bits(5);
                r.read_bits(32);
                r.read_bits(4); // progressive/interlaced/non_packed/frame_only
                r.read_bits(16);
                r.read_bits(16);
                r.read_bits(12);
            }
            if sub_layer_level_present[i] {
                r.read_bits(8);
            }
        }

        ptl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_general_section_only_when_no_sub_layers() {
        let mut bytes = vec![0u8; 12];
        bytes[0] = 0b001_00001; // profile_space=0, tier=0, profile_idc=1
        bytes[11] = 93; // general_level_idc
        let mut r = BitReader::new(&bytes);
        let ptl = ProfileTierLevel::parse(&mut r, true, 0);
        assert_eq!(ptl.general_profile_idc, 1);
        assert_eq!(ptl.general_level_idc, 93);
    }
}
