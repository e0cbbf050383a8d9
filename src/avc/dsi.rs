//! `avcC` (AVCDecoderConfigurationRecord, ISO/IEC 14496-15 §5.2.4.1) builder
//! (SPEC_FULL.md §4.7). Field order is fixed by the box spec; this writer
//! follows it exactly rather than deriving it from the parsed SPS/PPS
//! structs, since a handful of the leading fields (profile/level, chroma
//! format) are re-read straight off the raw NAL bytes rather than the
//! parsed struct, matching the original's `avc_dsi_t` construction from raw
//! parameter-set buffers.

use crate::bitreader::BitWriter;

/// Raw (already-RBSP-escaped, with NAL header byte, start code stripped)
/// SPS/PPS NAL bytes to be embedded, plus the extra fields carried only
/// when the high-profile chroma/bit-depth extension is present.
pub struct AvcDsiInput<'a> {
    pub sps_nalus: &'a [Vec<u8>],
    pub pps_nalus: &'a [Vec<u8>],
    pub sps_ext_nalus: &'a [Vec<u8>],
    pub profile_idc: u8,
    pub profile_compatibility: u8,
    pub level_idc: u8,
    pub chroma_format_idc: u8,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    /// When set (`dsi_in_mdat`, sample entry `avc3`), parameter sets are
    /// carried in-band and the record's SPS/PPS/ext counts are zero.
    pub dsi_in_mdat: bool,
}

const HIGH_PROFILES_WITH_CHROMA_EXT: [u8; 4] = [100, 110, 122, 144];

pub fn build_avcc(input: &AvcDsiInput) -> Vec<u8> {
    let mut w = BitWriter::new();

    w.write_u8(1); // configurationVersion
    w.write_u8(input.profile_idc);
    w.write_u8(input.profile_compatibility);
    w.write_u8(input.level_idc);

    w.write_bits(6, 0b111111);
    w.write_bits(2, 3); // lengthSizeMinusOne = 3 (4-byte NAL length field)

    w.write_bits(3, 0b111);
    if input.dsi_in_mdat {
        w.write_bits(5, 0);
    } else {
        w.write_bits(5, input.sps_nalus.len() as u32);
        for sps in input.sps_nalus {
            w.write_u16(sps.len() as u16);
            w.write_bytes(sps);
        }
    }

    if input.dsi_in_mdat {
        w.write_u8(0);
    } else {
        w.write_u8(input.pps_nalus.len() as u8);
        for pps in input.pps_nalus {
            w.write_u16(pps.len() as u16);
            w.write_bytes(pps);
        }
    }

    if HIGH_PROFILES_WITH_CHROMA_EXT.contains(&input.profile_idc) {
        w.write_bits(6, 0b111111);
        w.write_bits(2, input.chroma_format_idc as u32);
        w.write_bits(5, 0b11111);
        w.write_bits(3, input.bit_depth_luma_minus8 as u32);
        w.write_bits(5, 0b11111);
        w.write_bits(3, input.bit_depth_chroma_minus8 as u32);

        if input.dsi_in_mdat {
            w.write_u8(0);
        } else {
            w.write_u8(input.sps_ext_nalus.len() as u8);
            for ext in input.sps_ext_nalus {
                w.write_u16(ext.len() as u16);
                w.write_bytes(ext);
            }
        }
    }

    w.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_record_is_at_least_the_fixed_header() {
        let input = AvcDsiInput {
            sps_nalus: &[],
            pps_nalus: &[],
            sps_ext_nalus: &[],
            profile_idc: 66,
            profile_compatibility: 0xC0,
            level_idc: 30,
            chroma_format_idc: 1,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            dsi_in_mdat: false,
        };
        let record = build_avcc(&input);
        assert!(record.len() >= 7);
        assert_eq!(record[0], 1);
        assert_eq!(record[1], 66);
    }

    #[test]
    fn embeds_sps_and_pps_with_length_prefixes() {
        let sps = vec![0x67, 0x42, 0x00, 0x1f];
        let pps = vec![0x68, 0xee, 0x3c, 0x80];
        let input = AvcDsiInput {
            sps_nalus: std::slice::from_ref(&sps),
            pps_nalus: std::slice::from_ref(&pps),
            sps_ext_nalus: &[],
            profile_idc: 66,
            profile_compatibility: 0xC0,
            level_idc: 30,
            chroma_format_idc: 1,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            dsi_in_mdat: false,
        };
        let record = build_avcc(&input);
        // header(5) + numSps(1, folded into reserved byte) ...
        assert!(record.len() > 7 + sps.len() + pps.len());
    }

    #[test]
    fn dsi_in_mdat_emits_zero_counts_only() {
        let sps = vec![0x67, 0x42, 0x00, 0x1f];
        let input = AvcDsiInput {
            sps_nalus: std::slice::from_ref(&sps),
            pps_nalus: &[],
            sps_ext_nalus: &[],
            profile_idc: 66,
            profile_compatibility: 0xC0,
            level_idc: 30,
            chroma_format_idc: 1,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            dsi_in_mdat: true,
        };
        let record = build_avcc(&input);
        assert_eq!(record.len(), 7); // fixed header only, no parameter sets
    }
}
