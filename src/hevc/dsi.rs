//! `hvcC` (HEVCDecoderConfigurationRecord, ISO/IEC 14496-15) builder
//! (SPEC_FULL.md §4.7). The same field layout also produces the
//! Dolby-Vision enhancement-layer `hvcE` record (§4.8): callers just point
//! it at the EL VPS/SPS/PPS NALs instead of the base layer's.

use crate::bitreader::BitWriter;
use crate::hevc::ptl::ProfileTierLevel;

/// One `numOfArrays` entry: a NAL unit type plus the (already RBSP-escaped,
/// NAL-header-included) NAL payloads to embed under it.
pub struct NaluArray<'a> {
    pub nal_unit_type: u8,
    pub array_completeness: bool,
    pub nalus: &'a [Vec<u8>],
}

pub struct HevcDsiInput<'a> {
    pub ptl: &'a ProfileTierLevel,
    pub general_constraint_indicator_flags: u64,
    pub chroma_format_idc: u8,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub min_spatial_segmentation_idc: u16,
    pub parallelism_type: u8,
    pub avg_frame_rate: u16,
    pub constant_frame_rate: u8,
    pub num_temporal_layers: u8,
    pub temporal_id_nested: bool,
    pub arrays: &'a [NaluArray<'a>],
}

pub fn build_hvcc(input: &HevcDsiInput) -> Vec<u8> {
    let mut w = BitWriter::new();

    w.write_u8(1); // configurationVersion

    w.write_bits(2, input.ptl.general_profile_space as u32);
    w.write_bit(input.ptl.general_tier_flag);
    w.write_bits(5, input.ptl.general_profile_idc as u32);
    w.write_bits(32, input.ptl.general_profile_compatibility_flags);

    // general_constraint_indicator_flags: 48 bits, written as two halves.
    w.write_bits(32, (input.general_constraint_indicator_flags >> 16) as u32);
    w.write_bits(16, (input.general_constraint_indicator_flags & 0xffff) as u32);

    w.write_u8(input.ptl.general_level_idc);

    w.write_bits(4, 0b1111);
    w.write_bits(12, input.min_spatial_segmentation_idc as u32);

    w.write_bits(6, 0b111111);
    w.write_bits(2, input.parallelism_type as u32);

    w.write_bits(6, 0b111111);
    w.write_bits(2, input.chroma_format_idc as u32);

    w.write_bits(5, 0b11111);
    w.write_bits(3, input.bit_depth_luma_minus8 as u32);

    w.write_bits(5, 0b11111);
    w.write_bits(3, input.bit_depth_chroma_minus8 as u32);

    w.write_u16(input.avg_frame_rate);

    w.write_bits(2, input.constant_frame_rate as u32);
    w.write_bits(3, input.num_temporal_layers as u32);
    w.write_bit(input.temporal_id_nested);
    w.write_bits(2, 3); // lengthSizeMinusOne = 3 (4-byte NAL length field)

    w.write_u8(input.arrays.len() as u8);
    for array in input.arrays {
        w.write_bit(array.array_completeness);
        w.write_bit(false); // reserved
        w.write_bits(6, array.nal_unit_type as u32);
        w.write_u16(array.nalus.len() as u16);
        for nalu in array.nalus {
            w.write_u16(nalu.len() as u16);
            w.write_bytes(nalu);
        }
    }

    w.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_record_has_fixed_header_and_array_count() {
        let ptl = ProfileTierLevel {
            general_profile_idc: 1,
            general_level_idc: 93,
            ..Default::default()
        };
        let input = HevcDsiInput {
            ptl: &ptl,
            general_constraint_indicator_flags: 0,
            chroma_format_idc: 1,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            min_spatial_segmentation_idc: 0,
            parallelism_type: 0,
            avg_frame_rate: 0,
            constant_frame_rate: 0,
            num_temporal_layers: 1,
            temporal_id_nested: false,
            arrays: &[],
        };
        let record = build_hvcc(&input);
        assert_eq!(record[0], 1);
        assert_eq!(*record.last().unwrap(), 0); // numOfArrays = 0
    }

    #[test]
    fn embeds_vps_sps_pps_arrays() {
        let vps = vec![0x40, 0x01, 0x0c];
        let sps = vec![0x42, 0x01, 0x01];
        let pps = vec![0x44, 0x01];
        let ptl = ProfileTierLevel::default();
        let arrays = [
            NaluArray { nal_unit_type: 32, array_completeness: true, nalus: std::slice::from_ref(&vps) },
            NaluArray { nal_unit_type: 33, array_completeness: true, nalus: std::slice::from_ref(&sps) },
            NaluArray { nal_unit_type: 34, array_completeness: true, nalus: std::slice::from_ref(&pps) },
        ];
        let input = HevcDsiInput {
            ptl: &ptl,
            general_constraint_indicator_flags: 0,
            chroma_format_idc: 1,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            min_spatial_segmentation_idc: 0,
            parallelism_type: 0,
            avg_frame_rate: 0,
            constant_frame_rate: 0,
            num_temporal_layers: 1,
            temporal_id_nested: false,
            arrays: &arrays,
        };
        let record = build_hvcc(&input);
        assert_eq!(record[22], 3); // numOfArrays, at the end of the 23-byte fixed header
        assert!(record.len() > 23 + vps.len() + sps.len() + pps.len());
    }
}
