//! Slice segment header (§7.3.6.1), parsed only through the fields the AU
//! assembly and POC derivation need — `first_slice_segment_in_pic_flag`,
//! the active PPS/SPS ids, slice type, and the short-term RPS selector plus
//! `pic_order_cnt_lsb`. Reference-picture-list construction and
//! weighted-prediction tables are out of scope, mirroring how
//! `avc::slice::SliceHeader` stops before `dec_ref_pic_marking`.

use crate::bitreader::BitReader;
use crate::eg::read_ue;
use crate::error::Result;
use crate::hevc::nal::NalUnitType;
use crate::hevc::pps::Pps;
use crate::hevc::rps::ShortTermRps;
use crate::hevc::sps::Sps;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceType {
    B,
    P,
    I,
}

impl SliceType {
    pub fn from_value(v: u32) -> Option<Self> {
        match v {
            0 => Some(SliceType::B),
            1 => Some(SliceType::P),
            2 => Some(SliceType::I),
            _ => None,
        }
    }

    pub fn is_intra_only(self) -> bool {
        matches!(self, SliceType::I)
    }
}

#[derive(Debug, Clone)]
pub struct SliceHeader {
    pub first_slice_segment_in_pic_flag: bool,
    pub no_output_of_prior_pics_flag: bool,
    pub slice_pic_parameter_set_id: u8,
    pub dependent_slice_segment_flag: bool,
    pub slice_segment_address: u32,
    pub slice_type: SliceType,
    pub pic_output_flag: bool,
    pub colour_plane_id: u8,
    pub pic_order_cnt_lsb: u32,
    pub short_term_ref_pic_set_sps_flag: bool,
    pub short_term_ref_pic_set_idx: usize,
    pub rps: ShortTermRps,
}

impl SliceHeader {
    pub fn parse(rbsp: &[u8], nal_type: NalUnitType, sps: &Sps, pps: &Pps) -> Result<Self> {
        let mut r = BitReader::new(rbsp);

        let first_slice_segment_in_pic_flag = r.read_flag();

        let mut no_output_of_prior_pics_flag = false;
        if nal_type.is_irap() {
            no_output_of_prior_pics_flag = r.read_flag();
        }

        let slice_pic_parameter_set_id = read_ue(&mut r)? as u8;

        let mut dependent_slice_segment_flag = false;
        let mut slice_segment_address = 0u32;
        if !first_slice_segment_in_pic_flag {
            if pps.dependent_slice_segments_enabled_flag {
                dependent_slice_segment_flag = r.read_flag();
            }
            let bits = 32 - (sps.pic_size_in_ctbs_y.max(1) - 1).leading_zeros().min(32);
            slice_segment_address = r.read_bits(bits.max(1));
        }

        let mut slice_type = SliceType::I;
        let mut pic_output_flag = true;
        let mut colour_plane_id = 0;
        let mut pic_order_cnt_lsb = 0;
        let mut short_term_ref_pic_set_sps_flag = false;
        let mut short_term_ref_pic_set_idx = 0;
        let mut rps = ShortTermRps::default();

        if !dependent_slice_segment_flag {
            for _ in 0..pps.num_extra_slice_header_bits {
                r.read_flag();
            }
            let slice_type_value = read_ue(&mut r)?;
            slice_type = SliceType::from_value(slice_type_value)
                .ok_or_else(|| crate::error::Error::SyntaxError("invalid slice_type".into()))?;

            if pps.output_flag_present_flag {
                pic_output_flag = r.read_flag();
            }
            if sps.separate_colour_plane_flag {
                colour_plane_id = r.read_bits(2) as u8;
            }

            if !nal_type.is_idr() {
                pic_order_cnt_lsb = r.read_bits(sps.log2_max_pic_order_cnt_lsb_minus4 as u32 + 4);
                short_term_ref_pic_set_sps_flag = r.read_flag();
                if !short_term_ref_pic_set_sps_flag {
                    rps = ShortTermRps::parse(
                        &mut r,
                        sps.short_term_ref_pic_sets.len(),
                        sps.short_term_ref_pic_sets.len(),
                        &sps.short_term_ref_pic_sets,
                    )?;
                } else if !sps.short_term_ref_pic_sets.is_empty() {
                    let num_bits = (sps.short_term_ref_pic_sets.len() as u32).max(2).ilog2() + 1;
                    short_term_ref_pic_set_idx = if sps.short_term_ref_pic_sets.len() > 1 {
                        r.read_bits(num_bits) as usize
                    } else {
                        0
                    };
                    rps = sps
                        .short_term_ref_pic_sets
                        .get(short_term_ref_pic_set_idx)
                        .cloned()
                        .unwrap_or_default();
                }
            }
        }

        Ok(SliceHeader {
            first_slice_segment_in_pic_flag,
            no_output_of_prior_pics_flag,
            slice_pic_parameter_set_id,
            dependent_slice_segment_flag,
            slice_segment_address,
            slice_type,
            pic_output_flag,
            colour_plane_id,
            pic_order_cnt_lsb,
            short_term_ref_pic_set_sps_flag,
            short_term_ref_pic_set_idx,
            rps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitWriter;

    fn test_sps() -> Sps {
        let bytes = crate::hevc::sps::tests_support::minimal_1080p_sps_bytes();
        Sps::parse(&bytes).unwrap()
    }

    fn test_pps() -> Pps {
        let bytes = crate::hevc::pps::tests_support::minimal_pps_bytes();
        Pps::parse(&bytes).unwrap()
    }

    #[test]
    fn first_slice_flag_and_idr_skip_poc() {
        let sps = test_sps();
        let pps = test_pps();

        let mut w = BitWriter::new();
        w.write_bit(true); // first_slice_segment_in_pic_flag
        w.write_bit(false); // no_output_of_prior_pics_flag
        for bit in crate::eg::write_ue(0) {
            w.write_bit(bit);
        } // slice_pic_parameter_set_id
        for bit in crate::eg::write_ue(2) {
            w.write_bit(bit);
        } // slice_type = I
        let bytes = w.into_bytes();

        let header = SliceHeader::parse(&bytes, NalUnitType::IdrWRadl, &sps, &pps).unwrap();
        assert!(header.first_slice_segment_in_pic_flag);
        assert_eq!(header.slice_type, SliceType::I);
        assert_eq!(header.pic_order_cnt_lsb, 0);
    }
}
