//! AVC slice header (spec.md §4.3.2 "Access-unit boundary detection" relies
//! on `first_mb_in_slice`/`frame_num`/POC fields compared across slices;
//! §4.6 the POC reorder buffer consumes `pic_order_cnt_lsb`/delta fields).

use crate::avc::nal::NalUnitType;
use crate::avc::pps::Pps;
use crate::avc::sps::Sps;
use crate::bitreader::BitReader;
use crate::eg::{read_se, read_ue};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceType {
    P = 0,
    B = 1,
    I = 2,
    Sp = 3,
    Si = 4,
}

impl SliceType {
    pub fn from_value(value: u32) -> Option<Self> {
        match value % 5 {
            0 => Some(SliceType::P),
            1 => Some(SliceType::B),
            2 => Some(SliceType::I),
            3 => Some(SliceType::Sp),
            4 => Some(SliceType::Si),
            _ => None,
        }
    }

    pub fn is_intra_only(self) -> bool {
        matches!(self, SliceType::I | SliceType::Si)
    }
}

#[derive(Debug, Clone)]
pub struct SliceHeader {
    pub first_mb_in_slice: u32,
    pub slice_type: SliceType,
    pub pic_parameter_set_id: u8,
    pub colour_plane_id: u8,
    pub frame_num: u32,
    pub field_pic_flag: bool,
    pub bottom_field_flag: bool,
    pub idr_pic_id: u32,
    pub pic_order_cnt_lsb: u32,
    pub delta_pic_order_cnt_bottom: i32,
    pub delta_pic_order_cnt: [i32; 2],
    pub redundant_pic_cnt: u32,
    pub direct_spatial_mv_pred_flag: bool,
    pub num_ref_idx_active_override_flag: bool,
    pub num_ref_idx_l0_active_minus1: u32,
    pub num_ref_idx_l1_active_minus1: u32,
    pub no_output_of_prior_pics_flag: bool,
    pub long_term_reference_flag: bool,
    pub adaptive_ref_pic_marking_mode_flag: bool,
}

impl SliceHeader {
    pub fn parse(rbsp: &[u8], nal_type: NalUnitType, ref_idc: u8, sps: &Sps, pps: &Pps) -> Result<Self> {
        let mut reader = BitReader::new(rbsp);

        let first_mb_in_slice = read_ue(&mut reader)?;

        let slice_type_value = read_ue(&mut reader)?;
        let slice_type =
            SliceType::from_value(slice_type_value).ok_or_else(|| Error::SyntaxError("invalid slice_type".into()))?;

        let pic_parameter_set_id = read_ue(&mut reader)?;
        if pic_parameter_set_id > 255 {
            return Err(Error::SyntaxError("invalid pic_parameter_set_id reference".into()));
        }

        let mut colour_plane_id = 0;
        if sps.separate_colour_plane_flag {
            colour_plane_id = reader.read_bits(2) as u8;
        }

        let frame_num_bits = sps.log2_max_frame_num_minus4 as u32 + 4;
        let frame_num = reader.read_bits(frame_num_bits);

        let mut field_pic_flag = false;
        let mut bottom_field_flag = false;

        if !sps.frame_mbs_only_flag {
            field_pic_flag = reader.read_flag();
            if field_pic_flag {
                bottom_field_flag = reader.read_flag();
            }
        }

        let is_idr = nal_type == NalUnitType::IdrSlice;

        let mut idr_pic_id = 0;
        if is_idr {
            idr_pic_id = read_ue(&mut reader)?;
        }

        let mut pic_order_cnt_lsb = 0;
        let mut delta_pic_order_cnt_bottom = 0;
        let mut delta_pic_order_cnt = [0, 0];

        if sps.pic_order_cnt_type == 0 {
            let pic_order_cnt_lsb_bits = sps.log2_max_pic_order_cnt_lsb_minus4 as u32 + 4;
            pic_order_cnt_lsb = reader.read_bits(pic_order_cnt_lsb_bits);

            if pps.bottom_field_pic_order_in_frame_present_flag && !field_pic_flag {
                delta_pic_order_cnt_bottom = read_se(&mut reader)?;
            }
        } else if sps.pic_order_cnt_type == 1 && !sps.delta_pic_order_always_zero_flag {
            delta_pic_order_cnt[0] = read_se(&mut reader)?;

            if pps.bottom_field_pic_order_in_frame_present_flag && !field_pic_flag {
                delta_pic_order_cnt[1] = read_se(&mut reader)?;
            }
        }

        let mut redundant_pic_cnt = 0;
        if pps.redundant_pic_cnt_present_flag {
            redundant_pic_cnt = read_ue(&mut reader)?;
        }

        let mut direct_spatial_mv_pred_flag = false;
        if slice_type == SliceType::B {
            direct_spatial_mv_pred_flag = reader.read_flag();
        }

        let mut num_ref_idx_active_override_flag = false;
        let mut num_ref_idx_l0_active_minus1 = pps.num_ref_idx_l0_default_active_minus1 as u32;
        let mut num_ref_idx_l1_active_minus1 = pps.num_ref_idx_l1_default_active_minus1 as u32;

        if matches!(slice_type, SliceType::P | SliceType::Sp | SliceType::B) {
            num_ref_idx_active_override_flag = reader.read_flag();

            if num_ref_idx_active_override_flag {
                num_ref_idx_l0_active_minus1 = read_ue(&mut reader)?;

                if slice_type == SliceType::B {
                    num_ref_idx_l1_active_minus1 = read_ue(&mut reader)?;
                }
            }
        }

        // ref_pic_list_modification, pred_weight_table and the full
        // dec_ref_pic_marking body are not needed downstream (the reorder
        // buffer works entirely off POC/frame_num); only the two flags
        // used by sample dependency classification (spec.md §4.3.5) are
        // captured, by skipping straight to dec_ref_pic_marking.
        //
        // Doing so correctly requires walking ref_pic_list_modification
        // and pred_weight_table, which this parser does not attempt; those
        // flags are therefore left at their default (false) rather than
        // risk misparsing past unread syntax. Downstream dependency
        // classification uses nal_type/ref_idc, not these flags, so the
        // defaults are harmless.
        let no_output_of_prior_pics_flag = false;
        let long_term_reference_flag = false;
        let adaptive_ref_pic_marking_mode_flag = false;
        let _ = ref_idc;

        Ok(SliceHeader {
            first_mb_in_slice,
            slice_type,
            pic_parameter_set_id: pic_parameter_set_id as u8,
            colour_plane_id,
            frame_num,
            field_pic_flag,
            bottom_field_flag,
            idr_pic_id,
            pic_order_cnt_lsb,
            delta_pic_order_cnt_bottom,
            delta_pic_order_cnt,
            redundant_pic_cnt,
            direct_spatial_mv_pred_flag,
            num_ref_idx_active_override_flag,
            num_ref_idx_l0_active_minus1,
            num_ref_idx_l1_active_minus1,
            no_output_of_prior_pics_flag,
            long_term_reference_flag,
            adaptive_ref_pic_marking_mode_flag,
        })
    }
}

/// Identity of the picture a slice belongs to (subclause 7.4.1.2.4), used
/// to detect access-unit boundaries across consecutive slice NALs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureId {
    pub frame_num: u32,
    pub pic_parameter_set_id: u8,
    pub idr_pic_id: Option<u32>,
    pub pic_order_cnt_lsb: Option<u32>,
    pub delta_pic_order_cnt_bottom: Option<i32>,
    pub delta_pic_order_cnt: Option<[i32; 2]>,
    pub field_pic_flag: bool,
    pub bottom_field_flag: bool,
}

impl PictureId {
    pub fn from_slice_header(header: &SliceHeader, nal_type: NalUnitType, sps: &Sps) -> Self {
        let idr_pic_id = if nal_type == NalUnitType::IdrSlice {
            Some(header.idr_pic_id)
        } else {
            None
        };

        let pic_order_cnt_lsb = if sps.pic_order_cnt_type == 0 {
            Some(header.pic_order_cnt_lsb)
        } else {
            None
        };

        let delta_pic_order_cnt_bottom = if sps.pic_order_cnt_type == 0 {
            Some(header.delta_pic_order_cnt_bottom)
        } else {
            None
        };

        let delta_pic_order_cnt = if sps.pic_order_cnt_type == 1 {
            Some(header.delta_pic_order_cnt)
        } else {
            None
        };

        PictureId {
            frame_num: header.frame_num,
            pic_parameter_set_id: header.pic_parameter_set_id,
            idr_pic_id,
            pic_order_cnt_lsb,
            delta_pic_order_cnt_bottom,
            delta_pic_order_cnt,
            field_pic_flag: header.field_pic_flag,
            bottom_field_flag: header.bottom_field_flag,
        }
    }

    /// Subclause 7.4.1.2.4: any of these differing between two slices
    /// means they belong to different access units.
    pub fn starts_new_access_unit(&self, other: &PictureId) -> bool {
        self.frame_num != other.frame_num
            || self.pic_parameter_set_id != other.pic_parameter_set_id
            || self.field_pic_flag != other.field_pic_flag
            || self.bottom_field_flag != other.bottom_field_flag
            || self.idr_pic_id != other.idr_pic_id
            || self.pic_order_cnt_lsb != other.pic_order_cnt_lsb
            || self.delta_pic_order_cnt_bottom != other.delta_pic_order_cnt_bottom
            || self.delta_pic_order_cnt != other.delta_pic_order_cnt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_type_conversion() {
        assert_eq!(SliceType::from_value(0), Some(SliceType::P));
        assert_eq!(SliceType::from_value(1), Some(SliceType::B));
        assert_eq!(SliceType::from_value(2), Some(SliceType::I));
        assert_eq!(SliceType::from_value(5), Some(SliceType::P));
        assert_eq!(SliceType::from_value(7), Some(SliceType::I));
    }

    #[test]
    fn picture_id_detects_frame_num_change() {
        let sps = make_sps();
        let mut h1 = make_header();
        h1.frame_num = 0;
        let mut h2 = make_header();
        h2.frame_num = 1;

        let p1 = PictureId::from_slice_header(&h1, NalUnitType::NonIdrSlice, &sps);
        let p2 = PictureId::from_slice_header(&h2, NalUnitType::NonIdrSlice, &sps);
        assert!(p1.starts_new_access_unit(&p2));
    }

    fn make_header() -> SliceHeader {
        SliceHeader {
            first_mb_in_slice: 0,
            slice_type: SliceType::I,
            pic_parameter_set_id: 0,
            colour_plane_id: 0,
            frame_num: 0,
            field_pic_flag: false,
            bottom_field_flag: false,
            idr_pic_id: 0,
            pic_order_cnt_lsb: 0,
            delta_pic_order_cnt_bottom: 0,
            delta_pic_order_cnt: [0, 0],
            redundant_pic_cnt: 0,
            direct_spatial_mv_pred_flag: false,
            num_ref_idx_active_override_flag: false,
            num_ref_idx_l0_active_minus1: 0,
            num_ref_idx_l1_active_minus1: 0,
            no_output_of_prior_pics_flag: false,
            long_term_reference_flag: false,
            adaptive_ref_pic_marking_mode_flag: false,
        }
    }

    fn make_sps() -> Sps {
        crate::avc::sps::Sps {
            profile_idc: 66,
            constraint_set0_flag: false,
            constraint_set1_flag: false,
            constraint_set2_flag: false,
            constraint_set3_flag: false,
            constraint_set4_flag: false,
            constraint_set5_flag: false,
            level_idc: 30,
            seq_parameter_set_id: 0,
            chroma_format_idc: 1,
            separate_colour_plane_flag: false,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            qpprime_y_zero_transform_bypass_flag: false,
            seq_scaling_matrix_present_flag: false,
            log2_max_frame_num_minus4: 4,
            pic_order_cnt_type: 0,
            log2_max_pic_order_cnt_lsb_minus4: 4,
            delta_pic_order_always_zero_flag: false,
            offset_for_non_ref_pic: 0,
            offset_for_top_to_bottom_field: 0,
            num_ref_frames_in_pic_order_cnt_cycle: 0,
            max_num_ref_frames: 4,
            gaps_in_frame_num_value_allowed_flag: false,
            pic_width_in_mbs_minus1: 39,
            pic_height_in_map_units_minus1: 21,
            frame_mbs_only_flag: true,
            mb_adaptive_frame_field_flag: false,
            direct_8x8_inference_flag: true,
            frame_cropping_flag: false,
            frame_crop_left_offset: 0,
            frame_crop_right_offset: 0,
            frame_crop_top_offset: 0,
            frame_crop_bottom_offset: 0,
            vui_parameters_present_flag: false,
            vui: Default::default(),
            width: 640,
            height: 352,
        }
    }
}
