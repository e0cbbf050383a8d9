//! Picture parameter set (§7.3.2.3). Parsed only as far as the fields the
//! slice-header and AU-boundary logic need: `pps_pic_parameter_set_id`,
//! `pps_seq_parameter_set_id`, `dependent_slice_segments_enabled_flag`,
//! `output_flag_present_flag` and `num_extra_slice_header_bits` (all read
//! directly by `slice_segment_header()`), plus tile/entropy-sync flags
//! needed to recognize `first_slice_segment_in_pic_flag` reliably.

use crate::bitreader::BitReader;
use crate::eg::{read_se, read_ue};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Pps {
    pub pps_pic_parameter_set_id: u8,
    pub pps_seq_parameter_set_id: u8,
    pub dependent_slice_segments_enabled_flag: bool,
    pub output_flag_present_flag: bool,
    pub num_extra_slice_header_bits: u8,
    pub sign_data_hiding_enabled_flag: bool,
    pub cabac_init_present_flag: bool,
    pub num_ref_idx_l0_default_active_minus1: u32,
    pub num_ref_idx_l1_default_active_minus1: u32,
    pub init_qp_minus26: i32,
    pub constrained_intra_pred_flag: bool,
    pub transform_skip_enabled_flag: bool,
    pub cu_qp_delta_enabled_flag: bool,
    pub pps_cb_qp_offset: i32,
    pub pps_cr_qp_offset: i32,
    pub pps_slice_chroma_qp_offsets_present_flag: bool,
    pub weighted_pred_flag: bool,
    pub weighted_bipred_flag: bool,
    pub transquant_bypass_enabled_flag: bool,
    pub tiles_enabled_flag: bool,
    pub entropy_coding_sync_enabled_flag: bool,
}

impl Pps {
    pub fn parse(rbsp: &[u8]) -> Result<Self> {
        let mut r = BitReader::new(rbsp);

        let pps_pic_parameter_set_id = read_ue(&mut r)? as u8;
        if pps_pic_parameter_set_id > 63 {
            return Err(Error::SyntaxError("invalid pps_pic_parameter_set_id".into()));
        }
        let pps_seq_parameter_set_id = read_ue(&mut r)? as u8;
        if pps_seq_parameter_set_id > 15 {
            return Err(Error::SyntaxError("invalid pps_seq_parameter_set_id".into()));
        }

        let dependent_slice_segments_enabled_flag = r.read_flag();
        let output_flag_present_flag = r.read_flag();
        let num_extra_slice_header_bits = r.read_bits(3) as u8;
        let sign_data_hiding_enabled_flag = r.read_flag();
        let cabac_init_present_flag = r.read_flag();
        let num_ref_idx_l0_default_active_minus1 = read_ue(&mut r)?;
        let num_ref_idx_l1_default_active_minus1 = read_ue(&mut r)?;
        let init_qp_minus26 = read_se(&mut r)?;
        let constrained_intra_pred_flag = r.read_flag();
        let transform_skip_enabled_flag = r.read_flag();
        let cu_qp_delta_enabled_flag = r.read_flag();
        if cu_qp_delta_enabled_flag {
            read_ue(&mut r)?; // diff_cu_qp_delta_depth
        }
        let pps_cb_qp_offset = read_se(&mut r)?;
        let pps_cr_qp_offset = read_se(&mut r)?;
        let pps_slice_chroma_qp_offsets_present_flag = r.read_flag();
        let weighted_pred_flag = r.read_flag();
        let weighted_bipred_flag = r.read_flag();
        let transquant_bypass_enabled_flag = r.read_flag();
        let tiles_enabled_flag = r.read_flag();
        let entropy_coding_sync_enabled_flag = r.read_flag();

        if tiles_enabled_flag {
            skip_tile_info(&mut r)?;
        }

        let _pps_loop_filter_across_slices_enabled_flag = r.read_flag();
        let deblocking_filter_control_present_flag = r.read_flag();
        if deblocking_filter_control_present_flag {
            let _deblocking_filter_override_enabled_flag = r.read_flag();
            let pps_deblocking_filter_disabled_flag = r.read_flag();
            if !pps_deblocking_filter_disabled_flag {
                read_se(&mut r)?; // pps_beta_offset_div2
                read_se(&mut r)?; // pps_tc_offset_div2
            }
        }

        let pps_scaling_list_data_present_flag = r.read_flag();
        if pps_scaling_list_data_present_flag {
            crate::hevc::sps::skip_scaling_list_data(&mut r)?;
        }

        let _lists_modification_present_flag = r.read_flag();
        read_ue(&mut r)?; // log2_parallel_merge_level_minus2
        let _slice_segment_header_extension_present_flag = r.read_flag();

        if r.eof() {
            return Err(Error::SyntaxError("truncated picture parameter set".into()));
        }

        Ok(Pps {
            pps_pic_parameter_set_id,
            pps_seq_parameter_set_id,
            dependent_slice_segments_enabled_flag,
            output_flag_present_flag,
            num_extra_slice_header_bits,
            sign_data_hiding_enabled_flag,
            cabac_init_present_flag,
            num_ref_idx_l0_default_active_minus1,
            num_ref_idx_l1_default_active_minus1,
            init_qp_minus26,
            constrained_intra_pred_flag,
            transform_skip_enabled_flag,
            cu_qp_delta_enabled_flag,
            pps_cb_qp_offset,
            pps_cr_qp_offset,
            pps_slice_chroma_qp_offsets_present_flag,
            weighted_pred_flag,
            weighted_bipred_flag,
            transquant_bypass_enabled_flag,
            tiles_enabled_flag,
            entropy_coding_sync_enabled_flag,
        })
    }
}

fn skip_tile_info(r: &mut BitReader) -> Result<()> {
    let num_tile_columns_minus1 = read_ue(r)?;
    let num_tile_rows_minus1 = read_ue(r)?;
    let uniform_spacing_flag = r.read_flag();
    if !uniform_spacing_flag {
        for _ in 0..num_tile_columns_minus1 {
            read_ue(r)?;
        }
        for _ in 0..num_tile_rows_minus1 {
            read_ue(r)?;
        }
    }
    r.read_flag(); // loop_filter_across_tiles_enabled_flag
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitWriter;

    pub(super) fn minimal_pps_bytes() -> Vec<u8> {
        let mut w = BitWriter::new();
        for bit in crate::eg::write_ue(0) {
            w.write_bit(bit);
        } // pps_pic_parameter_set_id
        for bit in crate::eg::write_ue(0) {
            w.write_bit(bit);
        } // pps_seq_parameter_set_id
        w.write_bit(false); // dependent_slice_segments_enabled_flag
        w.write_bit(false); // output_flag_present_flag
        w.write_bits(3, 0); // num_extra_slice_header_bits
        w.write_bit(false); // sign_data_hiding_enabled_flag
        w.write_bit(false); // cabac_init_present_flag
        for bit in crate::eg::write_ue(0) {
            w.write_bit(bit);
        }
        for bit in crate::eg::write_ue(0) {
            w.write_bit(bit);
        }
        for bit in crate::eg::write_se(0) {
            w.write_bit(bit);
        } // init_qp_minus26
        w.write_bit(false); // constrained_intra_pred_flag
        w.write_bit(false); // transform_skip_enabled_flag
        w.write_bit(false); // cu_qp_delta_enabled_flag
        for bit in crate::eg::write_se(0) {
            w.write_bit(bit);
        } // pps_cb_qp_offset
        for bit in crate::eg::write_se(0) {
            w.write_bit(bit);
        } // pps_cr_qp_offset
        w.write_bit(false); // pps_slice_chroma_qp_offsets_present_flag
        w.write_bit(false); // weighted_pred_flag
        w.write_bit(false); // weighted_bipred_flag
        w.write_bit(false); // transquant_bypass_enabled_flag
        w.write_bit(false); // tiles_enabled_flag
        w.write_bit(false); // entropy_coding_sync_enabled_flag
        w.write_bit(false); // pps_loop_filter_across_slices_enabled_flag
        w.write_bit(false); // deblocking_filter_control_present_flag
        w.write_bit(false); // pps_scaling_list_data_present_flag
        w.write_bit(false); // lists_modification_present_flag
        for bit in crate::eg::write_ue(0) {
            w.write_bit(bit);
        } // log2_parallel_merge_level_minus2
        w.write_bit(false); // slice_segment_header_extension_present_flag
        w.write_bit(true); // padding so eof() isn't hit exactly at the boundary

        w.into_bytes()
    }

    #[test]
    fn parses_minimal_pps() {
        let bytes = minimal_pps_bytes();
        let pps = Pps::parse(&bytes).unwrap();
        assert_eq!(pps.pps_pic_parameter_set_id, 0);
        assert_eq!(pps.num_extra_slice_header_bits, 0);
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    pub fn minimal_pps_bytes() -> Vec<u8> {
        super::tests::minimal_pps_bytes()
    }
}
