//! Short-term reference picture set parsing (§7.3.7 `st_ref_pic_set`),
//! grounded on `decode_short_term_rps` in `parser_hevc_dec.c`: supports both
//! the explicit form (separate negative/positive delta-POC lists) and the
//! inter-RPS-prediction form that derives a set from an earlier one in the
//! same SPS.

use crate::bitreader::BitReader;
use crate::eg::read_ue;
use crate::error::Result;

pub const MAX_NUM_REF_PICS: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct ShortTermRps {
    /// Delta-POC values relative to the current picture, negative entries
    /// first (sorted descending by `|delta_poc|`, i.e. closest-first) then
    /// positive entries (sorted ascending), matching the bitstream's
    /// decoding order after the original's insertion-sort-then-reverse step.
    pub delta_poc: Vec<i32>,
    pub used_by_curr_pic: Vec<bool>,
    pub num_negative_pictures: usize,
    pub num_positive_pictures: usize,
}

impl ShortTermRps {
    pub fn num_pictures(&self) -> usize {
        self.delta_poc.len()
    }

    /// Parses the RPS at `idx` out of `num_short_term_ref_pic_sets` total
    /// sets declared in the SPS (or `idx == num_short_term_ref_pic_sets` for
    /// the slice-header's own, extra, RPS). `prior_sets` holds every RPS
    /// decoded so far in the same list, needed for inter-RPS prediction.
    pub fn parse(
        r: &mut BitReader,
        idx: usize,
        num_short_term_ref_pic_sets: usize,
        prior_sets: &[ShortTermRps],
    ) -> Result<Self> {
        let inter_ref_pic_set_prediction_flag = if idx != 0 { r.read_flag() } else { false };

        if inter_ref_pic_set_prediction_flag {
            let delta_idx_minus1 = if idx == num_short_term_ref_pic_sets {
                read_ue(r)?
            } else {
                0
            };
            let ref_idx = idx as i64 - 1 - delta_idx_minus1 as i64;
            let ref_rps = prior_sets
                .get(ref_idx.max(0) as usize)
                .cloned()
                .unwrap_or_default();

            let delta_rps_sign = r.read_flag();
            let abs_delta_rps_minus1 = read_ue(r)?;
            let delta_rps = if delta_rps_sign {
                -(abs_delta_rps_minus1 as i32 + 1)
            } else {
                abs_delta_rps_minus1 as i32 + 1
            };

            let mut entries: Vec<(i32, bool)> = Vec::new();
            for j in 0..=ref_rps.num_pictures() {
                let used_by_curr_pic_flag = r.read_flag();
                let use_delta_flag = if !used_by_curr_pic_flag { r.read_flag() } else { true };

                if used_by_curr_pic_flag || use_delta_flag {
                    let ref_delta_poc = if j < ref_rps.num_pictures() {
                        ref_rps.delta_poc[j]
                    } else {
                        0
                    };
                    let delta_poc = ref_delta_poc + delta_rps;
                    entries.push((delta_poc, used_by_curr_pic_flag));
                }
            }

            entries.sort_by_key(|(d, _)| *d);
            let num_negative = entries.iter().filter(|(d, _)| *d < 0).count();
            // Negatives are stored closest-POC-first, i.e. descending delta;
            // ascending sort puts them furthest-first, so reverse that span.
            entries[..num_negative].reverse();

            let num_positive = entries.len() - num_negative;
            let (delta_poc, used_by_curr_pic): (Vec<_>, Vec<_>) = entries.into_iter().unzip();

            Ok(ShortTermRps {
                delta_poc,
                used_by_curr_pic,
                num_negative_pictures: num_negative,
                num_positive_pictures: num_positive,
            })
        } else {
            let num_negative_pictures = read_ue(r)? as usize;
            let num_positive_pictures = read_ue(r)? as usize;

            let mut delta_poc = Vec::with_capacity(num_negative_pictures + num_positive_pictures);
            let mut used_by_curr_pic = Vec::with_capacity(num_negative_pictures + num_positive_pictures);

            let mut prev = 0i32;
            for _ in 0..num_negative_pictures {
                let delta_poc_s0_minus1 = read_ue(r)? as i32;
                let poc = prev - delta_poc_s0_minus1 - 1;
                prev = poc;
                delta_poc.push(poc);
                used_by_curr_pic.push(r.read_flag());
            }

            prev = 0;
            for _ in 0..num_positive_pictures {
                let delta_poc_s1_minus1 = read_ue(r)? as i32;
                let poc = prev + delta_poc_s1_minus1 + 1;
                prev = poc;
                delta_poc.push(poc);
                used_by_curr_pic.push(r.read_flag());
            }

            Ok(ShortTermRps {
                delta_poc,
                used_by_curr_pic,
                num_negative_pictures,
                num_positive_pictures,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitWriter;

    #[test]
    fn explicit_form_round_trips_through_ue_coding() {
        let mut w = BitWriter::new();
        // num_negative=1, num_positive=1
        for bit in crate::eg::write_ue(1) {
            w.write_bit(bit);
        }
        for bit in crate::eg::write_ue(1) {
            w.write_bit(bit);
        }
        for bit in crate::eg::write_ue(0) {
            w.write_bit(bit); // delta_poc_s0_minus1 -> poc=-1
        }
        w.write_bit(true); // used_by_curr_pic_s0_flag
        for bit in crate::eg::write_ue(0) {
            w.write_bit(bit); // delta_poc_s1_minus1 -> poc=1
        }
        w.write_bit(true);
        let bytes = w.into_bytes();

        let mut r = BitReader::new(&bytes);
        let rps = ShortTermRps::parse(&mut r, 0, 1, &[]).unwrap();
        assert_eq!(rps.delta_poc, vec![-1, 1]);
        assert_eq!(rps.num_negative_pictures, 1);
        assert_eq!(rps.num_positive_pictures, 1);
    }
}
