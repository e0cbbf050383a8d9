//! Wires the HEVC building blocks (`bytescan`, `hevc::nal/vps/sps/pps/
//! slice/sei/au`, `paramstore`, `poc`) into the `Parser` trait (spec.md
//! §4.4, §9). Structurally parallel to `avc::parser::AvcParser`; the main
//! divergence is POC derivation, which follows §8.3.1's MSB/LSB rollover
//! instead of AVC's `pic_order_cnt_type` switch.

use crate::bitreader::BitReader;
use crate::config::{CodecConfig, ExternalTiming};
use crate::eg::read_ue;
use crate::hevc::au::{AccessUnit, AccessUnitBuilder, AccessUnitKind};
use crate::hevc::dsi::{build_hvcc, HevcDsiInput, NaluArray};
use crate::hevc::nal::{Nal, NalUnitType};
use crate::hevc::pps::Pps;
use crate::hevc::slice::SliceHeader;
use crate::hevc::sps::Sps;
use crate::hevc::vps::Vps;
use crate::bytescan::StartCodeScanner;
use crate::paramstore::{ParamStore, UpdateOutcome};
use crate::poc::PocReorderBuffer;
use crate::sample::{NalInfo, Sample, SampleFlags, SubSample};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Reads just enough of a slice segment header (`first_slice_segment_in_pic_
/// flag`, optional `no_output_of_prior_pics_flag`, `slice_pic_parameter_set_
/// id`) to resolve the active PPS/SPS before the full `SliceHeader::parse`
/// (which needs them) can run.
fn peek_pic_parameter_set_id(rbsp: &[u8], nal_type: NalUnitType) -> Result<u8> {
    let mut r = BitReader::new(rbsp);
    let _first_slice_segment_in_pic_flag = r.read_flag();
    if nal_type.is_irap() {
        let _no_output_of_prior_pics_flag = r.read_flag();
    }
    let id = read_ue(&mut r)?;
    if id > 63 {
        return Err(Error::SyntaxError("invalid slice_pic_parameter_set_id".into()));
    }
    Ok(id as u8)
}

/// Is this NAL type one of the "_N" (sub-layer non-reference) variants that
/// §8.3.1 excludes from updating `prevTid0Pic`?
fn is_sub_layer_non_reference(nal_type: NalUnitType) -> bool {
    matches!(
        nal_type,
        NalUnitType::TrailN
            | NalUnitType::TsaN
            | NalUnitType::StsaN
            | NalUnitType::RadlN
            | NalUnitType::RaslN
            | NalUnitType::RsvVclN10
            | NalUnitType::RsvVclN12
            | NalUnitType::RsvVclN14
    )
}

struct PendingAu {
    au: AccessUnit,
    decode_index: u64,
}

pub struct HevcParser {
    scanner: StartCodeScanner,
    au_builder: AccessUnitBuilder,
    vps_store: ParamStore<Vps>,
    sps_store: ParamStore<Sps>,
    pps_store: ParamStore<Pps>,
    config: CodecConfig,
    timing: ExternalTiming,
    poc_buffer: PocReorderBuffer,
    pending: HashMap<u64, PendingAu>,
    next_decode_index: u64,
    /// The decode-order tag of the next sample `drain_ready` is allowed to
    /// emit; see `avc::parser::AvcParser::next_doc_to_emit` for the ordering
    /// rationale (samples leave `output_queue` in decoding order, not
    /// presentation order).
    next_doc_to_emit: u64,
    output_queue: Vec<Sample>,
    pending_new_sd: bool,
    active_sps: Option<Arc<Sps>>,
    finished: bool,

    /// §8.3.1 `prevTid0Pic` POC MSB/LSB, updated after every reference
    /// picture at `TemporalId == 0`.
    prev_tid0_poc_msb: i64,
    prev_tid0_poc_lsb: u32,
    /// POC of the access unit currently being assembled; dependent slice
    /// segments don't re-derive it (they don't carry `pic_order_cnt_lsb`).
    current_au_poc: i64,

    /// Raw (2-byte-header-prefixed, ebsp-escaped) parameter-set NAL bytes,
    /// kept alongside the parsed structs purely so `get_cfg` has exact bytes
    /// to embed in the `hvcC` record.
    vps_raw: HashMap<u8, Vec<u8>>,
    sps_raw: HashMap<u8, Vec<u8>>,
    pps_raw: HashMap<u8, Vec<u8>>,

    /// Dolby-Vision enhancement-layer parameter sets (`nuh_layer_id != 0`
    /// VPS/SPS/PPS, SPEC_FULL.md §4.8), tracked independently of the base
    /// layer's stores so `get_enhancement_cfg` can build an `hvcE` record.
    el_vps_store: ParamStore<Vps>,
    el_sps_store: ParamStore<Sps>,
    el_pps_store: ParamStore<Pps>,
    el_vps_raw: HashMap<u8, Vec<u8>>,
    el_sps_raw: HashMap<u8, Vec<u8>>,
    el_pps_raw: HashMap<u8, Vec<u8>>,
    /// Set once any access unit has carried a Dolby-Vision RPU (NAL type
    /// 62) side-NAL.
    rpu_seen: bool,
    /// Set once any access unit has carried an enhancement-layer NAL
    /// (`nuh_layer_id != 0`).
    el_seen: bool,
}

impl HevcParser {
    pub fn new() -> Self {
        Self {
            scanner: StartCodeScanner::new(),
            au_builder: AccessUnitBuilder::new(),
            vps_store: ParamStore::new(),
            sps_store: ParamStore::new(),
            pps_store: ParamStore::new(),
            config: CodecConfig::default(),
            timing: ExternalTiming::default(),
            poc_buffer: PocReorderBuffer::new(1),
            pending: HashMap::new(),
            next_decode_index: 0,
            next_doc_to_emit: 0,
            output_queue: Vec::new(),
            pending_new_sd: false,
            active_sps: None,
            finished: false,
            prev_tid0_poc_msb: 0,
            prev_tid0_poc_lsb: 0,
            current_au_poc: 0,
            vps_raw: HashMap::new(),
            sps_raw: HashMap::new(),
            pps_raw: HashMap::new(),
            el_vps_store: ParamStore::new(),
            el_sps_store: ParamStore::new(),
            el_pps_store: ParamStore::new(),
            el_vps_raw: HashMap::new(),
            el_sps_raw: HashMap::new(),
            el_pps_raw: HashMap::new(),
            rpu_seen: false,
            el_seen: false,
        }
    }

    fn raw_nal_bytes(nal: &Nal) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + nal.ebsp.len());
        let byte0 = (nal.nal_type.as_u8() << 1) | (nal.nuh_layer_id >> 5);
        let byte1 = (nal.nuh_layer_id << 3) | nal.nuh_temporal_id_plus1;
        bytes.push(byte0);
        bytes.push(byte1);
        bytes.extend_from_slice(&nal.ebsp);
        bytes
    }

    fn handle_parameter_set_nal(&mut self, nal: &Nal) -> Result<()> {
        let raw_nal_bytes = Self::raw_nal_bytes(nal);

        match nal.nal_type {
            NalUnitType::Vps => {
                let rbsp = nal.to_rbsp();
                let vps = Vps::parse(&rbsp)?;
                let id = vps.vps_video_parameter_set_id;
                let outcome = self.vps_store.update(id, rbsp, vps, self.config.single_sd_policy)?;
                if outcome != UpdateOutcome::Unchanged {
                    self.vps_raw.insert(id, raw_nal_bytes);
                }
            }
            NalUnitType::Sps => {
                let rbsp = nal.to_rbsp();
                let sps = Sps::parse(&rbsp)?;
                let id = sps.sps_seq_parameter_set_id;
                let outcome = self.sps_store.update(id, rbsp, sps, self.config.single_sd_policy)?;
                if outcome != UpdateOutcome::Unchanged {
                    self.sps_raw.insert(id, raw_nal_bytes);
                }
                if outcome == UpdateOutcome::Replaced {
                    log::debug!("SPS id {id} collided with different bytes; cloning DSI (new sample description)");
                    self.pending_new_sd = true;
                    self.poc_buffer = PocReorderBuffer::new(
                        self.sps_store
                            .get(id)
                            .map(|s| s.short_term_ref_pic_sets.len().max(1))
                            .unwrap_or(1),
                    );
                }
            }
            NalUnitType::Pps => {
                let rbsp = nal.to_rbsp();
                let pps = Pps::parse(&rbsp)?;
                let id = pps.pps_pic_parameter_set_id;
                let outcome = self.pps_store.update(id, rbsp, pps, self.config.single_sd_policy)?;
                if outcome != UpdateOutcome::Unchanged {
                    self.pps_raw.insert(id, raw_nal_bytes);
                }
                if outcome == UpdateOutcome::Replaced {
                    log::debug!("PPS id {id} collided with different bytes; cloning DSI (new sample description)");
                    self.pending_new_sd = true;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Mirrors `handle_parameter_set_nal` for the Dolby-Vision
    /// enhancement-layer sub-bitstream (`nuh_layer_id != 0`): its VPS/SPS/
    /// PPS participate in their own, independent stores so `hvcE` can be
    /// built from exactly the EL's own parameter sets. A collision here
    /// never triggers `NEW_SAMPLE_DESCRIPTION` — that flag belongs to the
    /// base-layer track this sample description describes.
    fn handle_el_nal(&mut self, nal: &Nal) -> Result<()> {
        let raw_nal_bytes = Self::raw_nal_bytes(nal);
        match nal.nal_type {
            NalUnitType::Vps => {
                let rbsp = nal.to_rbsp();
                let vps = Vps::parse(&rbsp)?;
                let id = vps.vps_video_parameter_set_id;
                if self.el_vps_store.update(id, rbsp, vps, false)? != UpdateOutcome::Unchanged {
                    self.el_vps_raw.insert(id, raw_nal_bytes);
                }
            }
            NalUnitType::Sps => {
                let rbsp = nal.to_rbsp();
                let sps = Sps::parse(&rbsp)?;
                let id = sps.sps_seq_parameter_set_id;
                if self.el_sps_store.update(id, rbsp, sps, false)? != UpdateOutcome::Unchanged {
                    self.el_sps_raw.insert(id, raw_nal_bytes);
                }
            }
            NalUnitType::Pps => {
                let rbsp = nal.to_rbsp();
                let pps = Pps::parse(&rbsp)?;
                let id = pps.pps_pic_parameter_set_id;
                if self.el_pps_store.update(id, rbsp, pps, false)? != UpdateOutcome::Unchanged {
                    self.el_pps_raw.insert(id, raw_nal_bytes);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Derives the access unit's picture order count (§8.3.1) from the
    /// first slice segment's header, updating `prevTid0Pic` bookkeeping for
    /// every reference picture at `TemporalId == 0`.
    fn derive_poc(&mut self, header: &SliceHeader, nal: &Nal, sps: &Sps) -> i64 {
        let poc = if nal.nal_type.is_idr() {
            0
        } else {
            let max_lsb = sps.max_pic_order_cnt_lsb() as i64;
            let lsb = header.pic_order_cnt_lsb as i64;
            let prev_msb = self.prev_tid0_poc_msb;
            let prev_lsb = self.prev_tid0_poc_lsb as i64;

            let msb = if lsb < prev_lsb && (prev_lsb - lsb) >= max_lsb / 2 {
                prev_msb + max_lsb
            } else if lsb > prev_lsb && (lsb - prev_lsb) > max_lsb / 2 {
                prev_msb - max_lsb
            } else {
                prev_msb
            };
            msb + lsb
        };

        let is_reference =
            nal.is_vcl() && !nal.nal_type.is_rasl() && !is_sub_layer_non_reference(nal.nal_type);
        if nal.temporal_id() == 0 && is_reference {
            if nal.nal_type.is_idr() || nal.nal_type.is_bla() {
                self.prev_tid0_poc_msb = 0;
                self.prev_tid0_poc_lsb = 0;
            } else {
                self.prev_tid0_poc_msb = poc - header.pic_order_cnt_lsb as i64;
                self.prev_tid0_poc_lsb = header.pic_order_cnt_lsb;
            }
        }

        poc
    }

    fn finish_access_unit(&mut self, au: AccessUnit) -> Result<()> {
        let decode_index = self.next_decode_index;
        self.next_decode_index += 1;

        let poc = au.poc;
        let is_idr = matches!(au.kind, AccessUnitKind::Idr);
        let doc = self.poc_buffer.add(poc, is_idr);
        self.pending.insert(doc, PendingAu { au, decode_index });

        self.drain_ready();
        Ok(())
    }

    fn drain_ready(&mut self) {
        loop {
            let doc = self.next_doc_to_emit;
            let Some(output_index) = self.poc_buffer.output_index(doc) else { break };
            let Some(pending) = self.pending.remove(&doc) else { break };
            self.next_doc_to_emit += 1;
            let sample = self.build_sample(pending, output_index);
            self.output_queue.push(sample);
        }
    }

    /// `output_index` is the access unit's resolved presentation-order rank,
    /// already settled by the `PocReorderBuffer` before this is called (see
    /// `avc::parser::AvcParser::build_sample`, the same fix applied here).
    fn build_sample(&mut self, pending: PendingAu, output_index: u64) -> Sample {
        let au = pending.au;
        let sps = au.sps.clone();

        let (num_units_in_tick, time_scale) = self.effective_timing(sps.as_deref());
        let duration = num_units_in_tick.max(1);
        let _ = time_scale;

        let dts = pending.decode_index as i64 * duration as i64;
        let cts = output_index as i64 * duration as i64;

        let dependencies = au.classify_dependencies();
        let picture_type = au.picture_type();
        let frame_type = au.frame_type();

        let mut flags = SampleFlags::NONE;
        if au.is_keyframe() {
            flags |= SampleFlags::SYNC;
        }
        if self.pending_new_sd {
            flags |= SampleFlags::NEW_SAMPLE_DESCRIPTION;
            self.pending_new_sd = false;
        }

        let mut nal_list = Vec::with_capacity(au.nals.len());
        let mut total_size = 0u32;
        for nal in &au.nals {
            let bytes = Self::raw_nal_bytes(nal);
            let size = bytes.len() as u32;
            total_size += size;
            nal_list.push(NalInfo {
                es_file_offset: None,
                embedded: Some(bytes),
                size,
                start_code_size: nal.start_code_len,
            });
        }

        if sps.is_some() {
            self.active_sps = sps;
        }

        Sample {
            dts,
            cts,
            duration,
            size: total_size,
            flags,
            nal_list,
            dependencies,
            picture_type,
            frame_type,
        }
    }

    fn effective_timing(&self, sps: Option<&Sps>) -> (u32, u32) {
        if self.timing.override_flag {
            return (self.timing.num_units_in_tick.max(1), self.timing.time_scale.max(1));
        }
        if let Some(sps) = sps {
            if sps.vui.timing_info_present_flag {
                return (sps.vui.num_units_in_tick.max(1), sps.vui.time_scale.max(1));
            }
        }
        (1, 1)
    }
}

impl Default for HevcParser {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::parser::Parser for HevcParser {
    fn init(&mut self, config: CodecConfig, timing: ExternalTiming) -> Result<()> {
        self.config = config;
        self.timing = timing;
        Ok(())
    }

    fn feed(&mut self, data: &[u8]) -> Result<()> {
        self.scanner.push(data);
        loop {
            let Some(span) = self.scanner.next_nal_unit() else { break };
            let nal_data = self.scanner.get_nal_data(&span).to_vec();
            let consumed_to = span.data_end;
            let nal = Nal::parse(span.start_code_len, &nal_data)?;

            if nal.is_base_layer() {
                self.handle_parameter_set_nal(&nal)?;
                if nal.nal_type == NalUnitType::RpuNut {
                    self.rpu_seen = true;
                }
            } else {
                self.handle_el_nal(&nal)?;
                self.el_seen = true;
            }

            let mut slice_header = None;
            let mut sps = None;
            let mut pps = None;
            let mut poc = self.current_au_poc;

            if nal.is_base_layer() && nal.is_vcl() {
                let rbsp = nal.to_rbsp();
                let pps_id = peek_pic_parameter_set_id(&rbsp, nal.nal_type)?;

                let pps_ref = self.pps_store.get(pps_id).cloned().ok_or(Error::NoConfig)?;
                let sps_ref = self
                    .sps_store
                    .get(pps_ref.pps_seq_parameter_set_id)
                    .cloned()
                    .ok_or(Error::NoConfig)?;

                let header = SliceHeader::parse(&rbsp, nal.nal_type, &sps_ref, &pps_ref)?;
                if header.first_slice_segment_in_pic_flag {
                    poc = self.derive_poc(&header, &nal, &sps_ref);
                    self.current_au_poc = poc;
                }

                self.poc_buffer
                    .set_ref_au_max(sps_ref.short_term_ref_pic_sets.len().max(1));

                slice_header = Some(header);
                sps = Some(sps_ref);
                pps = Some(pps_ref);
            }

            if let Some(completed) =
                self.au_builder.add_nal(nal, slice_header.as_ref(), sps, pps, poc)
            {
                self.finish_access_unit(completed)?;
            }

            self.scanner.consume_processed(consumed_to);
        }
        Ok(())
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.scanner.finish();
        let _ = self.feed(&[]);
        if let Some(au) = self.au_builder.flush_pending() {
            let _ = self.finish_access_unit(au);
        }
        self.poc_buffer.flush();
        self.drain_ready();
    }

    fn get_sample(&mut self) -> Result<Option<Sample>> {
        if self.output_queue.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.output_queue.remove(0)))
    }

    fn get_subsample(&self, sample: &Sample, index: usize) -> Option<SubSample> {
        let mut offset = 0u32;
        for (i, nal) in sample.nal_list.iter().enumerate() {
            if i == index {
                return Some(SubSample { offset_in_sample: offset, size: nal.size });
            }
            offset += nal.size;
        }
        None
    }

    fn get_cfg(&self) -> Option<Vec<u8>> {
        let sps = self.active_sps.as_ref().or_else(|| self.sps_store.iter_in_insertion_order().next().map(|(_, s)| s))?;

        let vps_nalus: Vec<Vec<u8>> = self
            .vps_store
            .iter_in_insertion_order()
            .filter_map(|(id, _)| self.vps_raw.get(&id).cloned())
            .collect();
        let sps_nalus: Vec<Vec<u8>> = self
            .sps_store
            .iter_in_insertion_order()
            .filter_map(|(id, _)| self.sps_raw.get(&id).cloned())
            .collect();
        let pps_nalus: Vec<Vec<u8>> = self
            .pps_store
            .iter_in_insertion_order()
            .filter_map(|(id, _)| self.pps_raw.get(&id).cloned())
            .collect();

        let arrays = [
            NaluArray { nal_unit_type: 32, array_completeness: true, nalus: &vps_nalus },
            NaluArray { nal_unit_type: 33, array_completeness: true, nalus: &sps_nalus },
            NaluArray { nal_unit_type: 34, array_completeness: true, nalus: &pps_nalus },
        ];

        let input = HevcDsiInput {
            ptl: &sps.ptl,
            general_constraint_indicator_flags: 0,
            chroma_format_idc: sps.chroma_format_idc,
            bit_depth_luma_minus8: sps.bit_depth_luma_minus8,
            bit_depth_chroma_minus8: sps.bit_depth_chroma_minus8,
            min_spatial_segmentation_idc: sps.vui.min_spatial_segmentation_idc as u16,
            parallelism_type: 0,
            avg_frame_rate: 0,
            constant_frame_rate: 0,
            num_temporal_layers: sps.sps_max_sub_layers_minus1 + 1,
            temporal_id_nested: sps.sps_temporal_id_nesting_flag,
            arrays: &arrays,
        };
        Some(build_hvcc(&input))
    }

    fn get_param(&self, name: &str) -> Option<String> {
        let sps = self.active_sps.as_ref()?;
        match name {
            "width" => Some(sps.width.to_string()),
            "height" => Some(sps.height.to_string()),
            "profile_idc" => Some(sps.ptl.general_profile_idc.to_string()),
            "level_idc" => Some(sps.ptl.general_level_idc.to_string()),
            _ => None,
        }
    }

    fn get_enhancement_cfg(&self) -> Option<Vec<u8>> {
        let sps = self.el_sps_store.iter_in_insertion_order().next().map(|(_, s)| s)?;

        let vps_nalus: Vec<Vec<u8>> = self
            .el_vps_store
            .iter_in_insertion_order()
            .filter_map(|(id, _)| self.el_vps_raw.get(&id).cloned())
            .collect();
        let sps_nalus: Vec<Vec<u8>> = self
            .el_sps_store
            .iter_in_insertion_order()
            .filter_map(|(id, _)| self.el_sps_raw.get(&id).cloned())
            .collect();
        let pps_nalus: Vec<Vec<u8>> = self
            .el_pps_store
            .iter_in_insertion_order()
            .filter_map(|(id, _)| self.el_pps_raw.get(&id).cloned())
            .collect();

        let arrays = [
            NaluArray { nal_unit_type: 32, array_completeness: true, nalus: &vps_nalus },
            NaluArray { nal_unit_type: 33, array_completeness: true, nalus: &sps_nalus },
            NaluArray { nal_unit_type: 34, array_completeness: true, nalus: &pps_nalus },
        ];

        let input = HevcDsiInput {
            ptl: &sps.ptl,
            general_constraint_indicator_flags: 0,
            chroma_format_idc: sps.chroma_format_idc,
            bit_depth_luma_minus8: sps.bit_depth_luma_minus8,
            bit_depth_chroma_minus8: sps.bit_depth_chroma_minus8,
            min_spatial_segmentation_idc: sps.vui.min_spatial_segmentation_idc as u16,
            parallelism_type: 0,
            avg_frame_rate: 0,
            constant_frame_rate: 0,
            num_temporal_layers: sps.sps_max_sub_layers_minus1 + 1,
            temporal_id_nested: sps.sps_temporal_id_nesting_flag,
            arrays: &arrays,
        };
        Some(build_hvcc(&input))
    }

    fn get_dolby_vision_cfg(&self) -> Option<Vec<u8>> {
        if !self.rpu_seen {
            return None;
        }
        let profile = self.timing.dv_profile?;
        let sps = self.active_sps.as_ref()?;

        let layers = if self.el_seen {
            crate::dsi::dolby_vision::DvLayers::BlElRpu
        } else if profile == 5 || profile == 8 {
            crate::dsi::dolby_vision::DvLayers::BlRpu
        } else {
            crate::dsi::dolby_vision::DvLayers::ElRpu
        };

        let bl_signal_compatibility_id = match profile {
            2 | 4 => Some(2),
            6 => Some(1),
            7 => Some(6),
            8 => self.timing.dv_bl_compat_id,
            _ => None,
        };

        let (num_units_in_tick, time_scale) = self.effective_timing(Some(sps.as_ref()));
        let framerate = (time_scale / num_units_in_tick.max(1)).max(1);
        let rpu_only_derate = !self.el_seen && profile != 5 && profile != 8;
        let level = crate::dsi::dolby_vision::derive_dv_level(
            sps.width,
            sps.height,
            framerate,
            rpu_only_derate,
        );

        let input = crate::dsi::dolby_vision::DvRecordInput {
            profile,
            level,
            layers,
            bl_signal_compatibility_id,
        };
        Some(crate::dsi::dolby_vision::build_dvcc(&input).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser as _;

    fn minimal_vps_bytes() -> Vec<u8> {
        use crate::bitreader::BitWriter;
        let mut w = BitWriter::new();
        w.write_bits(4, 0); // vps_video_parameter_set_id
        w.write_bits(2, 0b11); // base_layer_internal/available
        w.write_bits(6, 0); // vps_max_layers_minus1
        w.write_bits(3, 0); // vps_max_sub_layers_minus1
        w.write_bit(true); // vps_temporal_id_nesting_flag
        w.write_bits(16, 0xffff); // vps_reserved_0xffff_16bits
        // profile_tier_level general section (12 bytes) + level_idc already included
        w.write_bits(2, 0); // general_profile_space
        w.write_bit(false); // general_tier_flag
        w.write_bits(5, 1); // general_profile_idc
        w.write_bits(32, 0); // compatibility flags
        w.write_bit(true); // progressive_source
        w.write_bit(false); // interlaced_source
        w.write_bit(true); // non_packed_constraint
        w.write_bit(true); // frame_only_constraint
        w.write_bits(16, 0);
        w.write_bits(16, 0);
        w.write_bits(12, 0);
        w.write_u8(93); // general_level_idc
        w.write_bit(true); // vps_sub_layer_ordering_info_present_flag
        for bit in crate::eg::write_ue(0) {
            w.write_bit(bit);
        }
        for bit in crate::eg::write_ue(0) {
            w.write_bit(bit);
        }
        for bit in crate::eg::write_ue(0) {
            w.write_bit(bit);
        }
        w.write_bit(true); // padding
        w.into_bytes()
    }

    fn sample_stream() -> Vec<u8> {
        let mut data = Vec::new();
        let vps = minimal_vps_bytes();
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, (32u8 << 1), 1]);
        data.extend_from_slice(&vps);

        let sps = crate::hevc::sps::tests_support::minimal_1080p_sps_bytes();
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, (33u8 << 1), 1]);
        data.extend_from_slice(&sps);

        let pps = crate::hevc::pps::tests_support::minimal_pps_bytes();
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, (34u8 << 1), 1]);
        data.extend_from_slice(&pps);

        // IDR slice: first_slice_segment_in_pic_flag=1, no_output_of_prior_
        // pics_flag=0, slice_pic_parameter_set_id=0(ue); trailing padding
        // covers the remaining slice-header reads.
        data.extend_from_slice(&[
            0x00, 0x00, 0x00, 0x01, (19u8 << 1), 1, 0b1_0_1_0_0000, 0xff, 0xff, 0xff, 0xff, 0xff,
            0xff, 0xff,
        ]);
        data
    }

    #[test]
    fn parses_idr_to_a_sync_sample() {
        let mut parser = HevcParser::new();
        crate::parser::Parser::init(&mut parser, CodecConfig::default(), ExternalTiming::default()).unwrap();
        parser.feed(&sample_stream()).unwrap();
        parser.finish();

        let sample = parser.get_sample().unwrap();
        assert!(sample.is_some());
        let sample = sample.unwrap();
        assert!(sample.flags.contains(SampleFlags::SYNC));
        assert!(!sample.nal_list.is_empty());
    }

    #[test]
    fn missing_sps_is_no_config() {
        let mut parser = HevcParser::new();
        crate::parser::Parser::init(&mut parser, CodecConfig::default(), ExternalTiming::default()).unwrap();
        let slice_then_aud = vec![
            0x00, 0x00, 0x00, 0x01, (19u8 << 1), 1, 0b1_0_1_0_0000, 0x00, 0x00, 0x00, 0x00, 0x01,
            (35u8 << 1), 1,
        ];
        let err = parser.feed(&slice_then_aud).unwrap_err();
        assert_eq!(err, Error::NoConfig);
    }

    #[test]
    fn dolby_vision_cfg_emitted_after_rpu_with_profile() {
        let mut parser = HevcParser::new();
        let timing = ExternalTiming { dv_profile: Some(8), ..ExternalTiming::default() };
        crate::parser::Parser::init(&mut parser, CodecConfig::default(), timing).unwrap();

        let mut data = sample_stream();
        // RPU NAL (type 62, base layer) attaches to the still-open AU.
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, (62u8 << 1), 1, 0xaa, 0xbb]);
        parser.feed(&data).unwrap();
        parser.finish();

        let sample = parser.get_sample().unwrap().unwrap();
        assert!(sample.nal_list.iter().any(|n| n.size >= 2));

        assert!(parser.get_enhancement_cfg().is_none());
        let dvcc = parser.get_dolby_vision_cfg().expect("dv_profile set and RPU observed");
        assert_eq!(dvcc.len(), 24);
        assert_eq!(dvcc[0], 1);
        assert_eq!(dvcc[2], 8 << 1);
        assert_eq!(dvcc[3] & 0b111, 0b101); // BL+RPU, no EL observed
    }

    #[test]
    fn no_dolby_vision_cfg_without_rpu() {
        let mut parser = HevcParser::new();
        crate::parser::Parser::init(&mut parser, CodecConfig::default(), ExternalTiming::default()).unwrap();
        parser.feed(&sample_stream()).unwrap();
        parser.finish();
        assert!(parser.get_dolby_vision_cfg().is_none());
    }
}
