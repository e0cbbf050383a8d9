//! HEVC access-unit assembly. Boundary detection is considerably simpler
//! than AVc's: `first_slice_segment_in_pic_flag` already tells a conformant
//! bitstream's first slice segment of every picture, so there's no need for
//! the AVC `PictureId` field-by-field comparison (§7.4.2 vs. AVC's
//! §7.4.1.2.4).

use crate::hevc::nal::{Nal, NalUnitType};
use crate::hevc::pps::Pps;
use crate::hevc::sei::{SeiMessage, SeiPayload};
use crate::hevc::slice::{SliceHeader, SliceType};
use crate::hevc::sps::Sps;
use crate::sample::{Dependencies, FrameType, PictureType};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessUnitKind {
    Idr,
    Bla,
    Cra,
    RecoveryPoint(u32),
    Trail,
}

#[derive(Debug, Clone)]
pub struct AccessUnit {
    pub nals: Vec<Nal>,
    pub kind: AccessUnitKind,
    pub sps: Option<Arc<Sps>>,
    pub pps: Option<Arc<Pps>>,
    pub slice_type: Option<SliceType>,
    pub poc: i64,
    pub has_ref_vcl: bool,
    /// Carries any Dolby-Vision RPU (NAL type 62) payload found alongside
    /// the base layer, kept raw (SPEC_FULL.md §4.8); the enhancement layer
    /// itself (`nuh_layer_id != 0`) is collected separately in `el_nals`.
    pub rpu: Option<Vec<u8>>,
    pub el_nals: Vec<Nal>,
}

impl AccessUnit {
    pub fn new() -> Self {
        Self {
            nals: Vec::new(),
            kind: AccessUnitKind::Trail,
            sps: None,
            pps: None,
            slice_type: None,
            poc: 0,
            has_ref_vcl: false,
            rpu: None,
            el_nals: Vec::new(),
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(
            self.kind,
            AccessUnitKind::Idr | AccessUnitKind::Bla | AccessUnitKind::Cra
        )
    }

    pub fn add_nal(&mut self, nal: Nal) {
        // RPU (62) and enhancement-layer (nuh_layer_id != 0) NALs are
        // preserved verbatim in the emitted bitstream (spec.md §4.4) in
        // addition to being stashed in their own sidecar fields so the DSI
        // builders can find them without re-scanning `nals`.
        if !nal.is_base_layer() {
            self.el_nals.push(nal.clone());
            self.nals.push(nal);
            return;
        }
        if nal.nal_type == NalUnitType::RpuNut {
            self.rpu = Some(nal.to_rbsp());
            self.nals.push(nal);
            return;
        }
        if nal.is_vcl() {
            if nal.nal_type.is_idr() {
                self.kind = AccessUnitKind::Idr;
            } else if nal.nal_type.is_bla() {
                self.kind = AccessUnitKind::Bla;
            } else if nal.nal_type == NalUnitType::CraNut {
                self.kind = AccessUnitKind::Cra;
            }
            if !matches!(
                nal.nal_type,
                NalUnitType::TrailN
                    | NalUnitType::TsaN
                    | NalUnitType::StsaN
                    | NalUnitType::RadlN
                    | NalUnitType::RaslN
                    | NalUnitType::RsvVclN10
                    | NalUnitType::RsvVclN12
                    | NalUnitType::RsvVclN14
            ) {
                self.has_ref_vcl = true;
            }
        }
        self.nals.push(nal);
    }

    pub fn to_annexb_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for nal in &self.nals {
            write_nal(&mut bytes, nal);
        }
        bytes
    }

    pub fn check_recovery_point(&mut self) {
        if self.is_keyframe() {
            return;
        }
        for nal in &self.nals {
            if matches!(nal.nal_type, NalUnitType::PrefixSei | NalUnitType::SuffixSei) {
                let rbsp = nal.to_rbsp();
                if let Ok(messages) = SeiMessage::parse(&rbsp) {
                    for msg in messages {
                        if let SeiPayload::RecoveryPoint { recovery_frame_cnt, .. } = msg.payload {
                            self.kind = AccessUnitKind::RecoveryPoint(recovery_frame_cnt);
                        }
                    }
                }
            }
        }
    }

    pub fn classify_dependencies(&self) -> Dependencies {
        let depends_on = match self.slice_type {
            Some(t) if t.is_intra_only() => 1,
            Some(_) => 2,
            None => 0,
        };
        let is_depended_on = if self.has_ref_vcl { 2 } else { 1 };
        Dependencies {
            sample_depends_on: depends_on,
            sample_is_depended_on: is_depended_on,
            sample_has_redundancy: 0,
        }
    }

    pub fn picture_type(&self) -> PictureType {
        match self.kind {
            AccessUnitKind::Idr => PictureType::IdrNoLeading,
            AccessUnitKind::Bla | AccessUnitKind::Cra => {
                if self.nals.iter().any(|n| n.nal_type.is_rasl()) {
                    PictureType::IdrWithLeading
                } else {
                    PictureType::IOnly
                }
            }
            _ if matches!(self.slice_type, Some(t) if t.is_intra_only()) => PictureType::IOnly,
            _ => PictureType::Other,
        }
    }

    pub fn frame_type(&self) -> FrameType {
        match self.slice_type {
            Some(SliceType::I) => FrameType::I,
            Some(SliceType::P) => FrameType::P,
            Some(SliceType::B) => FrameType::B,
            None => FrameType::I,
        }
    }
}

impl Default for AccessUnit {
    fn default() -> Self {
        Self::new()
    }
}

fn write_nal(bytes: &mut Vec<u8>, nal: &Nal) {
    let start_code = if nal.start_code_len == 4 {
        &[0x00, 0x00, 0x00, 0x01][..]
    } else {
        &[0x00, 0x00, 0x01][..]
    };
    bytes.extend_from_slice(start_code);
    let byte0 = (nal.nal_type.as_u8() << 1) | (nal.nuh_layer_id >> 5);
    let byte1 = (nal.nuh_layer_id << 3) | nal.nuh_temporal_id_plus1;
    bytes.push(byte0);
    bytes.push(byte1);
    bytes.extend_from_slice(&nal.ebsp);
}

pub struct AccessUnitBuilder {
    current_au: Option<AccessUnit>,
    pending_prefix: Vec<Nal>,
    aud_seen: bool,
}

impl AccessUnitBuilder {
    pub fn new() -> Self {
        Self {
            current_au: None,
            pending_prefix: Vec::new(),
            aud_seen: false,
        }
    }

    pub fn add_nal(
        &mut self,
        nal: Nal,
        slice_header: Option<&SliceHeader>,
        sps: Option<Arc<Sps>>,
        pps: Option<Arc<Pps>>,
        poc: i64,
    ) -> Option<AccessUnit> {
        if !nal.is_vcl() && nal.is_base_layer() {
            if nal.nal_type == NalUnitType::Aud {
                self.aud_seen = true;
            }
            self.pending_prefix.push(nal);
            return None;
        }

        if !nal.is_base_layer() || nal.nal_type == NalUnitType::RpuNut {
            if let Some(ref mut au) = self.current_au {
                au.add_nal(nal);
            } else {
                self.pending_prefix.push(nal);
            }
            return None;
        }

        let is_boundary = self.aud_seen
            || self.current_au.is_none()
            || slice_header.map(|h| h.first_slice_segment_in_pic_flag).unwrap_or(true);

        let mut completed_au = None;
        if is_boundary && self.current_au.is_some() {
            if let Some(mut au) = self.current_au.take() {
                au.check_recovery_point();
                completed_au = Some(au);
            }
        }

        if self.current_au.is_none() {
            self.current_au = Some(AccessUnit::new());
        }

        self.aud_seen = false;
        let prefix = std::mem::take(&mut self.pending_prefix);

        if let Some(ref mut au) = self.current_au {
            for prefix_nal in prefix {
                au.add_nal(prefix_nal);
            }
            if let Some(sps) = sps {
                au.sps = Some(sps);
            }
            if let Some(pps) = pps {
                au.pps = Some(pps);
            }
            if let Some(header) = slice_header {
                au.slice_type = Some(header.slice_type);
            }
            au.poc = poc;
            au.add_nal(nal);
        }

        completed_au
    }

    pub fn flush_pending(&mut self) -> Option<AccessUnit> {
        let prefix = std::mem::take(&mut self.pending_prefix);
        self.aud_seen = false;

        if let Some(ref mut au) = self.current_au {
            for prefix_nal in prefix {
                au.add_nal(prefix_nal);
            }
        } else if !prefix.is_empty() {
            let mut au = AccessUnit::new();
            for prefix_nal in prefix {
                au.add_nal(prefix_nal);
            }
            self.current_au = Some(au);
        }

        if let Some(mut au) = self.current_au.take() {
            au.check_recovery_point();
            Some(au)
        } else {
            None
        }
    }
}

impl Default for AccessUnitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nal(nal_type: NalUnitType) -> Nal {
        Nal {
            start_code_len: 4,
            nal_type,
            nuh_layer_id: 0,
            nuh_temporal_id_plus1: 1,
            ebsp: Vec::new(),
        }
    }

    #[test]
    fn idr_nal_marks_keyframe() {
        let mut au = AccessUnit::new();
        au.add_nal(nal(NalUnitType::IdrWRadl));
        assert!(au.is_keyframe());
        assert_eq!(au.kind, AccessUnitKind::Idr);
    }

    #[test]
    fn enhancement_layer_nal_is_sidecar_not_primary() {
        let mut builder = AccessUnitBuilder::new();
        let mut el = nal(NalUnitType::TrailR);
        el.nuh_layer_id = 1;
        assert!(builder.add_nal(el, None, None, None, 0).is_none());
        assert!(builder.pending_prefix.is_empty() || builder.current_au.is_none());
    }
}
