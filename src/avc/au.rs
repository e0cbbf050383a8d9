//! Access-unit assembly (spec.md §4.3.2 boundary detection, §4.3.5 sample
//! dependency classification).

use crate::avc::nal::{Nal, NalUnitType};
use crate::avc::pps::Pps;
use crate::avc::sei::{SeiMessage, SeiPayload};
use crate::avc::slice::{PictureId, SliceHeader, SliceType};
use crate::avc::sps::Sps;
use crate::sample::{Dependencies, FrameType, PictureType};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessUnitKind {
    Idr,
    RecoveryPoint(u32),
    NonIdr,
}

#[derive(Debug, Clone)]
pub struct AccessUnit {
    pub nals: Vec<Nal>,
    pub kind: AccessUnitKind,
    pub sps: Option<Arc<Sps>>,
    pub pps: Option<Arc<Pps>>,
    pub picture_id: Option<PictureId>,
    pub slice_type: Option<SliceType>,
    pub max_ref_idc: u8,
}

impl AccessUnit {
    pub fn new() -> Self {
        Self {
            nals: Vec::new(),
            kind: AccessUnitKind::NonIdr,
            sps: None,
            pps: None,
            picture_id: None,
            slice_type: None,
            max_ref_idc: 0,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(self.kind, AccessUnitKind::Idr)
            || matches!(self.kind, AccessUnitKind::RecoveryPoint(0))
    }

    pub fn nals(&self) -> impl Iterator<Item = &Nal> {
        self.nals.iter()
    }

    pub fn to_annexb_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        for nal in &self.nals {
            let start_code = if nal.start_code_len == 4 {
                &[0x00, 0x00, 0x00, 0x01][..]
            } else {
                &[0x00, 0x00, 0x01][..]
            };

            bytes.extend_from_slice(start_code);

            let header = ((nal.ref_idc & 0b11) << 5) | (nal.nal_type.as_u8() & 0b11111);
            bytes.push(header);
            bytes.extend_from_slice(&nal.ebsp);
        }

        bytes
    }

    pub fn add_nal(&mut self, nal: Nal) {
        if nal.nal_type == NalUnitType::IdrSlice {
            self.kind = AccessUnitKind::Idr;
        }
        if nal.is_vcl() {
            self.max_ref_idc = self.max_ref_idc.max(nal.ref_idc);
        }
        self.nals.push(nal);
    }

    pub fn set_sps(&mut self, sps: Arc<Sps>) {
        self.sps = Some(sps);
    }

    pub fn set_pps(&mut self, pps: Arc<Pps>) {
        self.pps = Some(pps);
    }

    pub fn check_recovery_point(&mut self) {
        if matches!(self.kind, AccessUnitKind::Idr) {
            return;
        }
        for nal in &self.nals {
            if nal.nal_type == NalUnitType::Sei {
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

    pub fn set_picture_id_from_slice(&mut self, slice_header: &SliceHeader, nal_type: NalUnitType, sps: &Sps) {
        self.slice_type = Some(slice_header.slice_type);
        self.picture_id = Some(PictureId::from_slice_header(slice_header, nal_type, sps));
    }

    /// spec.md §4.3.5: classification feeds `sample_depends_on` /
    /// `sample_is_depended_on` / `sample_has_redundancy`.
    pub fn classify_dependencies(&self) -> Dependencies {
        let has_redundant = self.nals.iter().any(|n| {
            matches!(
                n.nal_type,
                NalUnitType::DataPartitionB | NalUnitType::DataPartitionC
            )
        });

        // 1 = does not depend on others (I slice AUs), 2 = depends on
        // others. `sample_depends_on` uses the ISO/IEC 14496-12 vocabulary
        // where 1 means "I picture", 2 means "not I picture".
        let depends_on = match self.slice_type {
            Some(t) if t.is_intra_only() => 1,
            Some(_) => 2,
            None => 0,
        };

        // 2 = other samples may depend on this one (ref_idc > 0), 1 = none do.
        let is_depended_on = if self.max_ref_idc > 0 { 2 } else { 1 };

        Dependencies {
            sample_depends_on: depends_on,
            sample_is_depended_on: is_depended_on,
            sample_has_redundancy: has_redundant as u8,
        }
    }

    pub fn picture_type(&self) -> PictureType {
        match (self.kind.clone(), self.slice_type) {
            (AccessUnitKind::Idr, _) => {
                if self.nals.iter().any(|n| {
                    n.is_vcl() && n.nal_type != NalUnitType::IdrSlice
                }) {
                    PictureType::IdrWithLeading
                } else {
                    PictureType::IdrNoLeading
                }
            }
            (_, Some(t)) if t.is_intra_only() => PictureType::IOnly,
            _ => PictureType::Other,
        }
    }

    pub fn frame_type(&self) -> FrameType {
        match self.slice_type {
            Some(SliceType::I) | Some(SliceType::Si) => FrameType::I,
            Some(SliceType::P) | Some(SliceType::Sp) => FrameType::P,
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

pub struct AccessUnitBuilder {
    current_au: Option<AccessUnit>,
    current_picture_id: Option<PictureId>,
    /// AUD/SPS/PPS/SEI NALs seen since the last VCL NAL: subclause 7.4.1.2.4
    /// allows these to precede a primary coded picture, and they belong to
    /// the access unit that picture starts, not the one before it. They're
    /// held here until the next VCL NAL arrives and we know which AU that is.
    pending_prefix: Vec<Nal>,
    /// Set when an AUD NAL lands in `pending_prefix`: an AUD always starts a
    /// new access unit regardless of picture-id continuity.
    aud_seen: bool,
}

impl AccessUnitBuilder {
    pub fn new() -> Self {
        Self {
            current_au: None,
            current_picture_id: None,
            pending_prefix: Vec::new(),
            aud_seen: false,
        }
    }

    pub fn is_au_boundary(&self, nal: &Nal, slice_header: Option<&SliceHeader>, sps: Option<&Sps>) -> bool {
        if self.aud_seen {
            return true;
        }

        if !nal.is_vcl() {
            return false;
        }

        if self.current_picture_id.is_none() {
            return true;
        }

        if let (Some(header), Some(sps)) = (slice_header, sps) {
            let new_picture_id = PictureId::from_slice_header(header, nal.nal_type, sps);

            if let Some(ref current_id) = self.current_picture_id {
                return current_id.starts_new_access_unit(&new_picture_id);
            }
        }

        false
    }

    pub fn add_nal(
        &mut self,
        nal: Nal,
        slice_header: Option<SliceHeader>,
        sps: Option<Arc<Sps>>,
        pps: Option<Arc<Pps>>,
    ) -> Option<AccessUnit> {
        if !nal.is_vcl() {
            if nal.nal_type == NalUnitType::Aud {
                self.aud_seen = true;
            }
            self.pending_prefix.push(nal);
            return None;
        }

        let is_boundary = match (&slice_header, &sps) {
            (Some(header), Some(sps_ref)) => self.is_au_boundary(&nal, Some(header), Some(sps_ref)),
            _ => self.is_au_boundary(&nal, None, None),
        };

        let mut completed_au = None;

        if is_boundary && self.current_au.is_some() {
            if let Some(mut au) = self.current_au.take() {
                au.check_recovery_point();
                completed_au = Some(au);
            }
            self.current_picture_id = None;
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
                au.set_sps(sps);
            }

            if let Some(pps) = pps {
                au.set_pps(pps);
            }

            if let (Some(header), Some(sps_ref)) = (slice_header.as_ref(), au.sps.clone()) {
                let picture_id = PictureId::from_slice_header(header, nal.nal_type, &sps_ref);
                self.current_picture_id = Some(picture_id.clone());
                au.set_picture_id_from_slice(header, nal.nal_type, &sps_ref);
                au.picture_id = Some(picture_id);
            }

            au.add_nal(nal);
        }

        completed_au
    }

    /// Flushes whatever is buffered at end-of-stream: any in-progress AU,
    /// plus a trailing prefix (e.g. SEI with no following picture) folded
    /// into it, or promoted to its own AU if none is in progress.
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
            self.current_picture_id = None;
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
