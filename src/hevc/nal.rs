//! HEVC NAL unit header (Rec. ITU-T H.265 §7.3.1.2): two bytes, wider than
//! AVC's one-byte header to carry `nuh_layer_id` for scalable/multiview/3D
//! extensions and Dolby-Vision enhancement layers.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    TrailN,
    TrailR,
    TsaN,
    TsaR,
    StsaN,
    StsaR,
    RadlN,
    RadlR,
    RaslN,
    RaslR,
    RsvVclN10,
    RsvVclR11,
    RsvVclN12,
    RsvVclR13,
    RsvVclN14,
    RsvVclR15,
    BlaWLp,
    BlaWRadl,
    BlaNLp,
    IdrWRadl,
    IdrNLp,
    CraNut,
    RsvIrapVcl22,
    RsvIrapVcl23,
    Vps,
    Sps,
    Pps,
    Aud,
    Eos,
    Eob,
    FillerData,
    PrefixSei,
    SuffixSei,
    /// NAL type 62: Dolby-Vision RPU, carried as a side NAL alongside the
    /// base-layer bitstream (SPEC_FULL.md §4.8).
    RpuNut,
    /// NAL type 63: Dolby-Vision enhancement-layer container.
    UnspecifiedExt62Plus(u8),
    Reserved(u8),
    Unspecified(u8),
}

impl NalUnitType {
    pub fn as_u8(self) -> u8 {
        match self {
            NalUnitType::TrailN => 0,
            NalUnitType::TrailR => 1,
            NalUnitType::TsaN => 2,
            NalUnitType::TsaR => 3,
            NalUnitType::StsaN => 4,
            NalUnitType::StsaR => 5,
            NalUnitType::RadlN => 6,
            NalUnitType::RadlR => 7,
            NalUnitType::RaslN => 8,
            NalUnitType::RaslR => 9,
            NalUnitType::RsvVclN10 => 10,
            NalUnitType::RsvVclR11 => 11,
            NalUnitType::RsvVclN12 => 12,
            NalUnitType::RsvVclR13 => 13,
            NalUnitType::RsvVclN14 => 14,
            NalUnitType::RsvVclR15 => 15,
            NalUnitType::BlaWLp => 16,
            NalUnitType::BlaWRadl => 17,
            NalUnitType::BlaNLp => 18,
            NalUnitType::IdrWRadl => 19,
            NalUnitType::IdrNLp => 20,
            NalUnitType::CraNut => 21,
            NalUnitType::RsvIrapVcl22 => 22,
            NalUnitType::RsvIrapVcl23 => 23,
            NalUnitType::Vps => 32,
            NalUnitType::Sps => 33,
            NalUnitType::Pps => 34,
            NalUnitType::Aud => 35,
            NalUnitType::Eos => 36,
            NalUnitType::Eob => 37,
            NalUnitType::FillerData => 38,
            NalUnitType::PrefixSei => 39,
            NalUnitType::SuffixSei => 40,
            NalUnitType::RpuNut => 62,
            NalUnitType::UnspecifiedExt62Plus(v) => v,
            NalUnitType::Reserved(v) => v,
            NalUnitType::Unspecified(v) => v,
        }
    }

    pub fn is_vcl(self) -> bool {
        self.as_u8() <= 31
    }

    pub fn is_irap(self) -> bool {
        matches!(self.as_u8(), 16..=23)
    }

    pub fn is_idr(self) -> bool {
        matches!(self, NalUnitType::IdrWRadl | NalUnitType::IdrNLp)
    }

    pub fn is_bla(self) -> bool {
        matches!(
            self,
            NalUnitType::BlaWLp | NalUnitType::BlaWRadl | NalUnitType::BlaNLp
        )
    }

    /// RASL pictures associated with a BLA/CRA access unit are not decodable
    /// and are dropped by a conformant decoder (§8.1.3); feeds the AU leading
    /// -picture classification analogous to AVC's IDR-with-leading.
    pub fn is_rasl(self) -> bool {
        matches!(self, NalUnitType::RaslN | NalUnitType::RaslR)
    }
}

impl From<u8> for NalUnitType {
    fn from(v: u8) -> Self {
        match v {
            0 => NalUnitType::TrailN,
            1 => NalUnitType::TrailR,
            2 => NalUnitType::TsaN,
            3 => NalUnitType::TsaR,
            4 => NalUnitType::StsaN,
            5 => NalUnitType::StsaR,
            6 => NalUnitType::RadlN,
            7 => NalUnitType::RadlR,
            8 => NalUnitType::RaslN,
            9 => NalUnitType::RaslR,
            10 => NalUnitType::RsvVclN10,
            11 => NalUnitType::RsvVclR11,
            12 => NalUnitType::RsvVclN12,
            13 => NalUnitType::RsvVclR13,
            14 => NalUnitType::RsvVclN14,
            15 => NalUnitType::RsvVclR15,
            16 => NalUnitType::BlaWLp,
            17 => NalUnitType::BlaWRadl,
            18 => NalUnitType::BlaNLp,
            19 => NalUnitType::IdrWRadl,
            20 => NalUnitType::IdrNLp,
            21 => NalUnitType::CraNut,
            22 => NalUnitType::RsvIrapVcl22,
            23 => NalUnitType::RsvIrapVcl23,
            32 => NalUnitType::Vps,
            33 => NalUnitType::Sps,
            34 => NalUnitType::Pps,
            35 => NalUnitType::Aud,
            36 => NalUnitType::Eos,
            37 => NalUnitType::Eob,
            38 => NalUnitType::FillerData,
            39 => NalUnitType::PrefixSei,
            40 => NalUnitType::SuffixSei,
            62 => NalUnitType::RpuNut,
            63 => NalUnitType::UnspecifiedExt62Plus(63),
            24..=31 | 41..=47 => NalUnitType::Reserved(v),
            v => NalUnitType::Unspecified(v),
        }
    }
}

/// A HEVC NAL unit with the 2-byte header decoded and EBSP payload kept
/// as-is (escaping is removed lazily via [`Nal::to_rbsp`], mirroring the AVC
/// `Nal` type).
#[derive(Debug, Clone)]
pub struct Nal {
    pub start_code_len: u8,
    pub nal_type: NalUnitType,
    pub nuh_layer_id: u8,
    pub nuh_temporal_id_plus1: u8,
    pub ebsp: Vec<u8>,
}

impl Nal {
    pub fn parse(start_code_len: u8, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::SyntaxError("HEVC NAL shorter than its 2-byte header".into()));
        }
        let forbidden_zero_bit = bytes[0] & 0x80;
        if forbidden_zero_bit != 0 {
            return Err(Error::SyntaxError("forbidden_zero_bit set in NAL header".into()));
        }
        let nal_type = NalUnitType::from((bytes[0] >> 1) & 0x3f);
        let nuh_layer_id = ((bytes[0] & 0x01) << 5) | (bytes[1] >> 3);
        let nuh_temporal_id_plus1 = bytes[1] & 0x07;

        Ok(Self {
            start_code_len,
            nal_type,
            nuh_layer_id,
            nuh_temporal_id_plus1,
            ebsp: bytes[2..].to_vec(),
        })
    }

    pub fn to_rbsp(&self) -> Vec<u8> {
        crate::avc::nal::ebsp_to_rbsp(&self.ebsp)
    }

    pub fn is_vcl(&self) -> bool {
        self.nal_type.is_vcl()
    }

    pub fn temporal_id(&self) -> u8 {
        self.nuh_temporal_id_plus1.saturating_sub(1)
    }

    /// `nuh_layer_id != 0` identifies the Dolby-Vision enhancement-layer (or
    /// any non-base-layer) sub-bitstream; base-layer NALs always carry 0.
    pub fn is_base_layer(&self) -> bool {
        self.nuh_layer_id == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sps_header() {
        let bytes = [0x42, 0x01, 0xaa, 0xbb];
        let nal = Nal::parse(4, &bytes).unwrap();
        assert_eq!(nal.nal_type, NalUnitType::Sps);
        assert_eq!(nal.nuh_layer_id, 0);
        assert_eq!(nal.nuh_temporal_id_plus1, 1);
        assert_eq!(nal.ebsp, vec![0xaa, 0xbb]);
    }

    #[test]
    fn rejects_forbidden_zero_bit() {
        let bytes = [0x80, 0x01];
        assert!(Nal::parse(4, &bytes).is_err());
    }

    #[test]
    fn enhancement_layer_has_nonzero_layer_id() {
        let bytes = [(63u8 << 1) | ((8u8 >> 5) & 1), (8u8 << 3) | 1, 0xcc];
        let nal = Nal::parse(4, &bytes).unwrap();
        assert_eq!(nal.nuh_layer_id, 8);
        assert!(!nal.is_base_layer());
    }

    #[test]
    fn rasl_is_leading_picture_type() {
        assert!(NalUnitType::RaslR.is_rasl());
        assert!(!NalUnitType::TrailR.is_rasl());
    }
}
