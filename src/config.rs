//! Caller-supplied configuration consumed by `Parser::init` and by the
//! per-codec constructors (grounded on `ext_timing_info_t` and the
//! `dsi_type`/`keep_all_nalus`/`sd` fields threaded through
//! `parser_avc_create`/`parser_hevc_create` in the original source).

/// Selects which ISO-BMFF DSI record flavour a parser's DSI builder targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsiType {
    Mp4ff,
    Asf,
    Mp2ts,
    Cff,
}

/// External timing override supplied at `init` time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalTiming {
    pub num_units_in_tick: u32,
    pub time_scale: u32,
    pub override_flag: bool,
    pub ps_present_flag: bool,
    pub dv_profile: Option<u8>,
    pub dv_bl_compat_id: Option<u8>,
    pub ac4_bitrate: Option<u32>,
    pub ac4_bitrate_precision: Option<u8>,
}

/// Per-parser construction knobs.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    pub dsi_type: DsiType,
    /// Keep every NAL in the emitted mdat stream, even ones the
    /// parameter-set dedup logic would otherwise elide.
    pub keep_all_nalus: bool,
    /// `true`: a parameter-set collision is fatal (`MultiSdForbidden`).
    /// `false`: collision clones the DSI and flags `NEW_SAMPLE_DESCRIPTION`.
    pub single_sd_policy: bool,
    /// Four-character conformance profile, e.g. `*b"ccff"`. Only `ccff`
    /// (or none) is accepted; anything else makes `set_conformance` fail.
    pub conformance_type: Option<[u8; 4]>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            dsi_type: DsiType::Mp4ff,
            keep_all_nalus: false,
            single_sd_policy: false,
            conformance_type: None,
        }
    }
}

impl CodecConfig {
    /// Mirrors `parser_set_conformance`: empty or `"ccff"` is accepted.
    pub fn set_conformance(&mut self, four_cc: Option<[u8; 4]>) -> bool {
        match four_cc {
            None => {
                self.conformance_type = None;
                true
            }
            Some(cc) if &cc == b"ccff" => {
                self.conformance_type = Some(cc);
                true
            }
            Some(cc) => {
                self.conformance_type = Some(cc);
                false
            }
        }
    }
}
