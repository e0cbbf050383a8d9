//! Dolby-Vision `dvcC`/`DOVIDecoderConfigurationRecord` synthesis
//! (SPEC_FULL.md §4.8), grounded on `parser_hevc_get_mp4_cfg`'s
//! `dv_dsi_buf` construction and the `dv_level` breakpoint table computed
//! in `parser_hevc_activate_sps` in
//! `examples/original_source/src/esparser/parser_hevc.c`.

/// Which layers a Dolby-Vision stream carries, driving both the `dvcC`
/// flags byte and the 4x `dv_level` derating rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DvLayers {
    /// Base layer only, RPU folded into it (profiles 5, 8).
    BlRpu,
    /// Base + enhancement + RPU (profiles 4, 7).
    BlElRpu,
    /// Enhancement + RPU, no independently decodable base layer (profile 3
    /// non-backward-compatible case handled by the caller separately).
    ElRpu,
    /// Base layer only, no RPU (profile 3's BL-only flag).
    BlOnly,
}

impl DvLayers {
    fn flags_bits(self) -> u8 {
        match self {
            DvLayers::BlRpu => 0b101,
            DvLayers::BlElRpu => 0b111,
            DvLayers::ElRpu => 0b110,
            DvLayers::BlOnly => 0b001,
        }
    }
}

/// Fields needed to serialise one `dvcC`/`dvvC` record. `bl_signal_compat_id`
/// is only meaningful for profiles 2, 4, 6, 7 and 8 (§dvcC byte 4); the
/// original source's fixed per-profile values are reproduced by the caller
/// choosing the right `DvRecordInput` rather than this module guessing from
/// `profile` alone, since profile 8 takes its id from the caller
/// (`ext_dv_bl_compatible_id`) while the others are fixed constants.
pub struct DvRecordInput {
    pub profile: u8,
    pub level: u8,
    pub layers: DvLayers,
    pub bl_signal_compatibility_id: Option<u8>,
}

/// Serialises the fixed 24-byte `DOVIDecoderConfigurationRecord` (`dvcC`
/// box payload). Unused trailing bytes stay zero, matching the source's
/// `memset(dv_dsi_buf, 0, 24)` before field assignment.
pub fn build_dvcc(input: &DvRecordInput) -> [u8; 24] {
    let mut buf = [0u8; 24];
    buf[0] = 1; // dv_version_major
                // buf[1] dv_version_minor stays 0

    buf[2] = input.profile << 1;
    buf[3] = input.layers.flags_bits() | (input.level << 3);

    if let Some(id) = input.bl_signal_compatibility_id {
        buf[4] = id << 4;
    }

    buf
}

/// Dolby-Vision `dv_level` (1-9), a coarse width x height x framerate
/// breakpoint classification. `height == 544` is folded to the 540-line
/// active area before the lookup, matching the source's anamorphic
/// letterbox carve-out. When `rpu_only_derate` is set (RPU present, no
/// enhancement layer, and profile is neither 5 nor 8) the product is
/// derated by 4x before the table lookup, matching the source's "RPU-only
/// streams need less decode bandwidth than full BL+EL" correction.
pub fn derive_dv_level(width: u32, height: u32, framerate: u32, rpu_only_derate: bool) -> u8 {
    let active_height = if height == 544 { 540 } else { height };
    let mut level = (width as u64) * (active_height as u64) * (framerate as u64);
    if rpu_only_derate {
        level *= 4;
    }

    if level <= 1280 * 720 * 24 {
        1
    } else if level <= 1280 * 720 * 30 {
        2
    } else if level <= 1920 * 1080 * 24 {
        3
    } else if level <= 1920 * 1080 * 30 {
        4
    } else if level <= 1920 * 1080 * 60 {
        5
    } else if level <= 3840 * 2160 * 24 {
        6
    } else if level <= 3840 * 2160 * 30 {
        7
    } else if level <= 3840 * 2160 * 48 {
        8
    } else {
        9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_breakpoints_match_table() {
        assert_eq!(derive_dv_level(1280, 720, 24, false), 1);
        assert_eq!(derive_dv_level(1280, 720, 30, false), 2);
        assert_eq!(derive_dv_level(1920, 1080, 30, false), 4);
        assert_eq!(derive_dv_level(3840, 2160, 60, false), 9);
    }

    #[test]
    fn anamorphic_544_folds_to_540() {
        // 1920x544@24 sits just above the 720p24 breakpoint unless folded
        // down to the 540-line active area, where it lands in level 3.
        assert_eq!(derive_dv_level(1920, 544, 24, false), derive_dv_level(1920, 540, 24, false));
    }

    #[test]
    fn rpu_only_derates_by_4x() {
        // 1280x720@30 alone is level 2, but RPU-only content at that size
        // is derated into the 4K bracket.
        let undersated = derive_dv_level(1280, 720, 30, false);
        let derated = derive_dv_level(1280, 720, 30, true);
        assert!(derated > undersated);
    }

    #[test]
    fn bl_rpu_profile5_record_layout() {
        let input = DvRecordInput {
            profile: 5,
            level: 6,
            layers: DvLayers::BlRpu,
            bl_signal_compatibility_id: None,
        };
        let record = build_dvcc(&input);
        assert_eq!(record[0], 1);
        assert_eq!(record[2], 5 << 1);
        assert_eq!(record[3], 0b101 | (6 << 3));
        assert_eq!(record[4], 0);
    }

    #[test]
    fn profile8_carries_caller_supplied_compatibility_id() {
        let input = DvRecordInput {
            profile: 8,
            level: 3,
            layers: DvLayers::BlRpu,
            bl_signal_compatibility_id: Some(2),
        };
        let record = build_dvcc(&input);
        assert_eq!(record[4], 2 << 4);
    }
}
