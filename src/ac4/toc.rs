//! AC-4 `ac4_toc()` parsing: the sync-frame table of contents that carries
//! the presentation/substream-group graph (ETSI TS 103 190-2 §4.3, grounded
//! on `parser_ac4_toc`/`ac4_presentation_v1_info`/`ac4_substream_group_info`
//! in `examples/original_source/src/esparser/parser_ac4.c`). `bitstream_version`
//! 0 and 1 are rejected (spec.md Non-goal): their presentation/substream
//! layout is a different, deprecated bitstream syntax the original source
//! itself prints an error for and refuses to parse further.

use crate::ac4::tables::{self, superset};
use crate::bitreader::BitReader;
use crate::{Error, Result};

/// `variable_bits(n, bs)`: an escape-continued unsigned integer, used
/// throughout the TOC wherever a count or id might not fit its base width.
pub fn variable_bits(r: &mut BitReader, n_bits: u32) -> u32 {
    let mut value: u32 = 0;
    loop {
        value = value.wrapping_add(r.read_bits(n_bits));
        if r.read_flag() {
            value <<= n_bits;
            value += 1 << n_bits;
        } else {
            break;
        }
    }
    value
}

/// Unary-coded `presentation_version`: counts consecutive `1` bits.
fn presentation_version(r: &mut BitReader) -> u32 {
    let mut val = 0;
    while r.read_flag() {
        val += 1;
    }
    val
}

/// `get_ch_mode`, Table 79's decision tree. Values 0..=15 name real channel
/// modes; 16 is itself an escape extended by `variable_bits(2, r)`.
fn get_ch_mode(r: &mut BitReader) -> u32 {
    if !r.read_flag() {
        return 0;
    }
    if !r.read_flag() {
        return 1;
    }
    let tmp = r.read_bits(2);
    if tmp != 3 {
        return tmp + 2;
    }
    let tmp = r.read_bits(3);
    if tmp < 6 {
        return tmp + 5;
    }
    if tmp == 6 {
        return r.read_bits(1) + 11;
    }
    let tmp = r.read_bits(2);
    if tmp < 3 {
        tmp + 13
    } else {
        16
    }
}

/// `emdf_protection`: two independently-coded protection-bit-field lengths,
/// skipped (this crate never validates EMDF protection payloads).
fn emdf_protection(r: &mut BitReader) {
    let primary = r.read_bits(2);
    let secondary = r.read_bits(2);
    let field_bits = |code: u32| match code {
        1 => 8,
        2 => 32,
        3 => 128,
        _ => 0,
    };
    r.skip_bits(field_bits(primary));
    r.skip_bits(field_bits(secondary));
}

fn emdf_payloads_substream_info(r: &mut BitReader) {
    let idx = r.read_bits(2);
    if idx == 3 {
        variable_bits(r, 2);
    }
}

/// `(emdf_version, key_id)`, shared by `emdf_info` and `add_emdf_info`
/// (identical bit layout, different destination fields in the C source).
fn emdf_version_and_key(r: &mut BitReader) -> (u8, u16) {
    let mut version = r.read_bits(2);
    if version == 3 {
        version += variable_bits(r, 2);
    }
    let mut key_id = r.read_bits(3);
    if key_id == 7 {
        key_id += variable_bits(r, 3);
    }
    if r.read_flag() {
        emdf_payloads_substream_info(r);
    }
    emdf_protection(r);
    (version as u8, key_id as u16)
}

/// Table E.8.6: `dsi_frame_rate_multiply_info` plus the `frame_rate_factor`
/// it implies for the `b_audio_ndot` loop later in `ac4_substream_info_chan`.
fn frame_rate_multiply_info(frame_rate_index: u8, r: &mut BitReader) -> (u8, u32) {
    match frame_rate_index {
        2..=4 => {
            if r.read_flag() {
                if r.read_flag() {
                    (2, 4)
                } else {
                    (1, 2)
                }
            } else {
                (0, 1)
            }
        }
        0 | 1 | 7 | 8 | 9 => {
            if r.read_flag() {
                (1, 2)
            } else {
                (0, 1)
            }
        }
        _ => (0, 1),
    }
}

/// Table E.10.7: `dsi_frame_rate_fractions_info`.
fn frame_rate_fractions_info(frame_rate_index: u8, frame_rate_factor: u32, r: &mut BitReader) -> u8 {
    match frame_rate_index {
        10..=12 => {
            if r.read_flag() {
                if r.read_flag() {
                    2
                } else {
                    1
                }
            } else {
                0
            }
        }
        5..=9 => {
            if frame_rate_factor != 1 && r.read_flag() {
                1
            } else {
                0
            }
        }
        _ => 0,
    }
}

fn content_type(r: &mut BitReader) -> ContentType {
    let classifier = r.read_bits(3) as u8;
    let mut language_tag = None;
    if r.read_flag() {
        if r.read_flag() {
            r.skip_bits(1);
            r.skip_bits(16);
        } else {
            let n = r.read_bits(6);
            let mut bytes = Vec::with_capacity(n as usize);
            for _ in 0..n {
                bytes.push(r.read_u8());
            }
            language_tag = Some(bytes);
        }
    }
    ContentType { classifier, language_tag }
}

#[derive(Debug, Clone, Default)]
pub struct ContentType {
    pub classifier: u8,
    pub language_tag: Option<Vec<u8>>,
}

/// A channel-coded substream's fields (`ac4_substream_info_chan`, §6.3.2.7.2).
#[derive(Debug, Clone, Default)]
pub struct ChanSubstream {
    pub ch_mode: u8,
    pub b_4_back_channels_present: bool,
    pub b_centre_present: bool,
    pub top_channels_present: u8,
    pub sf_multiplier: u8,
    pub bitrate_indicator: Option<u8>,
    pub add_ch_base: bool,
}

fn ac4_substream_info_chan(
    r: &mut BitReader,
    fs_index: u8,
    frame_rate_factor: u32,
    b_substreams_present: bool,
) -> ChanSubstream {
    let mut ch_mode = get_ch_mode(r);
    if ch_mode == 16 {
        ch_mode += variable_bits(r, 2);
    }
    let ch_mode = ch_mode as u8;

    let (mut back, mut centre, mut top) = (false, false, 0u8);
    if matches!(ch_mode, 11 | 12 | 13 | 14) {
        back = r.read_flag();
        centre = r.read_flag();
        top = r.read_bits(2) as u8;
    }

    let mut sf_multiplier = 0u8;
    if fs_index == 1 && r.read_flag() {
        sf_multiplier = r.read_bits(1) as u8 + 1;
    }

    let mut bitrate_indicator = None;
    if r.read_flag() {
        let tmp = r.read_bits(3);
        bitrate_indicator = Some(match tmp {
            0 | 2 | 4 | 6 => (tmp / 2) as u8,
            1 => 4 + r.read_bits(2) as u8,
            2 => 8 + r.read_bits(2) as u8,
            _ => {
                r.skip_bits(2);
                12
            }
        });
    }

    let mut add_ch_base = false;
    if matches!(ch_mode, 7 | 8 | 9 | 10) {
        add_ch_base = r.read_flag();
    }

    for _ in 0..frame_rate_factor {
        r.skip_bits(1); // b_audio_ndot
    }

    if b_substreams_present {
        let mut idx = r.read_bits(2);
        if idx == 3 {
            idx += variable_bits(r, 2);
        }
    }

    ChanSubstream {
        ch_mode,
        b_4_back_channels_present: back,
        b_centre_present: centre,
        top_channels_present: top,
        sf_multiplier,
        bitrate_indicator,
        add_ch_base,
    }
}

/// One `ac4_substream_group_info()` entry, indexed by `group_index`.
#[derive(Debug, Clone, Default)]
pub struct SubstreamGroup {
    pub b_substreams_present: bool,
    pub b_hsf_ext: bool,
    pub b_single_substream: bool,
    pub substreams: Vec<ChanSubstream>,
    pub content_type: Option<ContentType>,
}

fn ac4_hsf_ext_substream_info_v2(r: &mut BitReader, b_substreams_present: bool) {
    if b_substreams_present {
        let mut idx = r.read_bits(2);
        if idx == 3 {
            idx += variable_bits(r, 2);
        }
    }
}

/// Parses one substream group. Object/AJOC-coded groups (`b_channel_coded
/// == false`, i.e. Dolby Atmos immersive object audio) are out of scope:
/// `ac4_substream_info_ajoc`/`ac4_substream_info_obj`/`oamd_substream_info`
/// are a second, equally deep parse tree with no channel-layout meaning to
/// surface through this crate's `Sample`/DSI model, so they're reported as
/// `Error::NotSupported` rather than silently mis-parsed.
fn ac4_substream_group_info(r: &mut BitReader, fs_index: u8, frame_rate_factor: u32) -> Result<SubstreamGroup> {
    let b_substreams_present = r.read_flag();
    let b_hsf_ext = r.read_flag();
    let b_single_substream = r.read_flag();

    let n_lf_substreams = if b_single_substream {
        1
    } else {
        let minus2 = r.read_bits(2);
        let mut n = minus2 + 2;
        if n == 5 {
            n += variable_bits(r, 2);
        }
        n
    };

    let b_channel_coded = r.read_flag();
    if !b_channel_coded {
        return Err(Error::NotSupported("AC-4 object/AJOC-coded substream groups are not supported".into()));
    }

    let mut substreams = Vec::with_capacity(n_lf_substreams as usize);
    for _ in 0..n_lf_substreams {
        let chan = ac4_substream_info_chan(r, fs_index, frame_rate_factor, b_substreams_present);
        if b_hsf_ext {
            ac4_hsf_ext_substream_info_v2(r, b_substreams_present);
        }
        substreams.push(chan);
    }

    let content_type = if r.read_flag() { Some(content_type_fn(r)) } else { None };

    Ok(SubstreamGroup {
        b_substreams_present,
        b_hsf_ext,
        b_single_substream,
        substreams,
        content_type,
    })
}

fn content_type_fn(r: &mut BitReader) -> ContentType {
    content_type(r)
}

/// `presentation_config_ext_info`: an opaque skip-bytes payload (EMDF and
/// other data this crate has no structured model for).
fn presentation_config_ext_info(r: &mut BitReader) -> Vec<u8> {
    let mut n = r.read_bits(5);
    if r.read_flag() {
        n += variable_bits(r, 2) << 5;
    }
    (0..n).map(|_| r.read_u8()).collect()
}

fn ac4_presentation_substream_info(r: &mut BitReader) {
    r.skip_bits(1); // b_alternative
    r.skip_bits(1); // b_pres_ndot
    let mut idx = r.read_bits(2);
    if idx == 3 {
        idx += variable_bits(r, 2);
    }
}

/// `ac4_sgi_specifier`'s `bitstream_version != 1` branch: a 3-bit (+escape)
/// `group_index` into the not-yet-parsed substream-group table.
fn ac4_sgi_specifier(r: &mut BitReader) -> u8 {
    let mut idx = r.read_bits(3);
    if idx == 7 {
        idx += variable_bits(r, 2);
    }
    idx as u8
}

/// One presentation (`ac4_presentation_v1_info`, §6.2.1.2 v1/v2 variant).
#[derive(Debug, Clone, Default)]
pub struct Presentation {
    pub b_single_substream_group: bool,
    pub presentation_config: u32,
    pub presentation_version: u32,
    pub mdcompat: u8,
    pub b_presentation_id: bool,
    pub presentation_id: u32,
    pub frame_rate_multiply_info: u8,
    pub frame_rate_fractions_info: u8,
    pub frame_rate_factor: u32,
    pub emdf_version: u8,
    pub key_id: u16,
    pub b_presentation_filter: bool,
    pub b_enable_presentation: bool,
    pub group_indices: Vec<u8>,
    pub b_multi_pid: bool,
    pub ext_skip_bytes: Vec<u8>,
    pub b_pre_virtualized: bool,
    pub b_add_emdf_substreams: bool,
    pub add_emdf: Vec<(u8, u16)>,
    /// Derived after every substream group has been parsed
    /// (`generate_presentation_ch_mode`/`_core`).
    pub pres_ch_mode: Option<u8>,
    pub pres_ch_mode_core: Option<u8>,
}

fn ac4_presentation_v1_info(r: &mut BitReader, frame_rate_index: u8) -> Result<Presentation> {
    let mut p = Presentation::default();

    p.b_single_substream_group = r.read_flag();
    if !p.b_single_substream_group {
        let mut cfg = r.read_bits(3);
        if cfg == 7 {
            cfg += variable_bits(r, 2);
        }
        p.presentation_config = cfg;
    }

    p.presentation_version = presentation_version(r);

    if !p.b_single_substream_group && p.presentation_config == 6 {
        p.b_add_emdf_substreams = true;
    } else {
        p.mdcompat = r.read_bits(3) as u8;
        p.b_presentation_id = r.read_flag();
        if p.b_presentation_id {
            p.presentation_id = variable_bits(r, 2);
        }

        let (mult, factor) = frame_rate_multiply_info(frame_rate_index, r);
        p.frame_rate_multiply_info = mult;
        p.frame_rate_factor = factor;
        p.frame_rate_fractions_info = frame_rate_fractions_info(frame_rate_index, factor, r);

        let (version, key_id) = emdf_version_and_key(r);
        p.emdf_version = version;
        p.key_id = key_id;

        p.b_presentation_filter = r.read_flag();
        if p.b_presentation_filter {
            p.b_enable_presentation = r.read_flag();
        }

        if p.b_single_substream_group {
            p.group_indices.push(ac4_sgi_specifier(r));
        } else {
            p.b_multi_pid = r.read_flag();
            match p.presentation_config {
                0 | 1 | 2 => {
                    p.group_indices.push(ac4_sgi_specifier(r));
                    p.group_indices.push(ac4_sgi_specifier(r));
                }
                3 | 4 => {
                    p.group_indices.push(ac4_sgi_specifier(r));
                    p.group_indices.push(ac4_sgi_specifier(r));
                    p.group_indices.push(ac4_sgi_specifier(r));
                }
                5 => {
                    let mut n = r.read_bits(2) + 2;
                    if n == 5 {
                        n += variable_bits(r, 2);
                    }
                    for _ in 0..n {
                        p.group_indices.push(ac4_sgi_specifier(r));
                    }
                }
                _ => {
                    p.ext_skip_bytes = presentation_config_ext_info(r);
                }
            }
        }

        p.b_pre_virtualized = r.read_flag();
        p.b_add_emdf_substreams = r.read_flag();
        ac4_presentation_substream_info(r);
    }

    if p.b_add_emdf_substreams {
        let mut n = r.read_bits(2);
        if n == 0 {
            n = variable_bits(r, 2) + 4;
        }
        for _ in 0..n {
            p.add_emdf.push(emdf_version_and_key(r));
        }
    }

    Ok(p)
}

/// A parsed `ac4_toc()`.
#[derive(Debug, Clone, Default)]
pub struct Ac4Toc {
    pub bitstream_version: u32,
    pub fs_index: u8,
    pub frame_rate_index: u8,
    pub b_iframe_global: bool,
    pub bit_rate_mode: u8,
    pub b_program_id: bool,
    pub short_program_id: u16,
    pub program_uuid: Option<[u16; 8]>,
    pub presentations: Vec<Presentation>,
    pub substream_groups: Vec<SubstreamGroup>,
}

impl Ac4Toc {
    /// `time_scale`/`num_units_in_tick` per Table E.1 (`get_time_scale`).
    pub fn time_scale(&self) -> Option<(u32, u32)> {
        tables::time_scale_for(self.fs_index, self.frame_rate_index)
    }

    /// The default (first) presentation's real output channel mask
    /// (`generate_real_channel_mask`), if it's channel-coded.
    pub fn default_channel_mask(&self) -> Option<u32> {
        self.presentation_channel_mask(0)
    }

    /// `generate_real_channel_mask(parser, presentation_idx, -1, -1)`: the
    /// real output channel mask for an arbitrary presentation, if it's
    /// channel-coded.
    pub fn presentation_channel_mask(&self, presentation_idx: usize) -> Option<u32> {
        let p = self.presentations.get(presentation_idx)?;
        let mode = p.pres_ch_mode?;
        let (back, centre, top) = self.presentation_ch_present(presentation_idx);
        let mask = tables::CHMODE_TO_CHANNEL_MASK.get(mode as usize).copied()?;
        Some(tables::correct_real_channel_mask(mode, mask, centre, back, top))
    }

    /// `generate_real_channel_mask(parser, -1, sg_idx, substream_idx)`: one
    /// channel-coded substream's own real channel mask, used when emitting
    /// a substream group's DSI entry rather than a presentation's.
    pub fn substream_real_channel_mask(&self, sg_idx: u8, substream_idx: usize) -> u32 {
        let Some(group) = self.substream_groups.get(sg_idx as usize) else { return 0 };
        let Some(s) = group.substreams.get(substream_idx) else { return 0 };
        let Some(mask) = tables::CHMODE_TO_CHANNEL_MASK.get(s.ch_mode as usize).copied() else { return 0 };
        tables::correct_real_channel_mask(s.ch_mode, mask, s.b_centre_present, s.b_4_back_channels_present, s.top_channels_present)
    }

    /// `isAtmos` (spec.md §4.5.3): true iff a version-2 (IMS) presentation
    /// references a substream with `ch_mode == 6`.
    pub fn is_atmos(&self, presentation_idx: usize) -> bool {
        let Some(p) = self.presentations.get(presentation_idx) else { return false };
        if p.presentation_version != 2 {
            return false;
        }
        p.group_indices.iter().any(|&gi| {
            self.substream_groups
                .get(gi as usize)
                .map(|g| g.substreams.iter().any(|s| s.ch_mode == 6))
                .unwrap_or(false)
        })
    }

    /// `(b_4_back_channels_present, b_centre_present, top_channels_present)`
    /// aggregated across a presentation's substream groups, feeding
    /// `correct_real_channel_mask`'s presentation-level correction.
    pub fn presentation_ch_present(&self, presentation_idx: usize) -> (bool, bool, u8) {
        let Some(p) = self.presentations.get(presentation_idx) else {
            return (false, false, 0);
        };
        let (mut back, mut centre, mut top) = (false, false, 0u8);
        for &gi in &p.group_indices {
            if let Some(group) = self.substream_groups.get(gi as usize) {
                if let Some(first) = group.substreams.first() {
                    back |= first.b_4_back_channels_present;
                    centre |= first.b_centre_present;
                    top = top.max(first.top_channels_present);
                }
            }
        }
        (back, centre, top)
    }
}

/// Parses `ac4_toc()` from the bits immediately following the sync word and
/// `frame_size` field. Rejects `bitstream_version <= 1` (spec.md Non-goal).
pub fn parse_toc(r: &mut BitReader) -> Result<Ac4Toc> {
    let mut toc = Ac4Toc::default();

    let mut bitstream_version = r.read_bits(2);
    if bitstream_version == 3 {
        bitstream_version += variable_bits(r, 2);
    }
    toc.bitstream_version = bitstream_version;
    if bitstream_version <= 1 {
        return Err(Error::NotSupported("AC-4 bitstream_version 0/1 is deprecated".into()));
    }

    r.skip_bits(10); // sequence_counter

    if r.read_flag() {
        // b_wait_frames
        let wait_frames = r.read_bits(3);
        toc.bit_rate_mode = if wait_frames == 0 {
            1
        } else if wait_frames < 7 {
            2
        } else {
            3
        };
        if wait_frames > 0 {
            r.skip_bits(2); // br_code
        }
    }

    toc.fs_index = r.read_bits(1) as u8;
    toc.frame_rate_index = r.read_bits(4) as u8;
    toc.b_iframe_global = r.read_flag();

    let n_presentations = if r.read_flag() {
        1
    } else if r.read_flag() {
        variable_bits(r, 2) + 2
    } else {
        0
    };

    let mut payload_base = 0u32;
    if r.read_flag() {
        let minus1 = r.read_bits(5);
        payload_base = minus1 + 1;
        if payload_base == 0x20 {
            payload_base += variable_bits(r, 3);
        }
    }
    let _ = payload_base;

    toc.b_program_id = r.read_flag();
    if toc.b_program_id {
        toc.short_program_id = r.read_bits(16) as u16;
        if r.read_flag() {
            let mut uuid = [0u16; 8];
            for slot in &mut uuid {
                *slot = r.read_bits(16) as u16;
            }
            toc.program_uuid = Some(uuid);
        }
    }

    for _ in 0..n_presentations {
        let presentation = ac4_presentation_v1_info(r, toc.frame_rate_index)?;
        toc.presentations.push(presentation);
    }

    let max_group_index = toc
        .presentations
        .iter()
        .flat_map(|p| p.group_indices.iter().copied())
        .max()
        .unwrap_or(0);
    let total_n_substream_groups = max_group_index as usize + 1;

    for _ in 0..total_n_substream_groups {
        let group = ac4_substream_group_info(r, toc.fs_index, presentation_frame_rate_factor(&toc, 0))?;
        toc.substream_groups.push(group);
    }

    for p in &mut toc.presentations {
        let mut pres_ch_mode: Option<u8> = None;
        let mut pres_ch_mode_core: Option<u8> = None;
        for &gi in &p.group_indices {
            let Some(group) = toc.substream_groups.get(gi as usize) else { continue };
            for s in &group.substreams {
                pres_ch_mode = superset(pres_ch_mode, Some(s.ch_mode));
                let core = match s.ch_mode {
                    11 | 13 => Some(5),
                    12 | 14 => Some(6),
                    _ => None,
                };
                pres_ch_mode_core = superset(pres_ch_mode_core, core);
            }
        }
        if matches!(pres_ch_mode, Some(5) | Some(6)) && p.presentation_version == 2 {
            pres_ch_mode = Some(1);
        }
        p.pres_ch_mode = pres_ch_mode;
        p.pres_ch_mode_core = pres_ch_mode_core;
    }

    Ok(toc)
}

/// `ac4_substream_info_chan`'s `b_audio_ndot` loop walks the frame-rate
/// factor of whichever presentation references this substream group; every
/// presentation in a frame shares one `frame_rate_index`, so any
/// presentation's factor is representative once parsed. During the first
/// pass (before any presentation exists yet) this just falls back to 1.
fn presentation_frame_rate_factor(toc: &Ac4Toc, _group_idx: usize) -> u32 {
    toc.presentations.first().map(|p| p.frame_rate_factor).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BitWriterLsb {
        bits: Vec<bool>,
    }

    impl BitWriterLsb {
        fn new() -> Self {
            Self { bits: Vec::new() }
        }
        fn push(&mut self, n: u32, value: u32) {
            for i in (0..n).rev() {
                self.bits.push((value >> i) & 1 == 1);
            }
        }
        fn push_flag(&mut self, flag: bool) {
            self.bits.push(flag);
        }
        fn into_bytes(self) -> Vec<u8> {
            let mut bytes = vec![0u8; self.bits.len().div_ceil(8)];
            for (i, bit) in self.bits.iter().enumerate() {
                if *bit {
                    bytes[i / 8] |= 1 << (7 - (i % 8));
                }
            }
            bytes
        }
    }

    /// A minimal single-presentation, single-substream-group, channel-coded
    /// (stereo) `ac4_toc()`.
    fn minimal_toc_bytes() -> Vec<u8> {
        let mut w = BitWriterLsb::new();
        w.push(2, 2); // bitstream_version = 2
        w.push(10, 0); // sequence_counter
        w.push_flag(false); // b_wait_frames
        w.push(1, 1); // fs_index = 1 (48kHz)
        w.push(4, 6); // frame_rate_index = 6 (25 fps family)
        w.push_flag(true); // b_iframe_global
        w.push_flag(true); // b_single_presentation -> n_presentations = 1
        w.push_flag(false); // b_payload_base
        w.push_flag(true); // b_program_id
        w.push(16, 0x1234); // short_program_id
        w.push_flag(false); // b_program_uuid_present

        // presentation 0: ac4_presentation_v1_info
        w.push_flag(true); // b_single_substream_group
        // presentation_version: unary, terminate immediately -> value 0
        w.push_flag(false);
        w.push(3, 0); // mdcompat
        w.push_flag(false); // b_presentation_id (single, non-IMS presentation: legal without id)
        // frame_rate_multiply_info: frame_rate_index=6 falls in the 0|1|7|8|9 set? no (6 not in either list) -> no bits
        // frame_rate_fractions_info: frame_rate_index=6 not in 5..=9? it is (5..=9 includes 6) -> needs factor check;
        // factor defaults to 1 from the "_" arm above, so b_frame_rate_fraction is skipped entirely (guarded on factor != 1).
        // emdf_info: emdf_version(2) + key_id(3) + b_emdf_payloads_substream_info(1) + emdf_protection(2+2)
        w.push(2, 0); // emdf_version
        w.push(3, 0); // key_id
        w.push_flag(false); // b_emdf_payloads_substream_info
        w.push(2, 0); // protection_length_primary
        w.push(2, 0); // protection_length_secondary
        w.push_flag(false); // b_presentation_filter
        // ac4_sgi_specifier (bitstream_version != 1): group_index, 3 bits
        w.push(3, 0); // group_index = 0
        w.push_flag(false); // b_pre_virtualized
        w.push_flag(false); // b_add_emdf_substreams
        // ac4_presentation_substream_info
        w.push_flag(false); // b_alternative
        w.push_flag(false); // b_pres_ndot
        w.push(2, 0); // substream_index

        // substream group 0: ac4_substream_group_info
        w.push_flag(false); // b_substreams_present
        w.push_flag(false); // b_hsf_ext_v2
        w.push_flag(true); // b_single_substream_v2 -> n_lf_substreams = 1
        w.push_flag(true); // b_channel_coded
        // ac4_substream_info_chan: get_ch_mode -> encode ch_mode = 1 ("1" then "0")
        w.push_flag(true);
        w.push_flag(false);
        // fs_index == 1 branch: b_sf_multiplier
        w.push_flag(false);
        // b_bitrate_info
        w.push_flag(false);
        // b_audio_ndot loop: frame_rate_factor defaults to 1 -> one bit
        w.push_flag(false);
        // b_substreams_present == false -> no substream_index field here
        w.push_flag(false); // b_content_type_v2

        w.push(8, 0); // pad to flush final byte cleanly
        w.into_bytes()
    }

    #[test]
    fn parses_minimal_single_presentation_toc() {
        let bytes = minimal_toc_bytes();
        let mut r = BitReader::new(&bytes);
        let toc = parse_toc(&mut r).expect("minimal toc should parse");
        assert_eq!(toc.bitstream_version, 2);
        assert_eq!(toc.presentations.len(), 1);
        assert_eq!(toc.substream_groups.len(), 1);
        assert_eq!(toc.substream_groups[0].substreams.len(), 1);
        assert_eq!(toc.substream_groups[0].substreams[0].ch_mode, 1);
        assert_eq!(toc.presentations[0].pres_ch_mode, Some(1));
    }

    #[test]
    fn rejects_deprecated_bitstream_version() {
        let mut w = BitWriterLsb::new();
        w.push(2, 1); // bitstream_version = 1
        w.push(8, 0);
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        let err = parse_toc(&mut r).unwrap_err();
        assert_eq!(err, Error::NotSupported("AC-4 bitstream_version 0/1 is deprecated".into()));
    }
}
