//! AC-4 channel-mode/channel-mask tables and the Table E.1 frame-rate ->
//! time-scale lookup, grounded on `chmode_2_channel_mask`,
//! `superset_channel_mode` and `get_time_scale` in
//! `examples/original_source/src/esparser/parser_ac4.c` (ETSI TS 103 190-2).

/// `chmode_2_channel_mask`: the ISO/IEC 23001-8 channel mask each of the 16
/// AC-4 channel modes maps to before any presentation-level correction.
pub const CHMODE_TO_CHANNEL_MASK: [u32; 16] = [
    0x00002, 0x00001, 0x00003, 0x00007, 0x00047, 0x0000f, 0x0004f, 0x20007, 0x20047, 0x40007,
    0x40047, 0x0003f, 0x0007f, 0x1003f, 0x1007f, 0x2ff7f,
];

/// `superset_channel_mode[16][16]`: the channel mode that results from
/// combining two channel-coded substreams' modes within one presentation.
pub const SUPERSET_CHANNEL_MODE: [[u8; 16]; 16] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [2, 2, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [3, 3, 3, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [4, 4, 4, 4, 4, 6, 6, 8, 8, 10, 10, 12, 12, 14, 14, 15],
    [5, 5, 5, 5, 6, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [6, 6, 6, 6, 6, 6, 6, 6, 8, 6, 10, 12, 12, 14, 14, 15],
    [7, 7, 7, 7, 8, 7, 6, 7, 8, 9, 10, 12, 12, 13, 14, 15],
    [8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 10, 11, 12, 14, 14, 15],
    [9, 9, 9, 9, 10, 9, 10, 9, 9, 9, 10, 11, 12, 13, 14, 15],
    [10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 12, 13, 14, 15],
    [11, 11, 11, 11, 12, 11, 12, 11, 12, 11, 12, 11, 13, 13, 14, 15],
    [12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 13, 14, 15],
    [13, 13, 13, 13, 14, 13, 14, 13, 14, 13, 14, 13, 14, 13, 14, 15],
    [14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 15],
    [15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15],
];

/// Combines two channel modes the way `superset()` does: either side being
/// "unset" (`None` or out of range, i.e. the C code's `-1`) returns the other
/// side untouched.
pub fn superset(a: Option<u8>, b: Option<u8>) -> Option<u8> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(a), Some(b)) if a > 15 => Some(b),
        (Some(a), Some(b)) if b > 15 => Some(a),
        (Some(a), Some(b)) => Some(SUPERSET_CHANNEL_MODE[a as usize][b as usize]),
    }
}

/// Table E.1: `(time_scale, num_units_in_tick)` for a given `fs_index` /
/// `frame_rate_index` pair. `None` marks a reserved/undefined combination.
pub fn time_scale_for(fs_index: u8, frame_rate_index: u8) -> Option<(u32, u32)> {
    if fs_index == 0 {
        return if frame_rate_index == 13 { Some((44100, 2048)) } else { None };
    }
    let table: [(u32, u32); 14] = [
        (48000, 2002),
        (48000, 2000),
        (48000, 1920),
        (240000, 8008),
        (48000, 1600),
        (48000, 1001),
        (48000, 1000),
        (48000, 960),
        (240000, 4004),
        (48000, 800),
        (48000, 480),
        (240000, 2002),
        (48000, 400),
        (48000, 2048),
    ];
    table.get(frame_rate_index as usize).copied()
}

/// `generate_real_channel_mask`'s presentation-level correction: clears bits
/// for an absent centre/back-surround pair on the "_H" (height) channel
/// modes, and overwrites the top-channel bits from the separately-signalled
/// top-channel count.
pub fn correct_real_channel_mask(pres_ch_mode: u8, mask: u32, b_centre: bool, b_4_back_channels: bool, top_channels: u8) -> u32 {
    if !matches!(pres_ch_mode, 11 | 12 | 13 | 14) {
        return mask;
    }
    let mut mask = mask;
    if !b_centre {
        mask &= 0xffff_fffd;
    }
    if !b_4_back_channels {
        mask &= 0xffff_fff7;
    }
    mask = match top_channels {
        1 | 2 => (mask & 0xffff_ff0f) | (0xc << 4),
        0 => (mask & 0xffff_ff0f) | (0x4 << 4),
        _ => mask,
    };
    mask
}
