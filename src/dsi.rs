//! Decoder-specific-information synthesis for the pass-through audio codecs
//! (spec.md §4.6, SPEC_FULL.md §4.7): AAC's `esds`/AudioSpecificConfig
//! (ISO/IEC 14496-3/-1) and AC-3/E-AC-3's `dac3`/`dec3` (ETSI TS 102 366
//! Annex F). Unlike AVC/HEVC/AC-4, none of these formats need this crate to
//! track parameter-set lifecycles: ADTS/AC-3 frame headers are small,
//! fixed-layout, and carry everything their DSI needs in every frame, so
//! each parser below just re-derives the DSI from the latest frame header.

pub mod aac;
pub mod ac3;
pub mod dolby_vision;
