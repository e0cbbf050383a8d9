//! HEVC (H.265) elementary-stream parsing (spec.md §4.4).

pub mod au;
pub mod dsi;
pub mod nal;
pub mod parser;
pub mod pps;
pub mod ptl;
pub mod rps;
pub mod sei;
pub mod slice;
pub mod sps;
pub mod vps;

pub use au::{AccessUnit, AccessUnitBuilder, AccessUnitKind};
pub use dsi::build_hvcc;
pub use nal::{Nal, NalUnitType};
pub use parser::HevcParser;
pub use pps::Pps;
pub use ptl::ProfileTierLevel;
pub use rps::ShortTermRps;
pub use sei::{SeiMessage, SeiPayload};
pub use slice::{SliceHeader, SliceType};
pub use sps::{HevcVui, Sps};
pub use vps::Vps;
