//! AVC (H.264) elementary-stream parsing (spec.md §4.3).

pub mod au;
pub mod dsi;
pub mod nal;
pub mod parser;
pub mod pps;
pub mod sei;
pub mod slice;
pub mod sps;

pub use au::{AccessUnit, AccessUnitBuilder, AccessUnitKind};
pub use dsi::build_avcc;
pub use nal::{Nal, NalUnitType};
pub use parser::AvcParser;
pub use pps::Pps;
pub use sei::{SeiMessage, SeiPayload};
pub use slice::{PictureId, SliceHeader, SliceType};
pub use sps::Sps;
