//! End-to-end coverage across the codec front ends: each test drives a
//! `Parser` (or, for the AC-4 DSI case, the `ac4::dsi` builder directly)
//! the way a muxer would, and checks the externally observable contract
//! (`Sample` flags/timing, DSI bytes) rather than internal state.

use esmux_core::ac4::dsi::build_dac4;
use esmux_core::ac4::toc::Ac4Toc;
use esmux_core::bitreader::BitWriter;
use esmux_core::{make_parser, CodecConfig, Error, ExternalTiming, SampleFlags};

fn avc_sps_pps_idr_stream() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&[
        0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1f, 0xac, 0x34, 0xc8, 0x14, 0x00, 0x00, 0x03, 0x00, 0x04, 0x00,
        0x00, 0x03, 0x00, 0xf0, 0x3c, 0x60, 0xc6, 0x58,
    ]);
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x68, 0xee, 0x3c, 0x80]);
    data.extend_from_slice(&[
        0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    ]);
    data
}

#[test]
fn avc_single_idr_yields_a_sync_sample_with_an_avcc_record() {
    let mut parser = make_parser("avc").unwrap();
    parser.init(CodecConfig::default(), ExternalTiming::default()).unwrap();
    parser.feed(&avc_sps_pps_idr_stream()).unwrap();
    parser.finish();

    let sample = parser.get_sample().unwrap().expect("one access unit recovered");
    assert!(sample.flags.contains(SampleFlags::SYNC));
    assert!(parser.get_sample().unwrap().is_none());

    let cfg = parser.get_cfg().expect("avcC available once an SPS/PPS pair is known");
    assert_eq!(cfg[0], 1, "configurationVersion");
}

#[test]
fn avc_sps_byte_collision_forces_a_new_sample_description() {
    let mut parser = make_parser("avc").unwrap();
    parser.init(CodecConfig::default(), ExternalTiming::default()).unwrap();

    parser.feed(&avc_sps_pps_idr_stream()).unwrap();
    let first = parser.get_sample().unwrap().expect("first AU recovered");
    assert!(!first.flags.contains(SampleFlags::NEW_SAMPLE_DESCRIPTION));

    // Same seq_parameter_set_id (0) but a different level_idc byte (0x1f ->
    // 0x1e): the ue(v)-coded fields afterward stay bit-aligned, so this is
    // still a structurally valid, differently-valued SPS.
    let mut data = Vec::new();
    data.extend_from_slice(&[
        0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1e, 0xac, 0x34, 0xc8, 0x14, 0x00, 0x00, 0x03, 0x00, 0x04, 0x00,
        0x00, 0x03, 0x00, 0xf0, 0x3c, 0x60, 0xc6, 0x58,
    ]);
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x68, 0xee, 0x3c, 0x80]);
    data.extend_from_slice(&[
        0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    ]);
    parser.feed(&data).unwrap();
    parser.finish();

    let second = parser.get_sample().unwrap().expect("second AU recovered after SPS collision");
    assert!(second.flags.contains(SampleFlags::NEW_SAMPLE_DESCRIPTION));
}

fn hevc_minimal_vps_bytes() -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bits(4, 0);
    w.write_bits(2, 0b11);
    w.write_bits(6, 0);
    w.write_bits(3, 0);
    w.write_bit(true);
    w.write_bits(16, 0xffff);
    w.write_bits(2, 0);
    w.write_bit(false);
    w.write_bits(5, 1);
    w.write_bits(32, 0);
    w.write_bit(true);
    w.write_bit(false);
    w.write_bit(true);
    w.write_bit(true);
    w.write_bits(16, 0);
    w.write_bits(16, 0);
    w.write_bits(12, 0);
    w.write_u8(93);
    w.write_bit(true);
    for bit in esmux_core::eg::write_ue(0) {
        w.write_bit(bit);
    }
    for bit in esmux_core::eg::write_ue(0) {
        w.write_bit(bit);
    }
    for bit in esmux_core::eg::write_ue(0) {
        w.write_bit(bit);
    }
    w.write_bit(true);
    w.into_bytes()
}

#[test]
fn ac4_ims_presentation_emits_a_duplicate_dac4_entry_with_pre_virtualized_set() {
    let mut toc = Ac4Toc {
        bitstream_version: 2,
        fs_index: 1,
        frame_rate_index: 6,
        b_iframe_global: true,
        ..Default::default()
    };
    let mut presentation = esmux_core::ac4::Presentation::default();
    presentation.b_single_substream_group = true;
    presentation.presentation_version = 2; // IMS
    presentation.group_indices.push(0);
    toc.presentations.push(presentation);

    let mut group = esmux_core::ac4::SubstreamGroup::default();
    let mut substream = esmux_core::ac4::toc::ChanSubstream::default();
    substream.ch_mode = 6; // Atmos-bed channel mode
    group.substreams.push(substream);
    toc.substream_groups.push(group);

    let record = build_dac4(&toc, &ExternalTiming::default());
    let first3 = u32::from_be_bytes([0, record[0], record[1], record[2]]);
    let n_presentations = first3 & 0x1ff;
    assert_eq!(n_presentations, 2, "an IMS presentation counts as two dac4 entries");
}

#[test]
fn ac4_bitstream_version_zero_is_not_supported() {
    let mut parser = make_parser("ac4").unwrap();
    parser.init(CodecConfig::default(), ExternalTiming::default()).unwrap();

    let mut w = BitWriter::new();
    w.write_bits(2, 0); // bitstream_version = 0, deprecated
    w.write_bits(6, 0);
    let payload = w.into_bytes();
    let mut frame = vec![0xac, 0x40];
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(&payload);

    let err = parser.feed(&frame).unwrap_err();
    assert_eq!(err, Error::NotSupported("AC-4 bitstream_version 0/1 is deprecated".into()));
}

#[test]
fn unknown_codec_name_is_not_supported() {
    let err = make_parser("mp3").unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
}

#[test]
fn hevc_vps_bytes_are_well_formed_enough_to_feed() {
    // Smoke coverage for the shared VPS fixture builder above: just confirm
    // it produces a non-empty byte string a HEVC parser can be fed without
    // panicking, independent of whether a full IDR AU completes.
    let vps = hevc_minimal_vps_bytes();
    let mut parser = make_parser("hevc").unwrap();
    parser.init(CodecConfig::default(), ExternalTiming::default()).unwrap();
    let mut data = vec![0x00, 0x00, 0x00, 0x01, 32u8 << 1, 1];
    data.extend_from_slice(&vps);
    parser.feed(&data).unwrap();
    parser.finish();
}
