//! Feeds a raw elementary-stream file through `esmux_core::make_parser` and
//! prints one line per recovered sample, mirroring the kind of smoke-test
//! CLI a muxer's own test harness would run by hand.

use esmux_core::{make_parser, CodecConfig, ExternalTiming, SampleFlags};
use std::fs::File;
use std::io::Read;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <avc|hevc|ac4|aac|ac3|ec3> <elementary_stream_file>", args[0]);
        return Ok(());
    }
    let codec = &args[1];

    let mut file = File::open(&args[2])?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;

    let mut parser = make_parser(codec)?;
    parser.init(CodecConfig::default(), ExternalTiming::default())?;
    parser.feed(&buffer)?;
    parser.finish();

    let mut sample_count = 0;
    let mut sync_count = 0;
    let mut printed_cfg = false;

    while let Some(sample) = parser.get_sample()? {
        sample_count += 1;
        let is_sync = sample.flags.contains(SampleFlags::SYNC);
        if is_sync {
            sync_count += 1;
        }

        if !printed_cfg {
            if let Some(cfg) = parser.get_cfg() {
                println!("DSI record: {} bytes", cfg.len());
                printed_cfg = true;
            }
        }

        println!(
            "Sample {}: dts={} cts={} size={} sync={} nals={}",
            sample_count,
            sample.dts,
            sample.cts,
            sample.size,
            is_sync,
            sample.nal_list.len(),
        );
    }

    println!("\nSummary:");
    println!("Total samples: {sample_count}");
    println!("Sync samples: {sync_count}");

    Ok(())
}
