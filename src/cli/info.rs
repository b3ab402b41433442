use anyhow::Result;
use serde::Serialize;

use vorbisdur::process::extract::Extractor;
use vorbisdur::structs::ident::IdentificationHeader;
use vorbisdur::structs::setup::SetupHeader;

use super::command::{Cli, InfoArgs};
use super::headers::collect_headers;
use crate::input::InputReader;

pub fn cmd_info(args: &InfoArgs, _cli: &Cli) -> Result<()> {
    log::info!("Analyzing Ogg Vorbis stream: {}", args.input.display());

    let mut input = InputReader::new(&args.input)?;
    let mut extractor = Extractor::default();

    let headers = collect_headers(&mut input, &mut extractor)?;

    let ident = IdentificationHeader::parse(&headers.identification)?;
    let setup = SetupHeader::parse(&headers.setup, ident.block_size)?;
    let info = StreamInfo::new(&ident, &setup);

    if args.yaml {
        print!("{}", serde_yaml_ng::to_string(&info)?);
    } else {
        display_stream_info(&info);
    }

    Ok(())
}

#[derive(Serialize)]
pub struct StreamInfo {
    pub version: u32,
    pub channels: u8,
    pub sample_rate: u32,
    pub bitrate_maximum: i32,
    pub bitrate_nominal: i32,
    pub bitrate_minimum: i32,
    pub block_size_short: u32,
    pub block_size_long: u32,
    pub mode_count: u32,
    pub mode_mask: u32,
    pub mode_block_size: Vec<u32>,
}

impl StreamInfo {
    fn new(ident: &IdentificationHeader, setup: &SetupHeader) -> Self {
        Self {
            version: ident.version,
            channels: ident.channels,
            sample_rate: ident.sample_rate,
            bitrate_maximum: ident.bitrate_maximum,
            bitrate_nominal: ident.bitrate_nominal,
            bitrate_minimum: ident.bitrate_minimum,
            block_size_short: ident.block_size[0],
            block_size_long: ident.block_size[1],
            mode_count: setup.mode_count,
            mode_mask: setup.mode_mask,
            mode_block_size: setup.mode_block_size[..setup.mode_count as usize].to_vec(),
        }
    }
}

fn display_stream_info(info: &StreamInfo) {
    println!();
    println!("Ogg Vorbis Stream Information");
    println!("=============================");
    println!();

    println!("Stream Information");
    println!("  Vorbis version            {}", info.version);
    println!("  Channels                  {}", info.channels);
    println!("  Sample rate               {} Hz", info.sample_rate);
    println!("  Nominal bitrate           {}", bitrate_str(info.bitrate_nominal));
    println!("  Maximum bitrate           {}", bitrate_str(info.bitrate_maximum));
    println!("  Minimum bitrate           {}", bitrate_str(info.bitrate_minimum));
    println!("  Block sizes               {} / {} samples", info.block_size_short, info.block_size_long);
    println!();

    println!("Mode Table");
    println!("  Number of modes           {}", info.mode_count);
    println!("  Mode mask                 {:#04X}", info.mode_mask);
    for (index, block_size) in info.mode_block_size.iter().enumerate() {
        let window = if *block_size == info.block_size_long && info.block_size_long != info.block_size_short {
            "long"
        } else {
            "short"
        };
        println!("  Mode {index}                    {block_size} samples ({window} window)");
    }
    println!();
}

fn bitrate_str(bitrate: i32) -> String {
    if bitrate > 0 {
        format!("{:.1} kbps", bitrate as f64 / 1000.0)
    } else {
        "not indicated".to_string()
    }
}
