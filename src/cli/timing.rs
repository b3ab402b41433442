use anyhow::{Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use vorbisdur::process::extract::{Extractor, Packet};
use vorbisdur::process::parse::Parser;
use vorbisdur::structs::ident::IdentificationHeader;
use vorbisdur::utils::errors::ExtractError;

use super::command::{Cli, TimingArgs};
use super::headers::collect_headers;
use crate::input::InputReader;

pub fn cmd_timing(args: &TimingArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Computing packet timing: {}", args.input.display());

    let mut input = InputReader::new(&args.input)?;
    let mut extractor = Extractor::default();

    let headers = collect_headers(&mut input, &mut extractor)?;
    let sample_rate = IdentificationHeader::parse(&headers.identification)?.sample_rate;

    let mut parser = Parser::new();
    parser.set_headers(&headers.identification, &headers.setup);

    let pb = multi.map(|multi| {
        let pb = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("Analyzing packets...");
        pb
    });

    let mut context = TimingContext {
        parser,
        sample_rate,
        show_packets: args.packets,
        strict: cli.strict,
        stats: TimingStats::default(),
        pb,
    };

    // Packets extracted alongside the headers are still queued.
    for packet in extractor.by_ref() {
        context.process_packet(packet)?;
    }

    input.process_chunks(64 * 1024, |chunk| {
        extractor.push_bytes(chunk);

        for packet in extractor.by_ref() {
            context.process_packet(packet)?;
        }

        Ok(true)
    })?;

    if let Some(ref pb) = context.pb {
        pb.finish_and_clear();
    }

    display_summary(&context.stats, sample_rate, extractor.pages());

    Ok(())
}

struct TimingContext {
    parser: Parser,
    sample_rate: u32,
    show_packets: bool,
    strict: bool,
    stats: TimingStats,
    pb: Option<ProgressBar>,
}

#[derive(Default)]
struct TimingStats {
    packets: u64,
    undurated: u64,
    total_samples: u64,
    last_granule: Option<u64>,
}

impl TimingContext {
    fn process_packet(&mut self, packet: Result<Packet, ExtractError>) -> Result<()> {
        let packet = match packet {
            Ok(packet) => packet,
            Err(e) => {
                if self.strict {
                    return Err(e.into());
                }
                log::warn!("Extraction error after packet {}: {e}", self.stats.packets);
                return Ok(());
            }
        };

        match self.parser.parse(&packet.data) {
            Some(duration) => {
                self.stats.packets += 1;
                self.stats.total_samples += u64::from(duration);

                if self.show_packets {
                    let pts = self.stats.total_samples - u64::from(duration);
                    println!(
                        "packet {:>6}  duration {:>5}  pts {:>10}  time {}",
                        self.stats.packets,
                        duration,
                        pts,
                        time_str(pts as f64 / self.sample_rate as f64)
                    );
                }

                if self.stats.packets.is_multiple_of(1000) {
                    if let Some(ref pb) = self.pb {
                        pb.set_message(format!(
                            "Analyzing packets...      {}",
                            self.stats.packets
                        ));
                    }
                }
            }
            None => {
                self.stats.undurated += 1;
                if self.strict && !packet.data.is_empty() {
                    bail!(
                        "Packet after {} timed packets could not be assigned a duration",
                        self.stats.packets
                    );
                }
            }
        }

        if packet.granule_position >= 0 {
            self.stats.last_granule = Some(packet.granule_position as u64);
        }

        Ok(())
    }
}

fn display_summary(stats: &TimingStats, sample_rate: u32, pages: usize) {
    println!();
    println!("Timing Summary");
    println!("  Pages processed           {pages}");
    println!("  Audio packets             {}", stats.packets);
    if stats.undurated > 0 {
        println!("  Packets without duration  {}", stats.undurated);
    }
    println!("  Total samples             {}", stats.total_samples);

    if sample_rate > 0 {
        let duration_secs = stats.total_samples as f64 / sample_rate as f64;
        println!("  Duration                  {}", time_str(duration_secs));
    }

    if let Some(granule) = stats.last_granule {
        println!("  Final granule position    {granule}");
        // The first packet only primes the window overlap in a real decode,
        // so the running sum can sit slightly above the granule count.
        let drift = stats.total_samples as i64 - granule as i64;
        if drift != 0 {
            log::info!("Sample count differs from the final granule position by {drift}");
        }
    }
    println!();
}

fn time_str(sec: f64) -> String {
    let ms = sec * 1000f64;
    let hours = (ms / 3_600_000f64) as u64;
    let minutes = ((ms % 3_600_000f64) / 60_000f64) as u64;
    let seconds = ((ms % 60_000f64) / 1_000f64) as u64;
    let milliseconds = (ms % 1_000f64) as u64;

    format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
}
