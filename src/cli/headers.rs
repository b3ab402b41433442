use anyhow::{Result, bail};

use vorbisdur::process::extract::{Extractor, Packet};

use crate::input::InputReader;

/// The three header packets opening every Ogg Vorbis stream.
pub struct HeaderPackets {
    pub identification: Vec<u8>,
    pub setup: Vec<u8>,
}

/// Reads from the input until the identification, comment and setup header
/// packets have all been extracted. The comment header is discarded.
///
/// Returns the primed extractor alongside the headers so callers can keep
/// draining audio packets from the same input position.
pub fn collect_headers(
    input: &mut InputReader,
    extractor: &mut Extractor,
) -> Result<HeaderPackets> {
    let mut headers: Vec<Packet> = Vec::new();

    input.process_chunks(64 * 1024, |chunk| {
        extractor.push_bytes(chunk);

        for packet in extractor.by_ref() {
            let packet = packet?;
            headers.push(packet);
            if headers.len() == 3 {
                return Ok(false);
            }
        }

        Ok(true)
    })?;

    if headers.len() < 3 {
        bail!("Input ended before all three Vorbis header packets were found");
    }

    let mut headers = headers.into_iter();
    let identification = headers.next().map(|p| p.data).unwrap_or_default();
    let setup = headers.nth(1).map(|p| p.data).unwrap_or_default();

    Ok(HeaderPackets {
        identification,
        setup,
    })
}
