//! # Demo Summary
//!
//! Per-command statistics gathered by streaming a whole demo.

use std::collections::BTreeMap;

use demoscope_protocol::FormatVariant;

use crate::container::{DemoFile, Packet};
use crate::error::DemoError;

/// Counters for one message type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandStats {
    /// Packets seen.
    pub packets: usize,
    /// Payload bytes after decompression.
    pub bytes: usize,
    /// Packets stored compressed.
    pub compressed: usize,
    /// Packets whose payload failed to expand.
    pub failed: usize,
    /// Sub-frames found inside these packets.
    pub subframes: usize,
}

/// Statistics for a whole demo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoSummary {
    /// Format variant.
    pub variant: FormatVariant,
    /// Summary offset from the header.
    pub summary_offset: i32,
    /// Size of the demo in bytes.
    pub total_bytes: usize,
    /// Packets read.
    pub packets: usize,
    /// Tick of the first packet.
    pub first_tick: Option<u32>,
    /// Tick of the last packet.
    pub last_tick: Option<u32>,
    /// Counters keyed by message type.
    pub commands: BTreeMap<u32, CommandStats>,
    /// Sub-frame counts keyed by kind.
    pub subframe_kinds: BTreeMap<u32, usize>,
    /// Wrapper payloads whose sub-frames could not all be tokenized.
    pub subframe_errors: usize,
    /// Offset of the malformed packet that ended the stream early.
    pub malformed_at: Option<usize>,
}

impl DemoSummary {
    /// Streams the rest of `demo` and counts what it holds.
    pub fn collect(demo: &mut DemoFile<'_>) -> Self {
        Self::collect_with(demo, |_| {})
    }

    /// Like [`DemoSummary::collect`], handing every packet to `inspect`
    /// once it has been counted.
    pub fn collect_with<F: FnMut(&Packet<'_>)>(demo: &mut DemoFile<'_>, mut inspect: F) -> Self {
        let mut summary = Self {
            variant: demo.variant(),
            summary_offset: demo.summary_offset(),
            total_bytes: demo.len(),
            packets: 0,
            first_tick: None,
            last_tick: None,
            commands: BTreeMap::new(),
            subframe_kinds: BTreeMap::new(),
            subframe_errors: 0,
            malformed_at: None,
        };

        while demo.good() {
            let mut packet = match demo.get() {
                Ok(packet) => packet,
                Err(DemoError::Envelope { offset, .. }) => {
                    summary.malformed_at = Some(offset);
                    break;
                }
                Err(_) => break,
            };

            summary.packets += 1;
            summary.first_tick.get_or_insert(packet.tick());
            summary.last_tick = Some(packet.tick());

            let stats = summary.commands.entry(packet.message_type()).or_default();
            stats.packets += 1;
            stats.bytes += packet.size();
            stats.compressed += usize::from(packet.was_compressed());
            stats.failed += usize::from(packet.uncompress_error().is_some());

            if let Some(reader) = packet.subframes() {
                for frame in &mut *reader {
                    match frame {
                        Ok(frame) => {
                            stats.subframes += 1;
                            *summary.subframe_kinds.entry(frame.kind).or_default() += 1;
                        }
                        Err(_) => summary.subframe_errors += 1,
                    }
                }
                reader.restart();
            }

            inspect(&packet);
        }

        summary
    }

    /// Packets stored compressed, over all types.
    #[must_use]
    pub fn compressed_packets(&self) -> usize {
        self.commands.values().map(|s| s.compressed).sum()
    }

    /// Packets whose payload failed to expand, over all types.
    #[must_use]
    pub fn failed_decompressions(&self) -> usize {
        self.commands.values().map(|s| s.failed).sum()
    }

    /// Sub-frames found, over all types.
    #[must_use]
    pub fn subframes(&self) -> usize {
        self.commands.values().map(|s| s.subframes).sum()
    }
}
