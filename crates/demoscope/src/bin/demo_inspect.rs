//! # Demo Inspector
//!
//! Command-line tool printing what a demo file holds.

use std::sync::Arc;

use demoscope::{DemoCommand, DemoFile, DemoSummary, ParserConfig, Registries};

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         DEMOSCOPE INSPECTOR                                      ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        println!("Usage: demo_inspect <file.dem>");
        println!();
        println!("Options:");
        println!("  --verbose          Show every packet");
        println!("  --config <file>    Parser settings (TOML)");
        return;
    }

    let demo_path = &args[1];
    let verbose = args.iter().any(|a| a == "--verbose");
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1));

    let config = match config_path {
        Some(path) => match ParserConfig::from_toml_file(path) {
            Ok(c) => c,
            Err(e) => {
                println!("Error: Could not load config {path}: {e}");
                return;
            }
        },
        None => ParserConfig::default(),
    };

    println!("Loading demo: {demo_path}");

    let mut demo = match DemoFile::open_with(demo_path, Arc::new(Registries::with_defaults()), config)
    {
        Ok(d) => d,
        Err(e) => {
            println!("Error: Could not load demo: {e}");
            return;
        }
    };

    println!();
    println!("┌─ DEMO INFO ──────────────────────────────────────────────────────┐");
    println!("│ Format:             {}", demo.variant());
    println!("│ Size:               {} bytes", demo.len());
    println!("│ Summary Offset:     {}", demo.summary_offset());
    println!("│ Scratch Buffer:     {} bytes", demo.scratch_capacity());
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    if verbose {
        println!("  {:>10}  {:>8}  {:<22} {:>8}  flags", "offset", "tick", "command", "size");
    }

    let summary = DemoSummary::collect_with(&mut demo, |packet| {
        if !verbose {
            return;
        }
        let name = packet.command().map_or("?", DemoCommand::name);
        let mut flags = String::new();
        if packet.was_compressed() {
            flags.push_str(" compressed");
        }
        if packet.uncompress_error().is_some() {
            flags.push_str(" FAILED");
        }
        if packet.is_wrapper() {
            flags.push_str(" wrapper");
        }
        println!(
            "  {:>10}  {:>8}  {:<22} {:>8} {}",
            packet.offset(),
            packet.tick(),
            format!("{name} ({})", packet.message_type()),
            packet.size(),
            flags
        );
    });

    println!();
    println!("┌─ PACKETS ────────────────────────────────────────────────────────┐");
    println!(
        "│ {:<24} {:>8} {:>12} {:>10} {:>9}",
        "command", "count", "bytes", "compressed", "subframes"
    );
    for (message_type, stats) in &summary.commands {
        let name = DemoCommand::from_u32(*message_type).map_or("?", DemoCommand::name);
        println!(
            "│ {:<24} {:>8} {:>12} {:>10} {:>9}",
            format!("{name} ({message_type})"),
            stats.packets,
            stats.bytes,
            stats.compressed,
            stats.subframes
        );
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    println!("┌─ TOTALS ─────────────────────────────────────────────────────────┐");
    println!("│ Packets:            {}", summary.packets);
    if let (Some(first), Some(last)) = (summary.first_tick, summary.last_tick) {
        println!("│ Ticks:              {first} - {last}");
    }
    println!("│ Compressed:         {}", summary.compressed_packets());
    println!("│ Failed Expansions:  {}", summary.failed_decompressions());
    println!("│ Sub-frames:         {} ({} kinds)", summary.subframes(), summary.subframe_kinds.len());
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    match summary.malformed_at {
        Some(offset) => println!("⚠ Stream ended early: malformed packet at byte {offset}"),
        None if summary.failed_decompressions() > 0 => {
            println!("⚠ {} payloads could not be expanded", summary.failed_decompressions());
        }
        None => println!("✓ Demo parsed cleanly"),
    }
}
