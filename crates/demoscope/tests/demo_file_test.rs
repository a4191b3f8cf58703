//! Integration tests for streaming demo files.

use std::sync::Arc;

use demoscope::{
    DecodeError, DemoCommand, DemoError, DemoFile, DemoSummary, DemoWriter, FormatVariant,
    Lz4Codec, Message, OpaqueMessage, PacketCategory, ParserConfig, Registries, StreamState,
    SubframeWriter, UncompressError, HEADER_SIZE,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, PartialEq)]
struct ChatMessage {
    text: String,
}

impl Message for ChatMessage {
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        String::from_utf8(bytes.to_vec())
            .map(|text| Self { text })
            .map_err(|e| DecodeError::Invalid(e.to_string()))
    }
}

fn sample_demo() -> Vec<u8> {
    let mut writer = DemoWriter::new(FormatVariant::A);
    writer.push(0, DemoCommand::FileHeader as u32, b"header");
    writer.push(0, DemoCommand::SignonPacket as u32, b"signon");
    writer.push_compressed(1, DemoCommand::FullPacket as u32, &[0x42; 4096]);
    writer.push(2, DemoCommand::ConsoleCmd as u32, b"say hi");
    writer.push(3, DemoCommand::Stop as u32, b"");
    writer.into_bytes()
}

#[test]
fn test_streams_written_packets_in_order() {
    let bytes = sample_demo();
    let mut demo = DemoFile::from_bytes(&bytes).unwrap();
    assert_eq!(demo.variant(), FormatVariant::A);
    assert_eq!(demo.state(), StreamState::HeaderValidated);
    assert!(!demo.is_owned());

    let mut seen = Vec::new();
    while demo.good() {
        let packet = demo.get().unwrap();
        seen.push((
            packet.tick(),
            packet.command(),
            packet.was_compressed(),
            packet.payload().map(<[u8]>::to_vec),
        ));
    }

    assert_eq!(seen.len(), 5);
    assert_eq!(seen[0], (0, Some(DemoCommand::FileHeader), false, Some(b"header".to_vec())));
    assert_eq!(seen[2].1, Some(DemoCommand::FullPacket));
    assert!(seen[2].2);
    assert_eq!(seen[2].3, Some(vec![0x42; 4096]));
    assert_eq!(seen[4], (3, Some(DemoCommand::Stop), false, Some(Vec::new())));

    assert_eq!(demo.state(), StreamState::Exhausted);
    assert!(matches!(demo.get(), Err(DemoError::Exhausted)));
}

#[test]
fn test_compressed_flag_cleared_after_get() {
    let bytes = sample_demo();
    let mut demo = DemoFile::from_bytes(&bytes).unwrap();
    demo.get().unwrap();
    demo.get().unwrap();

    let packet = demo.get().unwrap();
    assert!(packet.was_compressed());
    assert!(!packet.envelope().is_compressed());
    assert_eq!(packet.packet_type(), DemoCommand::FullPacket as u32);
    assert_eq!(packet.size(), 4096);
}

#[test]
fn test_path_and_buffer_constructors_agree() {
    let bytes = sample_demo();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.dem");
    std::fs::write(&path, &bytes).unwrap();

    let mut from_path = DemoFile::open(&path).unwrap();
    let mut from_buffer = DemoFile::from_bytes(&bytes).unwrap();
    assert!(from_path.is_owned());
    assert_eq!(from_path.len(), from_buffer.len());

    while from_buffer.good() {
        let expected = from_buffer.get().unwrap().into_envelope().into_owned();
        let actual = from_path.get().unwrap().into_envelope().into_owned();
        assert_eq!(actual, expected);
    }
    assert!(!from_path.good());
}

#[test]
fn test_short_file_is_too_small() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.dem");
    std::fs::write(&path, b"PBDEMS2").unwrap();

    assert!(matches!(DemoFile::open(&path), Err(DemoError::TooSmall { size: 7 })));
    assert!(matches!(DemoFile::from_bytes(&[]), Err(DemoError::TooSmall { size: 0 })));
}

#[test]
fn test_missing_file_is_io() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        DemoFile::open(dir.path().join("missing.dem")),
        Err(DemoError::Io(_))
    ));
}

#[test]
fn test_unknown_magic_is_invalid_format() {
    let mut bytes = sample_demo();
    bytes[..8].copy_from_slice(b"HL2DEMO\0");
    assert!(matches!(
        DemoFile::from_vec(bytes),
        Err(DemoError::InvalidFormat { magic }) if &magic == b"HL2DEMO\0"
    ));
}

#[test]
fn test_header_only_demo() {
    let bytes = DemoWriter::new(FormatVariant::B).into_bytes();
    let mut demo = DemoFile::from_bytes(&bytes).unwrap();
    assert!(demo.is_empty());
    assert!(!demo.good());
    assert!(matches!(demo.get(), Err(DemoError::Exhausted)));
}

#[test]
fn test_variant_b_wrapper_subframes() {
    let mut frames = SubframeWriter::new();
    frames.push(5, b"hello");
    frames.push(300, &[1, 2, 3]);
    frames.push(5, b"world");
    let wrapper = frames.into_bytes();

    let mut writer = DemoWriter::new(FormatVariant::B);
    writer.push(10, DemoCommand::SyncTick as u32, b"");
    writer.push_compressed(11, DemoCommand::Packet as u32, &wrapper);
    let bytes = writer.into_bytes();

    let mut registries = Registries::with_defaults();
    registries
        .get_mut(FormatVariant::B)
        .register::<ChatMessage>(PacketCategory::Net, 5);
    let mut demo =
        DemoFile::from_bytes_with(&bytes, Arc::new(registries), ParserConfig::default()).unwrap();

    let mut sync = demo.get().unwrap();
    assert!(!sync.is_wrapper());
    assert!(sync.subframes().is_none());
    drop(sync);

    let mut packet = demo.get().unwrap();
    assert!(packet.is_wrapper());
    let frames: Vec<_> = packet
        .subframes()
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(frames.iter().map(|f| f.kind).collect::<Vec<_>>(), vec![5, 300, 5]);
    assert_eq!(frames[1].size, 3);

    let first = packet.resolve_subframe(&frames[0]).unwrap().unwrap();
    assert_eq!(
        first.downcast_ref::<ChatMessage>(),
        Some(&ChatMessage {
            text: "hello".to_string()
        })
    );
    assert!(packet.resolve_subframe(&frames[1]).unwrap().is_none());
    let last = packet.resolve_subframe(&frames[2]).unwrap().unwrap();
    assert_eq!(last.downcast_ref::<ChatMessage>().unwrap().text, "world");
}

#[test]
fn test_variant_a_has_no_subframes() {
    let mut writer = DemoWriter::new(FormatVariant::A);
    writer.push(0, DemoCommand::Packet as u32, &[0x04, 0x00]);
    let bytes = writer.into_bytes();

    let mut demo = DemoFile::from_bytes(&bytes).unwrap();
    let mut packet = demo.get().unwrap();
    assert!(!packet.is_wrapper());
    assert!(packet.subframes().is_none());
}

#[test]
fn test_tokenizing_can_be_disabled() {
    let mut writer = DemoWriter::new(FormatVariant::B);
    let mut frames = SubframeWriter::new();
    frames.push(1, b"x");
    writer.push(0, DemoCommand::SignonPacket as u32, &frames.into_bytes());
    let bytes = writer.into_bytes();

    let config = ParserConfig {
        tokenize_wrappers: false,
        ..ParserConfig::default()
    };
    let mut demo =
        DemoFile::from_bytes_with(&bytes, Arc::new(Registries::with_defaults()), config).unwrap();
    let mut packet = demo.get().unwrap();
    assert!(packet.is_wrapper());
    assert!(packet.subframes().is_none());
}

#[test]
fn test_codec_must_match_writer() {
    let payload = b"snapshot snapshot snapshot snapshot".repeat(16);
    let mut writer = DemoWriter::with_codec(FormatVariant::B, Arc::new(Lz4Codec));
    writer.push_compressed(0, DemoCommand::FullPacket as u32, &payload);
    let bytes = writer.into_bytes();

    // Snappy is the default and rejects an LZ4 block before expanding it.
    let mut demo = DemoFile::from_bytes(&bytes).unwrap();
    let packet = demo.get().unwrap();
    assert_eq!(packet.uncompress_error(), Some(UncompressError::Malformed));
    assert_eq!(packet.payload(), None);
    drop(packet);

    let mut demo = DemoFile::from_bytes(&bytes).unwrap().with_codec(Arc::new(Lz4Codec));
    let packet = demo.get().unwrap();
    assert_eq!(packet.uncompress_error(), None);
    assert_eq!(packet.payload(), Some(&payload[..]));
}

#[test]
fn test_failed_decompression_keeps_stream_usable() {
    let mut writer = DemoWriter::new(FormatVariant::A);
    writer.push_compressed(0, DemoCommand::FullPacket as u32, &[7u8; 8192]);
    writer.push(1, DemoCommand::ConsoleCmd as u32, b"after");
    let bytes = writer.into_bytes();

    let config = ParserConfig {
        scratch_capacity: 1024,
        ..ParserConfig::default()
    };
    let mut demo =
        DemoFile::from_bytes_with(&bytes, Arc::new(Registries::with_defaults()), config).unwrap();

    let packet = demo.get().unwrap();
    assert!(packet.was_compressed());
    assert_eq!(packet.payload(), None);
    assert_eq!(packet.size(), 0);
    assert_eq!(
        packet.uncompress_error(),
        Some(UncompressError::ScratchTooSmall {
            required: 8192,
            capacity: 1024
        })
    );
    assert!(packet.resolve().unwrap().is_none());
    drop(packet);

    let next = demo.get().unwrap();
    assert_eq!(next.payload(), Some(&b"after"[..]));
}

#[test]
fn test_malformed_packet_exhausts_stream() {
    let mut bytes = sample_demo();
    bytes.extend_from_slice(&[4, 9, 50, 1, 2]);

    let mut demo = DemoFile::from_bytes(&bytes).unwrap();
    for _ in 0..5 {
        demo.get().unwrap();
    }

    let offset = demo.position();
    assert!(matches!(
        demo.get(),
        Err(DemoError::Envelope { offset: at, .. }) if at == offset
    ));
    assert_eq!(demo.state(), StreamState::Exhausted);
    assert!(!demo.good());
    assert!(matches!(demo.get(), Err(DemoError::Exhausted)));
}

#[test]
fn test_default_registry_resolves_known_commands() {
    let bytes = sample_demo();
    let mut demo = DemoFile::from_bytes(&bytes).unwrap();

    let packet = demo.get().unwrap();
    let decoded = packet.resolve().unwrap().unwrap();
    assert_eq!(decoded.category(), PacketCategory::Demo);
    assert_eq!(decoded.subtype(), DemoCommand::FileHeader as u32);
    assert_eq!(decoded.downcast_ref::<OpaqueMessage>().unwrap().bytes, b"header");
}

#[test]
fn test_unknown_command_resolves_to_none() {
    let mut writer = DemoWriter::new(FormatVariant::A);
    writer.push(0, 40, b"mystery");
    writer.push(0, DemoCommand::SpawnGroups as u32, b"b only");
    let bytes = writer.into_bytes();

    let mut demo = DemoFile::from_bytes(&bytes).unwrap();
    let packet = demo.get().unwrap();
    assert_eq!(packet.command(), None);
    assert!(packet.resolve().unwrap().is_none());
    drop(packet);

    let packet = demo.get().unwrap();
    assert_eq!(packet.command(), None);
    assert!(packet.resolve().unwrap().is_none());
}

#[test]
fn test_rewind() {
    let bytes = sample_demo();
    let mut demo = DemoFile::from_bytes(&bytes).unwrap();
    while demo.good() {
        demo.get().unwrap();
    }

    demo.rewind();
    assert_eq!(demo.position(), HEADER_SIZE);
    assert_eq!(demo.state(), StreamState::HeaderValidated);
    assert_eq!(demo.get().unwrap().command(), Some(DemoCommand::FileHeader));
    assert_eq!(demo.state(), StreamState::Streaming);
}

#[test]
fn test_random_demo_round_trip() {
    let mut rng = StdRng::seed_from_u64(0xDE30);
    let mut writer = DemoWriter::new(FormatVariant::B);
    let mut expected = Vec::new();
    let mut tick = 0u32;

    for _ in 0..300 {
        tick += rng.gen_range(0..3);
        let message_type = rng.gen_range(0..17u32);
        let len = rng.gen_range(0..2048usize);
        let payload: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'f')).collect();
        if rng.gen_bool(0.5) {
            writer.push_compressed(tick, message_type, &payload);
        } else {
            writer.push(tick, message_type, &payload);
        }
        expected.push((tick, message_type, payload));
    }

    let bytes = writer.into_bytes();
    let mut demo = DemoFile::from_bytes(&bytes).unwrap();
    for (tick, message_type, payload) in &expected {
        let packet = demo.get().unwrap();
        assert_eq!(packet.tick(), *tick);
        assert_eq!(packet.message_type(), *message_type);
        assert_eq!(packet.payload(), Some(&payload[..]));
    }
    assert!(!demo.good());
}

#[test]
fn test_summary_counts() {
    let bytes = sample_demo();
    let mut demo = DemoFile::from_bytes(&bytes).unwrap();

    let mut visited = 0;
    let summary = DemoSummary::collect_with(&mut demo, |_| visited += 1);
    assert_eq!(visited, 5);
    assert_eq!(summary.packets, 5);
    assert_eq!(summary.first_tick, Some(0));
    assert_eq!(summary.last_tick, Some(3));
    assert_eq!(summary.compressed_packets(), 1);
    assert_eq!(summary.failed_decompressions(), 0);
    assert_eq!(summary.malformed_at, None);

    let full = summary.commands[&(DemoCommand::FullPacket as u32)];
    assert_eq!(full.bytes, 4096);
    assert_eq!(full.compressed, 1);
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parser.toml");
    let config = ParserConfig {
        scratch_capacity: 65_536,
        tokenize_wrappers: true,
        warn_on_tick_regression: false,
    };
    std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

    let loaded = ParserConfig::from_toml_file(&path).unwrap();
    assert_eq!(loaded, config);

    let bytes = sample_demo();
    let demo = DemoFile::from_bytes_with(&bytes, Arc::new(Registries::new()), loaded).unwrap();
    assert_eq!(demo.scratch_capacity(), 65_536);
    assert_eq!(demo.registry().registered_count(PacketCategory::Demo), 0);
}

#[test]
fn test_zero_scratch_config_rejected() {
    let bytes = sample_demo();
    let config = ParserConfig {
        scratch_capacity: 0,
        ..ParserConfig::default()
    };
    assert!(matches!(
        DemoFile::from_bytes_with(&bytes, Arc::new(Registries::new()), config),
        Err(DemoError::Config(_))
    ));
}
