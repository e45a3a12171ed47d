//! Integration tests for the CAT dialect library
//!
//! These tests exercise the public API across modules:
//! - Framing of realistic client traffic split at arbitrary points
//! - Status-word consistency between the narrow and wide records
//! - WinKeyer decoding independent of chunk boundaries
//! - SO2R prefix swapping and mode table symmetry

use cat_protocol::status_word::{StatusRecord, NARROW_LEN, WIDE_LEN};
use cat_protocol::{
    so2r, CatCodec, DemodMode, Dialect, OtrspCodec, ProtocolCodec, StatusWordPair,
    WinKeyerDecoder, WinKeyerEvent,
};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Push `chunks` one after another, collecting every frame extracted
    pub fn frames_from_chunks(chunks: &[&[u8]]) -> Vec<String> {
        let mut codec = CatCodec::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            codec.push_bytes(chunk);
            while let Some(frame) = codec.next_command() {
                frames.push(frame.into_string());
            }
        }
        frames
    }

    /// Feed bytes to a fresh decoder in chunks of `size`
    pub fn winkeyer_events(bytes: &[u8], size: usize) -> Vec<WinKeyerEvent> {
        let mut dec = WinKeyerDecoder::new();
        bytes.chunks(size).flat_map(|c| dec.feed(c)).collect()
    }
}

// ============================================================================
// Framing
// ============================================================================

mod framing_tests {
    use super::*;

    #[test]
    fn test_frames_after_second_chunk() {
        let mut codec = CatCodec::new();
        codec.push_bytes(b"FA0001425");
        assert!(codec.next_command().is_none());

        codec.push_bytes(b"0000;MD3;");
        let first = codec.next_command().unwrap();
        let second = codec.next_command().unwrap();
        assert_eq!(first.as_str(), "FA00014250000;");
        assert_eq!(second.as_str(), "MD3;");
        assert!(codec.next_command().is_none());
    }

    #[test]
    fn test_logger_poll_burst() {
        let frames = helpers::frames_from_chunks(&[b"FA;FB;IF;", b"ZZ", b"IF;ZZMD;"]);
        assert_eq!(frames, vec!["FA;", "FB;", "IF;", "ZZIF;", "ZZMD;"]);
    }

    #[test]
    fn test_dialect_per_frame() {
        let mut codec = CatCodec::new();
        codec.push_bytes(b"MD;ZZMD;");
        assert_eq!(codec.next_command().unwrap().dialect(), Dialect::Narrow);
        assert_eq!(codec.next_command().unwrap().dialect(), Dialect::Wide);
    }

    #[test]
    fn test_otrsp_stream() {
        let mut codec = OtrspCodec::new();
        codec.push_bytes(b"RX2R\r?TX\r");
        let first = codec.next_command().unwrap();
        assert_eq!((first.keyword.as_str(), first.value.as_str()), ("RX", "2R"));
        let second = codec.next_command().unwrap();
        assert!(second.query);
        assert_eq!(second.keyword, "TX");
    }
}

// ============================================================================
// Status Words
// ============================================================================

mod status_word_tests {
    use super::*;

    #[test]
    fn test_records_stay_in_step() {
        let mut pair = StatusWordPair::new();
        pair.update("Freq", "14250000").unwrap();
        pair.update("DemodMode0K", "7").unwrap();
        pair.update("RITFreq", "-125").unwrap();
        pair.update("RITStat", "1").unwrap();

        let narrow = StatusRecord::decode(Dialect::Narrow, pair.narrow()).unwrap();
        let wide = StatusRecord::decode(Dialect::Wide, pair.wide()).unwrap();
        assert_eq!(narrow.frequency_hz, wide.frequency_hz);
        assert_eq!(narrow.rit_offset, -125);
        assert_eq!(wide.rit_offset, -125);
        assert_eq!(narrow.mode, "7");
        assert_eq!(wide.mode, "03");
        assert_eq!(&pair.narrow()[15..22], "-001251");
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn amateur_frequency() -> impl Strategy<Value = u64> {
        prop_oneof![
            1_800_000u64..2_000_000u64,
            3_500_000u64..4_000_000u64,
            7_000_000u64..7_300_000u64,
            14_000_000u64..14_350_000u64,
            21_000_000u64..21_450_000u64,
            28_000_000u64..29_700_000u64,
            50_000_000u64..54_000_000u64,
        ]
    }

    fn demod_mode() -> impl Strategy<Value = DemodMode> {
        prop_oneof![
            Just(DemodMode::Lsb),
            Just(DemodMode::Usb),
            Just(DemodMode::Cw),
            Just(DemodMode::Am),
            Just(DemodMode::Sam),
            Just(DemodMode::Fm),
            Just(DemodMode::Nfm),
            Just(DemodMode::Dfm),
            Just(DemodMode::DigL),
            Just(DemodMode::DigU),
            Just(DemodMode::Fdv),
            Just(DemodMode::Rtty),
        ]
    }

    fn status_record(dialect: Dialect) -> impl Strategy<Value = StatusRecord> {
        (
            (amateur_frequency(), 0u16..=9999, -99_999i32..=99_999, any::<bool>(), any::<bool>()),
            (0u8..=9, 0u8..=99, any::<bool>(), demod_mode(), any::<bool>()),
            (0u8..=1, 0u8..=9, 0u8..=1, 0u8..=9, 0u8..=99, 0u8..=9),
        )
            .prop_map(move |(a, b, c)| {
                let (frequency_hz, step, rit_offset, rit_enabled, xit_enabled) = a;
                let (bank1, bank2, mox, mode, cw_lower) = b;
                let (active_rx, scan, active_tx, ctcss, tone, shift) = c;
                let mode = match dialect {
                    Dialect::Narrow => mode.narrow_code(cw_lower).to_string(),
                    Dialect::Wide => mode.wide_code(cw_lower).to_string(),
                };
                StatusRecord {
                    dialect,
                    frequency_hz,
                    step,
                    rit_offset,
                    rit_enabled,
                    xit_enabled,
                    bank1,
                    bank2,
                    mox,
                    mode,
                    active_rx,
                    scan,
                    active_tx,
                    ctcss,
                    tone,
                    shift,
                }
            })
    }

    fn dialect() -> impl Strategy<Value = Dialect> {
        prop_oneof![Just(Dialect::Narrow), Just(Dialect::Wide)]
    }

    fn status_update() -> impl Strategy<Value = (&'static str, String)> {
        prop_oneof![
            amateur_frequency().prop_map(|hz| ("Freq", hz.to_string())),
            (-9999i32..=9999).prop_map(|o| ("RITFreq", o.to_string())),
            any::<bool>().prop_map(|b| ("RITStat", u8::from(b).to_string())),
            any::<bool>().prop_map(|b| ("XITStat", u8::from(b).to_string())),
            any::<bool>().prop_map(|b| ("MOX", u8::from(b).to_string())),
            (0u8..=1).prop_map(|d| ("ActiveRX", d.to_string())),
            (0u8..=1).prop_map(|d| ("ActiveTX", d.to_string())),
            (0u32..=20000).prop_map(|s| ("TuneStep", s.to_string())),
            prop::sample::select(vec!["1", "2", "3", "4", "5", "6", "7", "9"])
                .prop_map(|m| ("DemodMode0K", m.to_string())),
            prop::sample::select(vec!["00", "01", "03", "04", "05", "06", "07", "09"])
                .prop_map(|m| ("DemodMode", m.to_string())),
        ]
    }

    proptest! {
        #[test]
        fn status_record_round_trips(record in dialect().prop_flat_map(status_record)) {
            let encoded = record.encode();
            let expected_len = match record.dialect {
                Dialect::Narrow => NARROW_LEN,
                Dialect::Wide => WIDE_LEN,
            };
            prop_assert_eq!(encoded.len(), expected_len);
            prop_assert_eq!(StatusRecord::decode(record.dialect, &encoded).unwrap(), record);
        }

        #[test]
        fn status_pair_stays_consistent(updates in prop::collection::vec(status_update(), 1..20)) {
            let mut pair = StatusWordPair::new();
            for (prop, value) in &updates {
                pair.update(prop, value).unwrap();
            }

            let narrow = StatusRecord::decode(Dialect::Narrow, pair.narrow()).unwrap();
            let wide = StatusRecord::decode(Dialect::Wide, pair.wide()).unwrap();
            prop_assert_eq!(pair.narrow().len(), NARROW_LEN);
            prop_assert_eq!(pair.wide().len(), WIDE_LEN);
            prop_assert_eq!(narrow.frequency_hz, wide.frequency_hz);
            prop_assert_eq!(narrow.step, wide.step);
            prop_assert_eq!(narrow.rit_offset, wide.rit_offset);
            prop_assert_eq!(narrow.rit_enabled, wide.rit_enabled);
            prop_assert_eq!(narrow.mox, wide.mox);
            prop_assert_eq!(narrow.active_rx, wide.active_rx);
            prop_assert_eq!(narrow.active_tx, wide.active_tx);
            prop_assert_eq!(
                cat_protocol::mode::narrow_to_wide(&narrow.mode).unwrap(),
                wide.mode.as_str()
            );
        }

        #[test]
        fn so2r_remap_is_involution(prefix in "(ZZ)?[A-Z]{2}") {
            prop_assert_eq!(so2r::remap(so2r::remap(&prefix)), prefix.as_str());
        }

        #[test]
        fn framing_ignores_chunk_boundaries(
            hz in amateur_frequency(),
            split in 0usize..40,
        ) {
            let stream = format!("FA{:011};MD3;ZZFB{:011};", hz, hz);
            let split = split.min(stream.len());
            let (a, b) = stream.as_bytes().split_at(split);
            let frames = helpers::frames_from_chunks(&[a, b]);
            prop_assert_eq!(frames, vec![
                format!("FA{:011};", hz),
                "MD3;".to_string(),
                format!("ZZFB{:011};", hz),
            ]);
        }

        #[test]
        fn winkeyer_command_resumable(
            command in prop_oneof![
                (Just(0x02u8), 5u8..=99).prop_map(|(op, wpm)| vec![op, wpm]),
                (Just(0x04u8), any::<u8>(), any::<u8>()).prop_map(|(op, a, b)| vec![op, a, b]),
                (Just(0x05u8), 0u8..=0x1F, 0u8..=0x1F, 0u8..=0x1F)
                    .prop_map(|(op, a, b, c)| vec![op, a, b, c]),
                Just(vec![0x00u8, 0x02]),
                Just(vec![0x07u8]),
                Just(vec![0x15u8]),
                (Just(0x16u8), 1u8..=3, any::<u8>()).prop_map(|(op, s, a)| vec![op, s, a]),
            ]
        ) {
            let whole = helpers::winkeyer_events(&command, command.len());
            let bytewise = helpers::winkeyer_events(&command, 1);
            prop_assert_eq!(whole, bytewise);
        }
    }
}
