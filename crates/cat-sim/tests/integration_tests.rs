//! Integration tests for the simulated radio
//!
//! These tests run a gateway context on top of [`SimRadio`]:
//! - Radio-side changes reaching the canonical state
//! - Slice creation acknowledged by the simulation
//! - CW keyer progress delivered to keyer subscribers

use std::sync::Arc;
use std::time::Duration;

use cat_gateway::{
    DescriptorTable, GatewayConfig, GatewayContext, KeyerNotification, PollConfig,
    ProcessorConfig, RadioState,
};
use cat_protocol::DemodMode;
use cat_sim::{SimRadio, SimRadioConfig, SimSlice};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub fn config(char_time_ms: u64) -> SimRadioConfig {
        SimRadioConfig {
            serial: "TEST".to_string(),
            slices: vec![SimSlice {
                frequency_hz: 14_025_000,
                mode: DemodMode::Cw,
            }],
            acknowledge_slices: true,
            char_time_ms,
        }
    }

    /// Simulated radio with a running gateway on top
    pub fn gateway(config: SimRadioConfig) -> (Arc<SimRadio>, Arc<GatewayContext>) {
        let (radio, notifications) = SimRadio::start(config);
        let gateway_config = GatewayConfig {
            dispatch_interval: Duration::from_millis(1),
            processor: ProcessorConfig {
                interlock_poll: PollConfig::new(10, Duration::from_millis(1)),
                slice_ack_poll: PollConfig::new(50, Duration::from_millis(2)),
            },
            radio: RadioState::default(),
        };
        let ctx = GatewayContext::new(gateway_config, DescriptorTable::builtin(), radio.clone());
        ctx.spawn_notification_pump(notifications);
        (radio, ctx)
    }

    pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

// ============================================================================
// Gateway Tests
// ============================================================================

mod gateway_tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_slice_reaches_gateway() {
        let (_radio, ctx) = helpers::gateway(helpers::config(10));
        assert!(helpers::eventually(|| ctx.processor.state().has_slice(0)).await);
        assert_eq!(ctx.processor.execute("FA;").await, "FA00014025000;");
        assert_eq!(ctx.processor.execute("MD;").await, "MD3;");
    }

    #[tokio::test]
    async fn test_commands_reach_radio() {
        let (radio, ctx) = helpers::gateway(helpers::config(10));
        assert!(helpers::eventually(|| ctx.processor.state().has_slice(0)).await);

        ctx.processor.execute("FA00007030000;").await;
        ctx.processor.execute("KS030;").await;
        ctx.processor.execute("MD7;").await;
        assert_eq!(radio.slice(0).unwrap().frequency_hz, 7_030_000);
        assert_eq!(radio.cw_speed(), 30);
        assert!(radio.cw_lower());
    }

    #[tokio::test]
    async fn test_front_panel_tuning_updates_status() {
        let (radio, ctx) = helpers::gateway(helpers::config(10));
        assert!(helpers::eventually(|| ctx.processor.state().has_slice(0)).await);

        radio.tune(0, 21_030_000);
        assert!(helpers::eventually(|| {
            ctx.processor.state().slice_state(0).map(|s| s.frequency_hz) == Some(21_030_000)
        })
        .await);
        let reply = ctx.processor.execute("ZZIF;").await;
        assert_eq!(&reply[4..15], "00021030000");
    }

    #[tokio::test]
    async fn test_transmit_slice_created_on_demand() {
        let (radio, ctx) = helpers::gateway(helpers::config(10));
        assert!(helpers::eventually(|| ctx.processor.state().has_slice(0)).await);

        assert_eq!(ctx.processor.execute("FT1;").await, "");
        assert!(radio.slice(1).is_some_and(|s| s.active_tx));
        assert_eq!(ctx.processor.execute("FT;").await, "FT1;");
    }

    #[tokio::test]
    async fn test_transmit_slice_refused_without_ack() {
        let config = SimRadioConfig {
            acknowledge_slices: false,
            ..helpers::config(10)
        };
        let (_radio, ctx) = helpers::gateway(config);
        assert!(helpers::eventually(|| ctx.processor.state().has_slice(0)).await);
        assert_eq!(ctx.processor.execute("FT1;").await, "?;");
    }

    #[tokio::test]
    async fn test_cw_progress_reaches_keyer_subscribers() {
        let (radio, ctx) = helpers::gateway(helpers::config(1));
        let mut keyer = ctx.processor.subscribe_keyer();

        ctx.processor.execute("KY CQ;").await;
        for _ in 0..2 {
            let n = tokio::time::timeout(Duration::from_secs(1), keyer.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(n, KeyerNotification::CharSent);
        }
        assert_eq!(radio.cw_text(), "CQ");
    }

    #[tokio::test]
    async fn test_radio_side_keying_sets_mox() {
        let (radio, ctx) = helpers::gateway(helpers::config(10));
        radio.key(true);
        assert!(helpers::eventually(|| ctx.processor.state().radio_snapshot().mox).await);
        assert_eq!(ctx.processor.execute("ZZTX;").await, "ZZTX1;");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn gateway_follows_front_panel(tunes in prop::collection::vec(1_800_000u64..54_000_000, 1..8)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let (radio, ctx) = helpers::gateway(helpers::config(10));
                for &hz in &tunes {
                    radio.tune(0, hz);
                }
                let last = *tunes.last().unwrap();
                let done = helpers::eventually(|| {
                    ctx.processor.state().slice_state(0).map(|s| s.frequency_hz) == Some(last)
                })
                .await;
                prop_assert!(done);
                prop_assert_eq!(radio.slice(0).unwrap().frequency_hz, last);
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
