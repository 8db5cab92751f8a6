use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::config::SenderConfig;
use crate::crypto::{CipherMode, SharedSecret};
use crate::packet::ErrorCode;
use crate::test_utils::{self, SimulatedReceiver};
use crate::util::Ratio;

struct Harness {
    connection: Arc<StreamConnection>,
    receiver: Arc<SimulatedReceiver>,
    state: PaymentSharedState,
    source_address: InterledgerAddress,
    source_denomination: Denomination,
}

impl Harness {
    fn new(build: impl FnOnce(SharedSecret) -> SimulatedReceiver) -> Self {
        let secret = SharedSecret::random();
        let connection = Arc::new(StreamConnection::new(
            test_utils::receiver_address(),
            secret.clone(),
        ));
        Self {
            connection,
            receiver: Arc::new(build(secret)),
            state: PaymentSharedState::new(&SenderConfig::default(), 0),
            source_address: test_utils::sender_address(),
            source_denomination: test_utils::source_denomination(),
        }
    }

    async fn probe(&self, config: ProbeConfig) -> ProbeOutcome {
        let context = ProbeContext {
            connection: &self.connection,
            dispatcher: Arc::new(PacketDispatcher::new(
                self.receiver.clone(),
                self.connection.clone(),
                CipherMode::default(),
                Duration::from_secs(30),
            )),
            source_address: &self.source_address,
            source_denomination: &self.source_denomination,
            min_packet_amount: 1,
        };
        ExchangeRateProber::new(config).probe(context, &self.state).await
    }
}

#[test_log::test(tokio::test)]
async fn learns_rate_capacity_and_asset() {
    let harness = Harness::new(|secret| {
        SimulatedReceiver::new(secret, Ratio::new(3, 2).unwrap()).with_max_packet_amount(5_000)
    });

    let outcome = harness.probe(ProbeConfig::default()).await;

    assert_eq!(outcome.probes_sent, 14);
    assert_eq!(outcome.replies, 14);
    assert_eq!(harness.receiver.prepares(), 14);
    assert_eq!(harness.receiver.fulfilled(), 0, "probes never move value");
    assert_eq!(outcome.max_packet_amount, Some(5_000));
    assert_eq!(outcome.verified_packet_amount, 1_000);
    assert_eq!(
        outcome.destination_denomination,
        Some(Denomination::new("EUR", 6))
    );
    let bounds = outcome.rate_bounds.expect("some probes reached the receiver");
    assert_eq!(bounds.lower, Ratio::new(3, 2).unwrap());
    assert!(bounds.upper <= Ratio::new(1_501, 1_000).unwrap());
    assert_eq!(harness.connection.last_sequence(), 14);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn partial_results_after_the_deadline() {
    let harness = Harness::new(|secret| {
        SimulatedReceiver::new(secret, Ratio::new(2, 1).unwrap()).hanging_above(1_000)
    });
    let config = ProbeConfig {
        timeout_ms: 200,
        ..ProbeConfig::default()
    };

    let outcome = harness.probe(config).await;

    assert_eq!(outcome.probes_sent, 14);
    // 1000, 100, 10, 1 and 0
    assert_eq!(outcome.replies, 5);
    assert_eq!(outcome.max_packet_amount, None);
    assert_eq!(
        outcome.rate_bounds.map(|bounds| bounds.lower),
        Ratio::new(2, 1)
    );
}

#[tokio::test]
async fn rejected_probes_still_produce_an_outcome() {
    let harness = Harness::new(|secret| {
        SimulatedReceiver::new(secret, Ratio::new(1, 1).unwrap())
            .rejecting_with(ErrorCode::T01_PEER_UNREACHABLE)
    });

    let outcome = harness.probe(ProbeConfig::default()).await;

    assert_eq!(outcome.replies, 14);
    assert_eq!(outcome.rate_bounds, None);
    assert_eq!(outcome.max_packet_amount, None);
    assert_eq!(outcome.destination_denomination, None);
}

#[tokio::test]
async fn closed_connection_sends_nothing() {
    let harness = Harness::new(|secret| SimulatedReceiver::new(secret, Ratio::new(1, 1).unwrap()));
    harness.connection.close();

    let outcome = harness.probe(ProbeConfig::default()).await;

    assert_eq!(outcome.probes_sent, 0);
    assert_eq!(harness.receiver.prepares(), 0);
}

#[test]
fn default_series_descends_to_zero() {
    let config = ProbeConfig::default();
    assert_eq!(config.amounts.first(), Some(&1_000_000_000_000));
    assert_eq!(&config.amounts[11..], &[10, 1, 0]);
    assert!(config.amounts.windows(2).all(|pair| pair[0] > pair[1]));
}
