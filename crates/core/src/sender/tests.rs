use std::sync::Arc;

use testresult::TestResult;

use super::*;
use crate::connection::MAX_SEQUENCE;
use crate::crypto::CipherMode;
use crate::packet::ErrorCode;
use crate::test_utils::{self, SimulatedReceiver};
use crate::util::Ratio;

struct Harness {
    receiver: Arc<SimulatedReceiver>,
    registry: Arc<ConnectionRegistry>,
    secret: SharedSecret,
    sender: StreamSender,
}

impl Harness {
    fn new(
        config: SenderConfig,
        build: impl FnOnce(SharedSecret) -> SimulatedReceiver,
    ) -> anyhow::Result<Self> {
        let secret = SharedSecret::random();
        let receiver = Arc::new(build(secret.clone()));
        let registry = Arc::new(ConnectionRegistry::new());
        let source = SourceAccount {
            address: test_utils::sender_address(),
            denomination: test_utils::source_denomination(),
        };
        let sender = StreamSender::new(receiver.clone(), registry.clone(), source, config)?;
        Ok(Self {
            receiver,
            registry,
            secret,
            sender,
        })
    }

    fn at_rate(numerator: u64, denominator: u64) -> anyhow::Result<Self> {
        let rate = Ratio::new(numerator, denominator).ok_or_else(|| anyhow::anyhow!("bad rate"))?;
        Self::new(SenderConfig::default(), |secret| {
            SimulatedReceiver::new(secret, rate)
        })
    }

    async fn send(&self, amount: u64) -> SendMoneyResult {
        self.sender
            .send_money(SendMoneyRequest {
                destination: test_utils::receiver_address(),
                shared_secret: self.secret.clone(),
                amount,
            })
            .await
    }
}

fn rate(numerator: u64, denominator: u64) -> Ratio {
    Ratio::new(numerator, denominator).unwrap()
}

#[test_log::test(tokio::test)]
async fn delivers_the_full_amount() -> TestResult {
    let harness = Harness::at_rate(2, 1)?;

    let result = harness.send(10_000).await;

    assert_eq!(result.outcome, PaymentOutcome::Completed);
    assert!(result.successful_payment());
    assert_eq!(result.amount_sent, 10_000);
    assert_eq!(result.amount_delivered, 20_000);
    assert_eq!(harness.receiver.total_received(), 20_000);
    assert_eq!(result.rejected_packets, 0);
    assert_eq!(result.fulfilled_packets as usize, harness.receiver.fulfilled());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn packets_respect_the_path_maximum() -> TestResult {
    let harness = Harness::new(SenderConfig::default(), |secret| {
        SimulatedReceiver::new(secret, rate(3, 2)).with_max_packet_amount(5_000)
    })?;

    let result = harness.send(50_000).await;

    assert!(result.successful_payment());
    assert!(harness.receiver.largest_fulfilled() <= 5_000);
    assert!(result.fulfilled_packets >= 10);
    assert_eq!(result.amount_delivered, harness.receiver.total_received());
    // floor(a * 3/2) per packet never falls below 3/2 of the whole minus one unit per packet
    assert!(result.amount_delivered >= 75_000 - result.fulfilled_packets);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn works_with_either_tag_placement() -> TestResult {
    let harness = Harness::new(SenderConfig::default(), |secret| {
        SimulatedReceiver::new(secret, rate(1, 1)).with_cipher_mode(CipherMode::NonceCiphertextTag)
    })?;

    let result = harness.send(2_500).await;

    assert!(result.successful_payment());
    assert_eq!(result.amount_delivered, 2_500);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn final_reject_stops_the_payment() -> TestResult {
    let harness = Harness::new(SenderConfig::default(), |secret| {
        SimulatedReceiver::new(secret, rate(1, 1)).rejecting_payments_with(ErrorCode::F02_UNREACHABLE)
    })?;

    let result = harness.send(10_000).await;

    assert_eq!(
        result.outcome,
        PaymentOutcome::Failed(SendState::FinalReject(ErrorCode::F02_UNREACHABLE))
    );
    assert!(!result.successful_payment());
    assert_eq!(result.amount_sent, 0);
    assert_eq!(result.amount_delivered, 0);
    assert!(result.rejected_packets >= 1);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn gives_up_after_repeated_transient_failures() -> TestResult {
    let config = SenderConfig {
        max_transient_failures: 4,
        ..SenderConfig::default()
    };
    let harness = Harness::new(config, |secret| {
        SimulatedReceiver::new(secret, rate(1, 1))
            .rejecting_payments_with(ErrorCode::T01_PEER_UNREACHABLE)
    })?;

    let result = harness.send(10_000).await;

    assert_eq!(
        result.outcome,
        PaymentOutcome::Failed(SendState::TooManyTransientFailures)
    );
    assert!(result.rejected_packets >= 4);
    assert_eq!(result.amount_delivered, 0);
    Ok(())
}

#[tokio::test]
async fn exhausted_connection_sends_nothing() -> TestResult {
    let harness = Harness::at_rate(1, 1)?;
    harness
        .registry
        .resume(&test_utils::receiver_address(), &harness.secret, MAX_SEQUENCE);

    let result = harness.send(1_000).await;

    assert_eq!(
        result.outcome,
        PaymentOutcome::Failed(SendState::ConnectionClosed)
    );
    assert_eq!(harness.receiver.prepares(), 0);
    Ok(())
}

#[tokio::test]
async fn closed_connection_sends_nothing() -> TestResult {
    let harness = Harness::at_rate(1, 1)?;
    harness
        .registry
        .get_or_create(&test_utils::receiver_address(), &harness.secret)
        .close();

    let result = harness.send(1_000).await;

    assert_eq!(
        result.outcome,
        PaymentOutcome::Failed(SendState::ConnectionClosed)
    );
    assert_eq!(harness.receiver.prepares(), 0);
    assert!(harness
        .sender
        .probe(&test_utils::receiver_address(), &harness.secret)
        .await
        .is_err());
    Ok(())
}

#[tokio::test]
async fn unknown_rate_without_probing() -> TestResult {
    let mut config = SenderConfig::default();
    config.probe.enabled = false;
    let harness = Harness::new(config, |secret| SimulatedReceiver::new(secret, rate(1, 1)))?;

    let result = harness.send(1_000).await;

    assert_eq!(
        result.outcome,
        PaymentOutcome::Failed(SendState::ExchangeRateUnknown)
    );
    assert_eq!(harness.receiver.prepares(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn refuses_a_path_below_the_minimum_rate() -> TestResult {
    let config = SenderConfig {
        min_exchange_rate: Some(3.0),
        ..SenderConfig::default()
    };
    let harness = Harness::new(config, |secret| SimulatedReceiver::new(secret, rate(2, 1)))?;

    let result = harness.send(1_000).await;

    assert_eq!(
        result.outcome,
        PaymentOutcome::Failed(SendState::InsufficientExchangeRate)
    );
    assert_eq!(harness.receiver.fulfilled(), 0);
    assert_eq!(result.amount_sent, 0);
    Ok(())
}

#[tokio::test]
async fn zero_amount_completes_immediately() -> TestResult {
    let harness = Harness::at_rate(1, 1)?;

    let result = harness.send(0).await;

    assert_eq!(result.outcome, PaymentOutcome::Completed);
    assert!(result.successful_payment());
    assert_eq!(harness.receiver.prepares(), 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn peer_close_ends_the_payment() -> TestResult {
    let harness = Harness::new(SenderConfig::default(), |secret| {
        SimulatedReceiver::new(secret, rate(1, 1)).closing_connection()
    })?;

    let result = harness.send(100_000).await;

    assert_eq!(
        result.outcome,
        PaymentOutcome::Failed(SendState::PeerClosedConnection)
    );
    assert!(result.amount_delivered > 0);
    assert!(result.amount_sent < 100_000);
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn deadline_during_probing() -> TestResult {
    let config = SenderConfig {
        payment_timeout_ms: Some(100),
        ..SenderConfig::default()
    };
    let harness = Harness::new(config, |secret| {
        SimulatedReceiver::new(secret, rate(1, 1)).hanging_above(0)
    })?;

    let result = harness.send(1_000).await;

    assert_eq!(result.outcome, PaymentOutcome::TimedOut);
    assert_eq!(result.amount_sent, 0);
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn deadline_while_packets_hang() -> TestResult {
    let mut config = SenderConfig {
        payment_timeout_ms: Some(1_000),
        packet_timeout_ms: 2_000,
        ..SenderConfig::default()
    };
    config.probe.amounts = vec![1_000, 100];
    config.probe.timeout_ms = 50;
    let harness = Harness::new(config, |secret| {
        SimulatedReceiver::new(secret, rate(1, 1)).hanging_above(500)
    })?;

    let result = harness.send(10_000).await;

    assert_eq!(result.outcome, PaymentOutcome::TimedOut);
    assert_eq!(result.amount_delivered, 0);
    // hung packets still resolve through the packet timeout
    assert!(result.errored_packets >= 1);
    Ok(())
}

#[test]
fn request_validation() {
    let secret = [7u8; 32];
    assert!(SendMoneyRequest::new("test.receiver", &secret, 10).is_ok());
    assert!(SendMoneyRequest::new("", &secret, 10).is_err());
    assert!(SendMoneyRequest::new("test.receiver", &secret[..16], 10).is_err());
}

#[test]
fn invalid_config_is_refused() {
    let config = SenderConfig {
        max_slippage: 1.5,
        ..SenderConfig::default()
    };
    let secret = SharedSecret::random();
    let receiver = Arc::new(SimulatedReceiver::new(secret, rate(1, 1)));
    let source = SourceAccount {
        address: test_utils::sender_address(),
        denomination: test_utils::source_denomination(),
    };
    assert!(StreamSender::new(receiver, Arc::new(ConnectionRegistry::new()), source, config).is_err());
}
