//! The payment run loop.
//!
//! [`StreamSender::send_money`] probes the path, then keeps asking the filter chain
//! whether a packet may be sent. Each packet runs on its own task; the loop only
//! waits when the chain says so. Whatever happens, the result accounts for every
//! packet that was sent, including those still in flight when the payment stopped.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use crate::config::SenderConfig;
use crate::connection::{ConnectionError, ConnectionRegistry, StreamConnection};
use crate::crypto::SharedSecret;
use crate::error::StreamError;
use crate::filter::{
    AmountFilter, AssetDetailsFilter, ExchangeRateFilter, FailureFilter, FilterChain,
    MaxPacketAmountFilter, PacingFilter, PacketDispatcher, PacketDraft, SendState,
    SequenceFilter, StreamPacketFilter, StreamPacketReply,
};
use crate::link::Link;
use crate::packet::InterledgerAddress;
use crate::probe::{ExchangeRateProber, ProbeContext, ProbeOutcome};
use crate::stream::Denomination;
use crate::tracker::PaymentSharedState;

#[cfg(test)]
mod tests;

/// The sender's own account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAccount {
    pub address: InterledgerAddress,
    pub denomination: Denomination,
}

pub struct SendMoneyRequest {
    pub destination: InterledgerAddress,
    pub shared_secret: SharedSecret,
    /// Source units to send.
    pub amount: u64,
}

impl SendMoneyRequest {
    pub fn new(destination: &str, shared_secret: &[u8], amount: u64) -> Result<Self, StreamError> {
        Ok(Self {
            destination: destination.parse()?,
            shared_secret: SharedSecret::from_slice(shared_secret)?,
            amount,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Completed,
    Failed(SendState),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMoneyResult {
    pub original_amount: u64,
    pub amount_sent: u64,
    pub amount_delivered: u64,
    pub fulfilled_packets: u64,
    pub rejected_packets: u64,
    pub errored_packets: u64,
    pub elapsed: Duration,
    pub outcome: PaymentOutcome,
}

impl SendMoneyResult {
    pub fn successful_payment(&self) -> bool {
        self.outcome == PaymentOutcome::Completed && self.amount_sent == self.original_amount
    }
}

pub struct StreamSender {
    link: Arc<dyn Link>,
    registry: Arc<ConnectionRegistry>,
    source: SourceAccount,
    config: SenderConfig,
}

impl StreamSender {
    pub fn new(
        link: Arc<dyn Link>,
        registry: Arc<ConnectionRegistry>,
        source: SourceAccount,
        config: SenderConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            link,
            registry,
            source,
            config,
        })
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    fn dispatcher(&self, connection: &Arc<StreamConnection>) -> Arc<PacketDispatcher> {
        Arc::new(PacketDispatcher::new(
            self.link.clone(),
            connection.clone(),
            self.config.cipher_mode,
            self.config.packet_timeout(),
        ))
    }

    fn probe_context<'a>(&'a self, connection: &'a Arc<StreamConnection>) -> ProbeContext<'a> {
        ProbeContext {
            connection,
            dispatcher: self.dispatcher(connection),
            source_address: &self.source.address,
            source_denomination: &self.source.denomination,
            min_packet_amount: self.config.min_packet_amount,
        }
    }

    fn payment_chain(
        &self,
        connection: &Arc<StreamConnection>,
        state: &PaymentSharedState,
    ) -> FilterChain {
        let filters: Vec<Arc<dyn StreamPacketFilter>> = vec![
            Arc::new(SequenceFilter::new(connection.clone())),
            Arc::new(FailureFilter::new(state.failures.clone())),
            Arc::new(AssetDetailsFilter::new(
                connection.clone(),
                self.source.address.clone(),
                self.source.denomination.clone(),
                state.asset_details.clone(),
            )),
            Arc::new(MaxPacketAmountFilter::new(
                state.max_packet.clone(),
                self.config.min_packet_amount,
            )),
            Arc::new(PacingFilter::new(self.config.min_packet_interval())),
            Arc::new(AmountFilter::new(
                state.amounts.clone(),
                state.exchange_rate.clone(),
                state.max_packet.clone(),
                state.congestion.clone(),
                self.config.max_slippage,
            )),
            Arc::new(ExchangeRateFilter::new(
                state.exchange_rate.clone(),
                self.config.min_exchange_rate(),
            )),
        ];
        FilterChain::new(filters, self.dispatcher(connection))
    }

    /// Probes the path to `destination` without sending any value.
    pub async fn probe(
        &self,
        destination: &InterledgerAddress,
        shared_secret: &SharedSecret,
    ) -> Result<ProbeOutcome, StreamError> {
        let connection = self.registry.get_or_create(destination, shared_secret);
        if connection.is_closed() {
            return Err(ConnectionError::Closed(connection.id().clone()).into());
        }
        let state = PaymentSharedState::new(&self.config, 0);
        let prober = ExchangeRateProber::new(self.config.probe.clone());
        Ok(prober.probe(self.probe_context(&connection), &state).await)
    }

    #[tracing::instrument(skip_all, fields(destination = %request.destination, amount = request.amount))]
    pub async fn send_money(&self, request: SendMoneyRequest) -> SendMoneyResult {
        let started = Instant::now();
        let deadline = self.config.payment_timeout().map(|timeout| started + timeout);
        let connection = self
            .registry
            .get_or_create(&request.destination, &request.shared_secret);
        let state = PaymentSharedState::new(&self.config, request.amount);

        if connection.is_closed() {
            tracing::warn!(connection = %connection.id(), "connection is closed");
            return finish(&state, started, PaymentOutcome::Failed(SendState::ConnectionClosed));
        }
        tracing::info!(connection = %connection.id(), "starting payment");

        if self.config.probe.enabled && request.amount > 0 {
            let prober = ExchangeRateProber::new(self.config.probe.clone());
            let probe = prober.probe(self.probe_context(&connection), &state);
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, probe).await.is_err() {
                        tracing::warn!("payment deadline passed while probing");
                        return finish(&state, started, PaymentOutcome::TimedOut);
                    }
                }
                None => {
                    probe.await;
                }
            }
        }

        let chain = self.payment_chain(&connection, &state);
        let mut in_flight: FuturesUnordered<JoinHandle<StreamPacketReply>> =
            FuturesUnordered::new();
        let wait_poll_interval = self.config.wait_poll_interval();

        let outcome = loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                tracing::warn!(in_flight = in_flight.len(), "payment deadline passed");
                break PaymentOutcome::TimedOut;
            }

            let mut draft = PacketDraft::default();
            match chain.next_state(&mut draft) {
                SendState::Ready => {
                    let sequence = match connection.next_sequence() {
                        Ok(sequence) => sequence,
                        Err(error) => {
                            tracing::warn!(%error, "cannot issue another sequence");
                            break PaymentOutcome::Failed(SendState::ConnectionClosed);
                        }
                    };
                    let request = draft.into_request(sequence);
                    in_flight.push(tokio::spawn(chain.clone().do_filter(request)));
                }
                SendState::Wait => {
                    let mut sleep_for = wait_poll_interval;
                    if let Some(deadline) = deadline {
                        sleep_for = sleep_for.min(deadline.saturating_duration_since(Instant::now()));
                    }
                    tokio::select! {
                        Some(joined) = in_flight.next(), if !in_flight.is_empty() => log_join(joined),
                        _ = tokio::time::sleep(sleep_for) => {}
                    }
                }
                SendState::End => break PaymentOutcome::Completed,
                failure => {
                    tracing::warn!(?failure, "payment failed");
                    break PaymentOutcome::Failed(failure);
                }
            }
        };

        if !in_flight.is_empty() {
            tracing::debug!(in_flight = in_flight.len(), "waiting for in-flight packets");
        }
        while let Some(joined) = in_flight.next().await {
            log_join(joined);
        }
        finish(&state, started, outcome)
    }
}

fn log_join(joined: Result<StreamPacketReply, JoinError>) {
    match joined {
        Ok(reply) => tracing::trace!(
            sequence = reply.request.sequence,
            amount = reply.request.source_amount,
            fulfilled = reply.is_fulfilled(),
            "packet resolved"
        ),
        Err(error) => tracing::error!(%error, "packet task failed"),
    }
}

fn finish(state: &PaymentSharedState, started: Instant, outcome: PaymentOutcome) -> SendMoneyResult {
    let amounts = state.amounts.snapshot();
    let result = SendMoneyResult {
        original_amount: state.amounts.target(),
        amount_sent: amounts.sent,
        amount_delivered: amounts.delivered,
        fulfilled_packets: amounts.fulfilled_packets,
        rejected_packets: amounts.rejected_packets,
        errored_packets: amounts.errored_packets,
        elapsed: started.elapsed(),
        outcome,
    };
    tracing::info!(
        sent = result.amount_sent,
        delivered = result.amount_delivered,
        fulfilled = result.fulfilled_packets,
        rejected = result.rejected_packets,
        errored = result.errored_packets,
        elapsed = ?result.elapsed,
        ?outcome,
        "payment finished"
    );
    result
}
