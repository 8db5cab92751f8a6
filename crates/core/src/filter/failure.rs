use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{
    FilterChain, PacketDraft, ReplyError, ReplyOutcome, SendState,
    StreamPacketFilter, StreamPacketReply, StreamPacketRequest,
};
use crate::packet::{ErrorClass, ErrorCode};
use crate::tracker::{FailureTracker, TerminalFailure};

/// Ends the payment on terminal failures and after too many transient ones in a row.
pub struct FailureFilter {
    failures: Arc<FailureTracker>,
}

impl FailureFilter {
    pub fn new(failures: Arc<FailureTracker>) -> Self {
        Self { failures }
    }
}

impl StreamPacketFilter for FailureFilter {
    fn next_state(&self, _draft: &mut PacketDraft) -> SendState {
        if let Some(failure) = self.failures.terminal() {
            return match failure {
                TerminalFailure::FinalReject(code) => SendState::FinalReject(code),
                TerminalFailure::PeerClosedConnection => SendState::PeerClosedConnection,
                TerminalFailure::UnauthenticatedReply => SendState::UnauthenticatedReply,
                TerminalFailure::LocalFailure => SendState::LocalFailure,
            };
        }
        if self.failures.transient_limit_reached() {
            return SendState::TooManyTransientFailures;
        }
        SendState::Ready
    }

    fn do_filter(
        &self,
        request: StreamPacketRequest,
        chain: FilterChain,
    ) -> BoxFuture<'static, StreamPacketReply> {
        let failures = self.failures.clone();
        let inner = chain.do_filter(request);
        async move {
            let reply = inner.await;
            record(&failures, &reply);
            reply
        }
        .boxed()
    }
}

enum Verdict {
    Success,
    Capacity,
    Transient,
    Terminal(TerminalFailure),
}

fn classify(reply: &StreamPacketReply) -> Verdict {
    if reply
        .peer_packet()
        .and_then(|packet| packet.connection_close())
        .is_some()
    {
        return Verdict::Terminal(TerminalFailure::PeerClosedConnection);
    }

    match &reply.outcome {
        ReplyOutcome::Fulfilled { peer: Ok(_), .. } => Verdict::Success,
        ReplyOutcome::Fulfilled { peer: Err(_), .. } => {
            Verdict::Terminal(TerminalFailure::UnauthenticatedReply)
        }
        ReplyOutcome::Rejected { reject, .. } => match reject.code {
            ErrorCode::F08_AMOUNT_TOO_LARGE => Verdict::Capacity,
            ErrorCode::F99_APPLICATION_ERROR => Verdict::Transient,
            code if code.class() == ErrorClass::Final => {
                Verdict::Terminal(TerminalFailure::FinalReject(code))
            }
            _ => Verdict::Transient,
        },
        ReplyOutcome::Errored(error) if error.is_transient() => Verdict::Transient,
        ReplyOutcome::Errored(ReplyError::InvalidFulfillment) => {
            Verdict::Terminal(TerminalFailure::UnauthenticatedReply)
        }
        ReplyOutcome::Errored(_) => Verdict::Terminal(TerminalFailure::LocalFailure),
    }
}

fn record(failures: &FailureTracker, reply: &StreamPacketReply) {
    let sequence = reply.request.sequence;
    match classify(reply) {
        Verdict::Success => failures.record_success(),
        Verdict::Capacity => {}
        Verdict::Transient => {
            let consecutive = failures.record_transient();
            tracing::debug!(sequence, consecutive, "transient failure");
        }
        Verdict::Terminal(failure) => {
            if let Some(reject) = reply.reject() {
                tracing::warn!(sequence, code = %reject.code, message = %reject.message, ?failure, "terminal reject");
            } else {
                tracing::warn!(sequence, ?failure, "terminal failure");
            }
            failures.record_terminal(failure);
        }
    }
}
