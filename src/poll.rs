//! One poll pass over every configured mode.
//!
//! Modes are visited in declared order, one at a time. Within a mode the trip
//! update feed is fetched, decoded and emitted before the vehicle position
//! feed. What happens after a failed phase depends on the [`FailurePolicy`].

use std::fmt;

use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::{FetchError, PollError};
use crate::fetch::{FeedClient, HttpClient};
use crate::gtfs_rt::FeedMessage;
use crate::mode::{FeedKind, FeedRequest, Mode};
use crate::parser::FeedDecoder;
use crate::sink::FeedSink;

/// What a pass does after a fetch or decode failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the pass and return the error.
    #[default]
    Abort,
    /// Drop the rest of the failing mode, record the error, continue with the next mode.
    SkipMode,
}

/// Progress of a single pass. An aborted pass ends in `Failed`, carried by
/// [`PollError::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    NotStarted,
    Running { mode_index: usize, phase: FeedKind },
    Completed,
    Failed { mode_index: usize, phase: FeedKind },
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassState::NotStarted => f.write_str("not started"),
            PassState::Running { mode_index, phase } => {
                write!(f, "running mode #{mode_index} ({phase})")
            }
            PassState::Completed => f.write_str("completed"),
            PassState::Failed { mode_index, phase } => {
                write!(f, "failed at mode #{mode_index} ({phase})")
            }
        }
    }
}

/// Outcome of a pass that was not aborted.
#[derive(Debug)]
pub struct PassReport {
    pub state: PassState,
    /// Requests whose feed reached the sink, in order
    pub delivered: Vec<FeedRequest>,
    /// Failures tolerated under [`FailurePolicy::SkipMode`]
    pub failures: Vec<PollError>,
}

impl PassReport {
    pub fn is_clean(&self) -> bool {
        self.state == PassState::Completed && self.failures.is_empty()
    }
}

/// Drives poll passes: fetch through the limiter, decode, hand to a sink.
#[derive(Debug)]
pub struct Poller<C> {
    client: FeedClient<C>,
    decoder: FeedDecoder,
    modes: Vec<Mode>,
    policy: FailurePolicy,
}

impl<C: HttpClient> Poller<C> {
    pub fn new(client: FeedClient<C>, decoder: FeedDecoder) -> Self {
        Self {
            client,
            decoder,
            modes: Mode::ALL.to_vec(),
            policy: FailurePolicy::default(),
        }
    }

    /// Restricts passes to `modes`, keeping the declared polling order.
    pub fn with_modes(mut self, modes: &[Mode]) -> Self {
        self.modes = Mode::ALL
            .into_iter()
            .filter(|m| modes.contains(m))
            .collect();
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn client(&self) -> &FeedClient<C> {
        &self.client
    }

    /// Fetches and decodes a single feed.
    pub async fn fetch_feed(&self, request: FeedRequest) -> Result<FeedMessage, FetchError> {
        let bytes = self.client.fetch(request).await?;
        let feed = self.decoder.decode(&bytes)?;
        debug!(entities = feed.entity.len(), "Feed decoded");
        Ok(feed)
    }

    /// Runs one pass over the configured modes.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::Abort`] the first failed phase ends the pass and
    /// is returned. Under [`FailurePolicy::SkipMode`] this only returns `Ok`.
    pub async fn run_pass<S>(&self, sink: &mut S) -> Result<PassReport, PollError>
    where
        S: FeedSink + ?Sized,
    {
        let mut state = PassState::NotStarted;
        let mut delivered = Vec::with_capacity(self.modes.len() * FeedKind::ALL.len());
        let mut failures = Vec::new();

        info!(modes = self.modes.len(), policy = ?self.policy, "Starting poll pass");

        for (mode_index, &mode) in self.modes.iter().enumerate() {
            for phase in FeedKind::ALL {
                state = transition(state, PassState::Running { mode_index, phase });
                let request = FeedRequest::new(phase, mode);
                let span = info_span!("poll_feed", mode = %mode, kind = %phase);

                match self.fetch_feed(request).instrument(span).await {
                    Ok(feed) => {
                        sink.emit(request, feed);
                        delivered.push(request);
                    }
                    Err(source) => {
                        let err = PollError::new(request, mode_index, source);
                        match self.policy {
                            FailurePolicy::Abort => {
                                let failed = transition(state, err.state());
                                error!(state = %failed, error = %err, "Poll pass aborted");
                                return Err(err);
                            }
                            FailurePolicy::SkipMode => {
                                warn!(error = %err, "Skipping rest of mode");
                                failures.push(err);
                                break;
                            }
                        }
                    }
                }
            }
        }

        state = transition(state, PassState::Completed);
        info!(
            delivered = delivered.len(),
            failed = failures.len(),
            "Poll pass finished"
        );

        Ok(PassReport {
            state,
            delivered,
            failures,
        })
    }
}

fn transition(from: PassState, to: PassState) -> PassState {
    debug!(from = %from, to = %to, "Pass state");
    to
}
