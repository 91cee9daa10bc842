//! Client-side polling of a session key.

use std::{sync::Arc, time::Duration};

use futures::{StreamExt, stream::BoxStream};
use realtime_progress_core::SessionUpdate;
use realtime_progress_session::RunRequest;
use serde_json::Value;
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_stream::wrappers::IntervalStream;

use crate::client::{CallbackClient, ClientError};

/// Polls `message` for one key on a fixed interval.
pub struct ProgressPoller<C> {
    client: Arc<C>,
    key: String,
    every: Duration,
    finished: Option<oneshot::Receiver<()>>,
}

struct PollState<C> {
    client: Arc<C>,
    key: String,
    ticks: IntervalStream,
    finished: Option<oneshot::Receiver<()>>,
    last: Option<SessionUpdate>,
    awaiting_run: bool,
    final_poll: bool,
    done: bool,
}

impl<C> ProgressPoller<C>
where
    C: CallbackClient + 'static,
{
    /// Create a poller for `key`, polling every `every`.
    #[must_use]
    pub fn new(client: Arc<C>, key: impl Into<String>, every: Duration) -> Self {
        Self {
            client,
            key: key.into(),
            every,
            finished: None,
        }
    }

    /// Stop after one last poll once `finished` fires.
    ///
    /// Lets the stream end when the run fails before any value is written.
    /// Until a progress value has been seen, a terminal marker is treated as
    /// left over from an earlier run on the same key and only accepted on the
    /// final poll.
    #[must_use]
    pub fn stop_on(mut self, finished: oneshot::Receiver<()>) -> Self {
        self.finished = Some(finished);
        self
    }

    /// Stream of changed updates.
    ///
    /// Polls that return nothing, or the same value as the previous poll, are
    /// skipped. The stream ends after yielding [`SessionUpdate::Ended`], after
    /// the first error, or after the final poll requested via
    /// [`stop_on`](Self::stop_on).
    #[must_use]
    pub fn into_stream(self) -> BoxStream<'static, Result<SessionUpdate, ClientError>> {
        let mut ticks = interval(self.every.max(Duration::from_millis(1)));
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let state = PollState {
            client: self.client,
            key: self.key,
            ticks: IntervalStream::new(ticks),
            awaiting_run: self.finished.is_some(),
            finished: self.finished,
            last: None,
            final_poll: false,
            done: false,
        };

        futures::stream::unfold(state, |mut st| async move {
            if st.done {
                return None;
            }
            loop {
                let stopped = match st.finished.as_mut() {
                    Some(finished) => tokio::select! {
                        _ = st.ticks.next() => false,
                        _ = finished => true,
                    },
                    None => {
                        st.ticks.next().await;
                        false
                    }
                };
                if stopped {
                    st.finished = None;
                    st.final_poll = true;
                }

                let update = match st.client.message(&st.key).await {
                    Ok(Some(raw)) => SessionUpdate::decode(&raw).map_err(ClientError::from),
                    Ok(None) => {
                        if st.final_poll {
                            return None;
                        }
                        continue;
                    }
                    Err(e) => Err(e),
                };

                match update {
                    Ok(update)
                        if update.is_terminal()
                            && st.awaiting_run
                            && st.last.is_none()
                            && !st.final_poll => {}
                    Ok(update) if st.last.as_ref() == Some(&update) => {
                        if st.final_poll {
                            return None;
                        }
                    }
                    Ok(update) => {
                        st.done = st.final_poll || update.is_terminal();
                        st.last = Some(update.clone());
                        return Some((Ok(update), st));
                    }
                    Err(e) => {
                        tracing::warn!(key = %st.key, "progress poll failed: {e}");
                        st.done = true;
                        return Some((Err(e), st));
                    }
                }
            }
        })
        .boxed()
    }
}

/// A run in flight together with its progress updates.
pub struct ProgressRun {
    /// Updates observed by polling the session key.
    pub updates: BoxStream<'static, Result<SessionUpdate, ClientError>>,
    /// Result of the run itself.
    pub result: JoinHandle<Result<Value, ClientError>>,
}

/// Start `request` and poll its key concurrently.
///
/// The update stream ends when the terminal marker is seen, or one poll after
/// the run completes, whichever comes first. A run that fails before its
/// session starts therefore ends the stream without any update. A terminal
/// marker already stored under a reused key does not end the stream early.
pub fn run_with_progress<C>(client: Arc<C>, request: RunRequest, poll_every: Duration) -> ProgressRun
where
    C: CallbackClient + 'static,
{
    let (finished_tx, finished_rx) = oneshot::channel();
    let updates = ProgressPoller::new(Arc::clone(&client), request.key.clone(), poll_every)
        .stop_on(finished_rx)
        .into_stream();

    let result = tokio::spawn(async move {
        let outcome = client.run(request).await;
        let _ = finished_tx.send(());
        outcome
    });

    ProgressRun { updates, result }
}
