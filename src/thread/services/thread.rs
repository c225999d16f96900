//! Per-correspondent thread state machine.
//!
//! A thread composes the message relay and the closure scheduler: it gates
//! relays on channel readiness, cancels a pending closure on any message
//! activity, drives the close protocol (immediate or delayed), and
//! propagates edits to both mirrored copies of a message.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::TimeDelta;
use mockable::Clock;
use tokio::sync::watch;

use crate::thread::{
    domain::{
        ChannelRef, CloseRequest, CorrespondentId, CorrespondentProfile, Destination,
        InboundMessage, MessageCard, MessageRef, PendingClosure, ThreadDomainError,
    },
    ports::{AuditLog, ChatTransport, CloseReport, ClosedLog, ConfigStore},
    services::{
        ClosureScheduler, ManagerSettings, MessageRelay, RelayParams, ThreadError, ThreadRegistry,
        ThreadResult,
    },
};

/// Bounded lookback for edit-propagation history scans.
pub const EDIT_SCAN_LIMIT: usize = 100;

/// Messages shorter than this stay intact in a closure summary.
const PREVIEW_FULL_LIMIT: usize = 50;

/// Truncation length applied to longer previews.
const PREVIEW_LIMIT: usize = 48;

/// Staff notice posted when message activity cancels a scheduled close.
const CLOSE_CANCELLED_NOTICE: &str = "Scheduled close has been cancelled.";

/// Staff notice posted when a reply targets an unreachable correspondent.
const UNREACHABLE_NOTICE: &str =
    "This user shares no servers with the bridge and is thus unreachable.";

/// The logical pairing of one correspondent's private conversation with one
/// staff-side channel.
///
/// Shared as `Arc<Thread>`; all mutable state lives behind interior
/// synchronization. The backing channel is set exactly once, and readiness
/// is a monotonic false-to-true gate that never resets.
pub struct Thread<T, S, L, K>
where
    T: ChatTransport,
    S: ConfigStore,
    L: AuditLog,
    K: Clock + Send + Sync,
{
    correspondent_id: CorrespondentId,
    correspondent: Option<CorrespondentProfile>,
    channel: OnceLock<ChannelRef>,
    ready: watch::Sender<bool>,
    relay: MessageRelay<T, S, L>,
    scheduler: ClosureScheduler<S>,
    registry: Arc<ThreadRegistry<T, S, L, K>>,
    transport: Arc<T>,
    config: Arc<S>,
    audit: Arc<L>,
    clock: Arc<K>,
    settings: Arc<ManagerSettings>,
}

/// Collaborators handed to a new thread by the manager.
pub(crate) struct ThreadContext<T, S, L, K>
where
    T: ChatTransport,
    S: ConfigStore,
    L: AuditLog,
    K: Clock + Send + Sync,
{
    pub registry: Arc<ThreadRegistry<T, S, L, K>>,
    pub transport: Arc<T>,
    pub config: Arc<S>,
    pub audit: Arc<L>,
    pub clock: Arc<K>,
    pub settings: Arc<ManagerSettings>,
}

impl<T, S, L, K> Thread<T, S, L, K>
where
    T: ChatTransport + 'static,
    S: ConfigStore + 'static,
    L: AuditLog + 'static,
    K: Clock + Send + Sync + 'static,
{
    /// Creates a thread for a correspondent. The backing channel and the
    /// readiness flag are provisioned afterwards by the manager.
    pub(crate) fn new(
        correspondent_id: CorrespondentId,
        correspondent: Option<CorrespondentProfile>,
        context: ThreadContext<T, S, L, K>,
    ) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            correspondent_id,
            correspondent,
            channel: OnceLock::new(),
            ready,
            relay: MessageRelay::new(
                Arc::clone(&context.transport),
                Arc::clone(&context.config),
                Arc::clone(&context.audit),
            ),
            scheduler: ClosureScheduler::new(Arc::clone(&context.config)),
            registry: context.registry,
            transport: context.transport,
            config: context.config,
            audit: context.audit,
            clock: context.clock,
            settings: context.settings,
        }
    }

    /// Returns the correspondent identifier keying this thread.
    #[must_use]
    pub const fn correspondent_id(&self) -> CorrespondentId {
        self.correspondent_id
    }

    /// Returns the correspondent profile, when it could be resolved.
    #[must_use]
    pub const fn correspondent(&self) -> Option<&CorrespondentProfile> {
        self.correspondent.as_ref()
    }

    /// Records the backing channel. Set exactly once at creation or
    /// recovery; a second call is ignored.
    pub(crate) fn set_channel(&self, channel: ChannelRef) {
        if self.channel.set(channel).is_err() {
            tracing::warn!(thread = %self.correspondent_id, "backing channel already set");
        }
    }

    /// Returns the backing channel.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadError::ChannelUnavailable`] before provisioning
    /// completes.
    pub fn channel(&self) -> ThreadResult<ChannelRef> {
        self.channel
            .get()
            .copied()
            .ok_or(ThreadError::ChannelUnavailable)
    }

    /// Returns `true` once the channel and topic are fully provisioned.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Marks the thread ready, releasing every suspended relay. The gate is
    /// monotonic and never resets.
    pub(crate) fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    /// Suspends until the thread is marked ready.
    pub async fn wait_until_ready(&self) {
        let mut receiver = self.ready.subscribe();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }

    /// Returns the pending-closure record, when a delayed close is armed.
    ///
    /// # Errors
    ///
    /// Returns a config error when the read fails.
    pub async fn pending_closure(&self) -> ThreadResult<Option<PendingClosure>> {
        self.scheduler.pending(self.correspondent_id).await
    }

    /// Relays a staff reply to both endpoints: the staff channel and the
    /// correspondent's private stream.
    ///
    /// An empty reply (no text, no attachments) is rejected before any side
    /// effect. An unreachable correspondent degrades to a notice in the
    /// invoking staff location; the relay is skipped and no error is raised.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadDomainError::EmptyMessage`] for empty input, or a
    /// transport/config error when delivery fails.
    pub async fn reply(self: &Arc<Self>, message: &InboundMessage) -> ThreadResult<()> {
        if message.is_empty() {
            return Err(ThreadDomainError::EmptyMessage.into());
        }

        if self.correspondent.is_none() {
            let notice = MessageCard::notice(UNREACHABLE_NOTICE.to_owned());
            self.transport
                .send_card(message.source, None, &notice)
                .await?;
            return Ok(());
        }

        self.cancel_closure_with_notice().await?;

        let channel = self.channel()?;
        let (to_channel, to_correspondent) = tokio::join!(
            self.relay_to(message, Destination::Channel(channel), true),
            self.relay_to(message, Destination::Direct(self.correspondent_id), true),
        );
        to_channel?;
        to_correspondent?;
        Ok(())
    }

    /// Relays one inbound message to a single destination, defaulting to the
    /// staff channel. Message activity cancels a pending closure before the
    /// relay happens.
    ///
    /// A send issued before provisioning completes suspends on the
    /// readiness gate; the default destination is resolved only after it,
    /// when the backing channel is guaranteed to be set.
    ///
    /// # Errors
    ///
    /// Returns a transport/config error when cancellation bookkeeping or
    /// delivery fails.
    pub async fn send(
        self: &Arc<Self>,
        message: &InboundMessage,
        destination: Option<Destination>,
        from_staff: bool,
    ) -> ThreadResult<MessageRef> {
        self.cancel_closure_with_notice().await?;
        self.wait_until_ready().await;

        let destination = match destination {
            Some(destination) => destination,
            None => Destination::Channel(self.channel()?),
        };
        self.relay_to(message, destination, from_staff).await
    }

    /// Waits for readiness, then performs one relay delivery.
    async fn relay_to(
        &self,
        message: &InboundMessage,
        destination: Destination,
        from_staff: bool,
    ) -> ThreadResult<MessageRef> {
        self.wait_until_ready().await;
        self.relay
            .relay(RelayParams {
                message,
                destination,
                thread_key: self.correspondent_id,
                from_staff,
            })
            .await
    }

    /// Cancels a pending closure, if one is armed, and posts exactly one
    /// cancellation notice to the staff channel.
    async fn cancel_closure_with_notice(&self) -> ThreadResult<()> {
        let armed = self.scheduler.is_armed()
            || self
                .scheduler
                .pending(self.correspondent_id)
                .await?
                .is_some();
        if !armed {
            return Ok(());
        }

        self.scheduler.cancel(self.correspondent_id).await?;

        let channel = self.channel()?;
        let notice = MessageCard::notice(CLOSE_CANCELLED_NOTICE.to_owned());
        self.transport
            .send_card(Destination::Channel(channel), None, &notice)
            .await?;
        Ok(())
    }

    /// Cancels any pending closure without posting a notice. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a config error when removing the persisted record fails.
    pub async fn cancel_closure(&self) -> ThreadResult<()> {
        self.scheduler.cancel(self.correspondent_id).await
    }

    /// Closes the thread now or after a delay.
    ///
    /// Any existing pending closure is cancelled first; a repeated delayed
    /// close restarts the timer rather than stacking a second one. A delayed
    /// close persists its record before arming so a process restart can
    /// recover it; the thread stays active until the timer fires, and any
    /// relayed message in between cancels the close.
    ///
    /// # Errors
    ///
    /// Returns a config error when closure bookkeeping fails, or any
    /// finalization error for an immediate close.
    pub async fn close(self: &Arc<Self>, request: CloseRequest) -> ThreadResult<()> {
        self.scheduler.cancel(self.correspondent_id).await?;

        let delay = request.delay();
        if delay.is_zero() {
            return self.finalize(request, false).await;
        }

        let now = self.clock.utc();
        let fire_at = TimeDelta::from_std(delay)
            .ok()
            .and_then(|offset| now.checked_add_signed(offset))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);
        let record = request.into_pending(fire_at);
        self.arm(record, delay).await
    }

    /// Re-arms a pending closure recovered from the config store after a
    /// restart. Records still in the future run for their remaining delay;
    /// overdue records fire immediately.
    ///
    /// # Errors
    ///
    /// Returns a config error when re-persisting the record fails, or any
    /// finalization error for an overdue record.
    pub async fn resume_closure(self: &Arc<Self>, record: PendingClosure) -> ThreadResult<()> {
        let remaining = (record.fire_at - self.clock.utc())
            .to_std()
            .unwrap_or(Duration::ZERO);
        if remaining.is_zero() {
            return self.finalize(CloseRequest::from(record), true).await;
        }
        self.arm(record, remaining).await
    }

    /// Persists a pending record and arms the scheduler with a finalization
    /// task.
    async fn arm(self: &Arc<Self>, record: PendingClosure, fire_in: Duration) -> ThreadResult<()> {
        let thread = Arc::clone(self);
        let request = CloseRequest::from(record.clone());
        self.scheduler
            .schedule(self.correspondent_id, &record, fire_in, async move {
                if let Err(err) = thread.finalize(request, true).await {
                    tracing::error!(
                        thread = %thread.correspondent_id,
                        error = %err,
                        "scheduled closure failed",
                    );
                }
            })
            .await
    }

    /// Finalizes the close: unregisters the thread, archives the log, and
    /// dispatches the closing side effects.
    ///
    /// Registry removal happens first, closing the window for new relay. An
    /// audit-log failure aborts the close before any destructive step and
    /// restores the registry entry, leaving the thread open for a retry.
    /// Runs effectively at most once: a second invocation finds the registry
    /// entry gone and returns.
    async fn finalize(self: &Arc<Self>, request: CloseRequest, scheduled: bool) -> ThreadResult<()> {
        let Some(evicted) = self.registry.remove(self.correspondent_id) else {
            return Ok(());
        };

        let result = self.finalize_inner(&request, scheduled).await;
        if let Err(err) = &result {
            tracing::error!(
                thread = %self.correspondent_id,
                error = %err,
                "close aborted, thread restored",
            );
            self.registry.restore(evicted);
        }
        result
    }

    async fn finalize_inner(&self, request: &CloseRequest, scheduled: bool) -> ThreadResult<()> {
        self.scheduler.cancel(self.correspondent_id).await?;
        self.config
            .remove_subscriptions(self.correspondent_id)
            .await?;

        let channel = self.channel()?;
        let report = CloseReport {
            closed_at: self.clock.utc(),
            closer: request.closer().clone(),
        };
        let log = self
            .audit
            .post_log(channel, &report)
            .await
            .map_err(ThreadError::Audit)?;

        self.dispatch_close_effects(request, scheduled, channel, &log)
            .await;
        Ok(())
    }

    /// Dispatches the staff-feed summary, the correspondent notice, and the
    /// channel deletion concurrently. Partial failures are logged and do not
    /// roll back the other effects.
    async fn dispatch_close_effects(
        &self,
        request: &CloseRequest,
        scheduled: bool,
        channel: ChannelRef,
        log: &ClosedLog,
    ) {
        let summary = self.closure_summary(request, scheduled, log);
        let feed = async {
            let feed_channel = Destination::Channel(self.settings.log_feed);
            if let Err(err) = self.transport.send_card(feed_channel, None, &summary).await {
                tracing::warn!(error = %err, "closure summary post failed");
            }
        };

        let notice = self.closing_notice(request);
        let notify = async {
            if let Some(card) = &notice {
                let direct = Destination::Direct(self.correspondent_id);
                if let Err(err) = self.transport.send_card(direct, None, card).await {
                    tracing::warn!(error = %err, "closing notice failed");
                }
            }
        };

        let delete = async {
            if request.deletes_channel() {
                if let Err(err) = self.transport.delete_channel(channel).await {
                    tracing::warn!(error = %err, "channel deletion failed");
                }
            }
        };

        tokio::join!(feed, notify, delete);
    }

    /// Builds the staff-feed closure summary: who closed the thread, a
    /// truncated first-message preview, and a link to the archived log.
    fn closure_summary(
        &self,
        request: &CloseRequest,
        scheduled: bool,
        log: &ClosedLog,
    ) -> MessageCard {
        let user = self.correspondent.as_ref().map_or_else(
            || format!("`{}`", self.correspondent_id),
            CorrespondentProfile::mention,
        );
        let preview = log
            .first_message
            .as_deref()
            .map_or_else(|| "No content".to_owned(), preview_of);

        let event = if scheduled {
            "Thread Closed as Scheduled"
        } else {
            "Thread Closed"
        };
        let closer = request.closer();

        MessageCard::notice(format!("{user} [`{}`]({}): {preview}", log.key, log.url))
            .with_footer(format!("{event} by {} ({})", closer.name, closer.id))
            .with_timestamp(self.clock.utc())
    }

    /// Builds the closing notice sent to the correspondent, unless the close
    /// is silent or the correspondent is unresolved.
    fn closing_notice(&self, request: &CloseRequest) -> Option<MessageCard> {
        if request.is_silent() || self.correspondent.is_none() {
            return None;
        }
        let message = request.message().map_or_else(
            || format!("{} has closed this thread.", request.closer().mention()),
            str::to_owned,
        );
        Some(MessageCard::notice(message).with_title("Thread Closed"))
    }

    /// Propagates an edit of a source message to its mirrored copies.
    ///
    /// Scans recent history of the staff channel and the correspondent
    /// stream concurrently and independently; the first card in each
    /// location whose hidden origin reference matches is updated with the
    /// edited marker and the new content. A miss in either location is a
    /// no-op, not an error.
    pub async fn edit_message(&self, origin: MessageRef, new_content: &str) {
        let channel_scan = async {
            if let Ok(channel) = self.channel() {
                self.edit_in(Destination::Channel(channel), origin, new_content)
                    .await;
            }
        };
        let direct_scan =
            self.edit_in(Destination::Direct(self.correspondent_id), origin, new_content);

        tokio::join!(channel_scan, direct_scan);
    }

    /// Bounded scan of one destination for the mirrored copy of `origin`.
    async fn edit_in(&self, destination: Destination, origin: MessageRef, new_content: &str) {
        let entries = match self.transport.history(destination, EDIT_SCAN_LIMIT).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, ?destination, "edit history scan failed");
                return;
            }
        };

        let Some(mut posted) = entries
            .into_iter()
            .find(|posted| posted.card.origin == Some(origin))
        else {
            return;
        };

        posted.card.mark_edited();
        posted.card.description = new_content.to_owned();
        if let Err(err) = self
            .transport
            .edit_card(destination, posted.message, &posted.card)
            .await
        {
            tracing::warn!(error = %err, ?destination, "edit propagation failed");
        }
    }
}

/// Truncates a first-message preview to the summary limit. Messages under
/// the full limit are kept intact.
fn preview_of(content: &str) -> String {
    if content.chars().count() < PREVIEW_FULL_LIMIT {
        return content.to_owned();
    }
    let head: String = content.chars().take(PREVIEW_LIMIT).collect();
    format!("{head}...")
}
