//! Thread registry and manager: storing, finding, and creating threads.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use mockable::Clock;
use regex::Regex;

use crate::thread::{
    domain::{
        CardAuthor, ChannelRef, CorrespondentId, CorrespondentProfile, Destination, MessageCard,
    },
    ports::{AuditLog, ChatTransport, ConfigStore},
    services::{ThreadError, ThreadResult, thread::ThreadContext},
};

use super::Thread;

/// Bounded lookback for the genesis-record recovery scan.
pub const GENESIS_SCAN_LIMIT: usize = 50;

/// Default welcome notice sent to a correspondent who opens a thread.
const DEFAULT_WELCOME: &str = "The staff team will get back to you as soon as possible!";

/// Default staff mention posted with the informational summary.
const DEFAULT_MENTION: &str = "@here";

/// Static settings for thread provisioning and closure summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Staff-wide feed channel receiving closure summaries.
    pub log_feed: ChannelRef,
    /// Override for the welcome notice body.
    pub welcome_message: Option<String>,
    /// Override for the staff mention posted on self-opened threads.
    pub staff_mention: Option<String>,
}

impl ManagerSettings {
    /// Creates settings with default welcome and mention texts.
    #[must_use]
    pub const fn new(log_feed: ChannelRef) -> Self {
        Self {
            log_feed,
            welcome_message: None,
            staff_mention: None,
        }
    }

    /// Overrides the welcome notice body.
    #[must_use]
    pub fn with_welcome_message(mut self, message: impl Into<String>) -> Self {
        self.welcome_message = Some(message.into());
        self
    }

    /// Overrides the staff mention.
    #[must_use]
    pub fn with_staff_mention(mut self, mention: impl Into<String>) -> Self {
        self.staff_mention = Some(mention.into());
        self
    }

    fn welcome(&self) -> &str {
        self.welcome_message.as_deref().unwrap_or(DEFAULT_WELCOME)
    }

    fn mention(&self) -> &str {
        self.staff_mention.as_deref().unwrap_or(DEFAULT_MENTION)
    }
}

/// Registry mapping correspondents to live threads.
///
/// At most one live thread exists per correspondent at any instant; the
/// first insert for a key wins. All mutations happen without crossing an
/// await point.
pub struct ThreadRegistry<T, S, L, K>
where
    T: ChatTransport,
    S: ConfigStore,
    L: AuditLog,
    K: Clock + Send + Sync,
{
    threads: RwLock<HashMap<CorrespondentId, Arc<Thread<T, S, L, K>>>>,
}

impl<T, S, L, K> Default for ThreadRegistry<T, S, L, K>
where
    T: ChatTransport,
    S: ConfigStore,
    L: AuditLog,
    K: Clock + Send + Sync,
{
    fn default() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
        }
    }
}

impl<T, S, L, K> ThreadRegistry<T, S, L, K>
where
    T: ChatTransport + 'static,
    S: ConfigStore + 'static,
    L: AuditLog + 'static,
    K: Clock + Send + Sync + 'static,
{
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live thread for a correspondent, when one exists.
    #[must_use]
    pub fn get(&self, id: CorrespondentId) -> Option<Arc<Thread<T, S, L, K>>> {
        self.read_lock().get(&id).cloned()
    }

    /// Inserts a new thread; the first insert for a key wins.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadError::AlreadyRegistered`] when a live thread already
    /// exists for the correspondent.
    pub fn insert_new(
        &self,
        id: CorrespondentId,
        thread: Arc<Thread<T, S, L, K>>,
    ) -> ThreadResult<()> {
        let mut threads = self.write_lock();
        if threads.contains_key(&id) {
            return Err(ThreadError::AlreadyRegistered(id));
        }
        threads.insert(id, thread);
        Ok(())
    }

    /// Removes and returns the thread for a correspondent.
    pub fn remove(&self, id: CorrespondentId) -> Option<Arc<Thread<T, S, L, K>>> {
        self.write_lock().remove(&id)
    }

    /// Restores a previously removed thread, used to roll back an aborted
    /// finalization.
    pub fn restore(&self, thread: Arc<Thread<T, S, L, K>>) {
        self.write_lock().insert(thread.correspondent_id(), thread);
    }

    /// Returns the number of live threads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    /// Returns `true` when no thread is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    fn read_lock(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<CorrespondentId, Arc<Thread<T, S, L, K>>>> {
        self.threads.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<CorrespondentId, Arc<Thread<T, S, L, K>>>> {
        self.threads.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handles storing, finding, and creating threads.
pub struct ThreadManager<T, S, L, K>
where
    T: ChatTransport,
    S: ConfigStore,
    L: AuditLog,
    K: Clock + Send + Sync,
{
    registry: Arc<ThreadRegistry<T, S, L, K>>,
    transport: Arc<T>,
    config: Arc<S>,
    audit: Arc<L>,
    clock: Arc<K>,
    settings: Arc<ManagerSettings>,
}

impl<T, S, L, K> ThreadManager<T, S, L, K>
where
    T: ChatTransport + 'static,
    S: ConfigStore + 'static,
    L: AuditLog + 'static,
    K: Clock + Send + Sync + 'static,
{
    /// Creates a manager over the given collaborators.
    #[must_use]
    pub fn new(
        transport: Arc<T>,
        config: Arc<S>,
        audit: Arc<L>,
        clock: Arc<K>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            registry: Arc::new(ThreadRegistry::new()),
            transport,
            config,
            audit,
            clock,
            settings: Arc::new(settings),
        }
    }

    /// Returns the shared registry.
    #[must_use]
    pub fn registry(&self) -> Arc<ThreadRegistry<T, S, L, K>> {
        Arc::clone(&self.registry)
    }

    /// Finds a thread from the cache or by locating a staff channel whose
    /// topic encodes the correspondent id.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the channel lookup fails.
    pub async fn find(
        &self,
        id: CorrespondentId,
    ) -> ThreadResult<Option<Arc<Thread<T, S, L, K>>>> {
        if let Some(thread) = self.registry.get(id) {
            return Ok(Some(thread));
        }

        let Some(channel) = self
            .transport
            .find_channel_by_topic(&topic_for(id))
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(self.recover(id, channel).await?))
    }

    /// Recovery path for a known channel whose correspondent is not.
    ///
    /// Reads the channel's topic metadata for an embedded id; when the topic
    /// is missing or corrupted, falls back to scanning recent history for a
    /// genesis record embedding the id. Topic-setting is best-effort against
    /// the external platform, so the fallback is load-bearing.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the topic read or history scan fails.
    pub async fn find_by_channel(
        &self,
        channel: ChannelRef,
    ) -> ThreadResult<Option<Arc<Thread<T, S, L, K>>>> {
        let topic = self.transport.channel_topic(channel).await?;
        let mut id = topic.as_deref().and_then(extract_correspondent_id);

        if id.is_none() {
            id = self.scan_for_genesis(channel).await?;
        }

        let Some(found) = id else {
            return Ok(None);
        };

        if let Some(thread) = self.registry.get(found) {
            return Ok(Some(thread));
        }
        Ok(Some(self.recover(found, channel).await?))
    }

    /// Finds an existing thread or creates a new one.
    ///
    /// Concurrent racers observe the first registry insert; the loser of a
    /// creation race resolves to the winning entry.
    ///
    /// # Errors
    ///
    /// Returns a transport/config error when lookup or provisioning fails.
    pub async fn find_or_create(
        &self,
        id: CorrespondentId,
    ) -> ThreadResult<Arc<Thread<T, S, L, K>>> {
        if let Some(thread) = self.find(id).await? {
            return Ok(thread);
        }
        match self.create(id, None).await {
            Ok(thread) => Ok(thread),
            Err(ThreadError::AlreadyRegistered(_)) => self
                .registry
                .get(id)
                .ok_or(ThreadError::AlreadyRegistered(id)),
            Err(err) => Err(err),
        }
    }

    /// Creates a thread for a correspondent.
    ///
    /// The registry insert happens synchronously before provisioning, so
    /// concurrent finds observe the new thread immediately and gate on its
    /// readiness. The welcome notice is sent only when the correspondent
    /// opened the thread themselves (`creator` absent). A provisioning
    /// failure rolls the registry entry back; no half-initialized thread
    /// stays reachable.
    ///
    /// # Errors
    ///
    /// Returns [`ThreadError::AlreadyRegistered`] when a live thread exists,
    /// or a transport/audit error when provisioning fails.
    pub async fn create(
        &self,
        id: CorrespondentId,
        creator: Option<u64>,
    ) -> ThreadResult<Arc<Thread<T, S, L, K>>> {
        let profile = self.transport.resolve_correspondent(id).await?;

        let thread = Arc::new(Thread::new(id, profile, self.context()));
        self.registry.insert_new(id, Arc::clone(&thread))?;

        // Only the registered thread greets the correspondent; the loser of
        // a creation race must not send a second notice.
        if creator.is_none() {
            self.spawn_welcome(id);
        }

        match self.provision(&thread, creator).await {
            Ok(()) => Ok(thread),
            Err(err) => {
                self.registry.remove(id);
                Err(err)
            }
        }
    }

    /// Rebuilds the registry from existing staff channels at startup.
    ///
    /// Runs every channel through the by-channel recovery path; channels
    /// without embedded thread metadata are skipped. Pairs with
    /// [`Self::resume_pending_closures`] when the service comes up.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the channel enumeration fails; a
    /// failure recovering one channel is logged and does not stop the scan.
    pub async fn populate_cache(&self) -> ThreadResult<()> {
        for channel in self.transport.channels().await? {
            if let Err(err) = self.find_by_channel(channel).await {
                tracing::error!(%channel, error = %err, "cache population failed");
            }
        }
        Ok(())
    }

    /// Re-arms pending closures persisted before a process restart.
    ///
    /// Records still in the future run for their remaining delay; overdue
    /// records fire immediately. Records whose thread can no longer be
    /// found (the channel is gone) are dropped from the store.
    ///
    /// # Errors
    ///
    /// Returns a config error when reading the persisted records fails.
    pub async fn resume_pending_closures(&self) -> ThreadResult<()> {
        for (id, record) in self.config.pending_closures().await? {
            match self.find(id).await {
                Ok(Some(thread)) => {
                    if let Err(err) = thread.resume_closure(record).await {
                        tracing::error!(thread = %id, error = %err, "closure recovery failed");
                    }
                }
                Ok(None) => {
                    tracing::warn!(thread = %id, "dropping closure for a vanished thread");
                    self.config.remove_pending_closure(id).await?;
                }
                Err(err) => {
                    tracing::error!(thread = %id, error = %err, "thread recovery failed");
                }
            }
        }
        Ok(())
    }

    fn context(&self) -> ThreadContext<T, S, L, K> {
        ThreadContext {
            registry: Arc::clone(&self.registry),
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
            audit: Arc::clone(&self.audit),
            clock: Arc::clone(&self.clock),
            settings: Arc::clone(&self.settings),
        }
    }

    /// Reconstructs a thread over an existing channel and caches it.
    async fn recover(
        &self,
        id: CorrespondentId,
        channel: ChannelRef,
    ) -> ThreadResult<Arc<Thread<T, S, L, K>>> {
        let profile = self.transport.resolve_correspondent(id).await?;
        let thread = Arc::new(Thread::new(id, profile, self.context()));
        thread.set_channel(channel);
        thread.mark_ready();

        match self.registry.insert_new(id, Arc::clone(&thread)) {
            Ok(()) => Ok(thread),
            // A concurrent recovery won the insert; use its entry.
            Err(ThreadError::AlreadyRegistered(_)) => self
                .registry
                .get(id)
                .ok_or(ThreadError::AlreadyRegistered(id)),
            Err(err) => Err(err),
        }
    }

    /// Scans recent channel history for a genesis record embedding the
    /// correspondent id in a card footer.
    async fn scan_for_genesis(
        &self,
        channel: ChannelRef,
    ) -> ThreadResult<Option<CorrespondentId>> {
        let entries = self
            .transport
            .history(Destination::Channel(channel), GENESIS_SCAN_LIMIT)
            .await?;
        Ok(entries.iter().find_map(|posted| {
            posted
                .card
                .footer
                .as_deref()
                .and_then(extract_correspondent_id)
        }))
    }

    /// Sends the welcome notice to a self-opened thread's correspondent,
    /// fire-and-forget.
    fn spawn_welcome(&self, id: CorrespondentId) {
        let card = MessageCard::notice(self.settings.welcome().to_owned())
            .with_title("Thread created!");
        let transport = Arc::clone(&self.transport);
        drop(tokio::spawn(async move {
            if let Err(err) = transport.send_card(Destination::Direct(id), None, &card).await {
                tracing::warn!(thread = %id, error = %err, "welcome notice failed");
            }
        }));
    }

    /// Provisions the backing channel: creation, topic metadata, pinned
    /// informational summary, and the readiness flip.
    async fn provision(
        &self,
        thread: &Arc<Thread<T, S, L, K>>,
        creator: Option<u64>,
    ) -> ThreadResult<()> {
        let id = thread.correspondent_id();
        let name = self.derive_channel_name(thread.correspondent()).await?;
        let channel = self.transport.create_channel(&name).await?;
        thread.set_channel(channel);

        let creator_id = creator.unwrap_or(id.value());
        let (log_url, logs) = tokio::try_join!(
            self.audit.log_url(id, channel, creator_id),
            self.audit.user_logs(id),
        )
        .map_err(ThreadError::Audit)?;
        let closed_count = logs.iter().filter(|log| !log.open).count();

        let info = self.info_card(thread, creator, &log_url, closed_count);
        let mention = creator.is_none().then(|| self.settings.mention().to_owned());

        // Topic metadata and the informational post are one parallel unit of
        // work; readiness is only set after both complete.
        let destination = Destination::Channel(channel);
        let topic = topic_for(id);
        let (_, pinned) = tokio::try_join!(
            self.transport.set_topic(channel, &topic),
            self.transport.send_card(destination, mention.as_deref(), &info),
        )?;

        thread.mark_ready();

        if let Err(err) = self.transport.pin_message(channel, pinned).await {
            tracing::warn!(thread = %id, error = %err, "pinning the summary failed");
        }
        Ok(())
    }

    /// Derives a collision-proofed channel name from the correspondent's
    /// handle: lowercased, filtered to `[a-z0-9-]`, `"null"` when empty,
    /// suffixed with the discriminator (or the raw id when unresolved), and
    /// disambiguated until unique.
    async fn derive_channel_name(
        &self,
        profile: Option<&CorrespondentProfile>,
    ) -> ThreadResult<String> {
        let (handle, suffix) = profile.map_or_else(
            || (String::new(), "0000".to_owned()),
            |p| (p.name.clone(), p.discriminator.clone()),
        );

        let existing = self.transport.channel_names().await?;
        Ok(disambiguate_channel_name(&handle, &suffix, &existing))
    }

    /// Builds the pinned informational summary: who opened the thread, the
    /// archived-log link, registration age, past-thread count, and
    /// membership context.
    fn info_card(
        &self,
        thread: &Arc<Thread<T, S, L, K>>,
        creator: Option<u64>,
        log_url: &str,
        closed_count: usize,
    ) -> MessageCard {
        let id = thread.correspondent_id();
        let profile = thread.correspondent();
        let now = self.clock.utc();

        let user = profile.map_or_else(|| format!("`{id}`"), CorrespondentProfile::mention);
        let opened = creator.map_or_else(
            || format!("{user} has started a thread"),
            |creator_id| format!("<@{creator_id}> has created a thread with {user}"),
        );
        let key = log_url.rsplit('/').next().unwrap_or(log_url);

        let mut card = MessageCard::notice(format!("{opened} [`{key}`]({log_url})"))
            .with_timestamp(now);
        card.author = profile.map(|p| CardAuthor {
            name: p.name.clone(),
            icon_url: p.avatar_url.clone(),
        });

        if let Some(p) = profile {
            card.push_field("Registered", days_ago(now, p.registered_at));
        }
        if closed_count > 0 {
            card.push_field("Past logs", closed_count.to_string());
        }

        let membership = profile.and_then(|p| p.membership.as_ref());
        if let Some(member) = membership {
            card.push_field("Joined", days_ago(now, member.joined_at));
            if let Some(nickname) = &member.nickname {
                card.push_field("Nickname", nickname.clone());
            }
            if !member.roles.is_empty() {
                card.push_field("Roles", member.roles.join(", "));
            }
            card.footer = Some(topic_for(id));
        } else {
            card.footer = Some(format!(
                "{} | Note: this member is not part of this server.",
                topic_for(id)
            ));
        }

        card
    }
}

/// Renders the channel-topic metadata string for a correspondent.
#[must_use]
pub fn topic_for(id: CorrespondentId) -> String {
    format!("User ID: {id}")
}

fn topic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    #[expect(clippy::expect_used, reason = "the pattern is statically valid")]
    PATTERN.get_or_init(|| Regex::new(r"User ID: (\d+)").expect("valid topic pattern"))
}

/// Extracts an embedded correspondent id from topic or footer text.
#[must_use]
pub fn extract_correspondent_id(text: &str) -> Option<CorrespondentId> {
    topic_pattern()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse::<u64>().ok())
        .map(CorrespondentId::from_u64)
}

/// Sanitizes a handle and appends `-x` markers until the name is unique
/// among existing channel names.
#[must_use]
pub fn disambiguate_channel_name(handle: &str, suffix: &str, existing: &[String]) -> String {
    let sanitized: String = handle
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();
    let base = if sanitized.is_empty() {
        "null".to_owned()
    } else {
        sanitized
    };

    let mut name = format!("{base}-{suffix}");
    while existing.contains(&name) {
        name.push_str("-x");
    }
    name
}

/// Formats a whole-day age for the informational summary.
fn days_ago(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let days = (now - then).num_days().max(0);
    if days == 1 {
        format!("{days} day ago.")
    } else {
        format!("{days} days ago.")
    }
}
