//! Generic live store: bootstrap, subscription and message dispatch.

use crate::cold::ColdStore;
use crate::error::{CoherenceError, Result};
use crate::hot::HotStore;
use crate::transport::{MessageStream, Transport};
use crate::types::RecordKey;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::message::{ActionMessage, Command, StoreKind};

/// Records a store can start from without a cold store.
#[derive(Clone, Debug)]
pub enum Defaults<R> {
    One(R),
    Many(Vec<R>),
}

impl<R: Clone> Defaults<R> {
    /// Copy of every default record.
    pub fn records(&self) -> Vec<R> {
        match self {
            Defaults::One(record) => vec![record.clone()],
            Defaults::Many(records) => records.clone(),
        }
    }
}

impl<R> From<R> for Defaults<R> {
    fn from(record: R) -> Self {
        Defaults::One(record)
    }
}

impl<R> From<Vec<R>> for Defaults<R> {
    fn from(records: Vec<R>) -> Self {
        Defaults::Many(records)
    }
}

/// Live store configuration.
#[derive(Clone, Debug)]
pub struct LiveStoreConfig<R> {
    /// Logical store name; the channel is `KIND:name`.
    pub name: String,

    /// Records to serve when no cold data is available.
    pub default: Option<Defaults<R>>,

    /// Load `default` if the cold store cannot be read during `init`.
    pub fall_back_to_default: bool,

    /// Serve `default` straight away and never bootstrap or subscribe.
    pub skip_init_if_default_set: bool,
}

impl<R> Default for LiveStoreConfig<R> {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            default: None,
            fall_back_to_default: false,
            skip_init_if_default_set: false,
        }
    }
}

impl<R> LiveStoreConfig<R> {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_default(mut self, default: impl Into<Defaults<R>>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn fall_back_to_default(mut self, enabled: bool) -> Self {
        self.fall_back_to_default = enabled;
        self
    }

    pub fn skip_init_if_default_set(mut self, enabled: bool) -> Self {
        self.skip_init_if_default_set = enabled;
        self
    }
}

/// Collaborators checked out by the readiness guard.
pub(crate) struct Ready<'a, S: ?Sized> {
    pub cold: &'a S,
    pub transport: &'a dyn Transport,
}

/// Inbox stream checked out by a dispatcher; returned to the store on drop.
struct InboxLease<'a> {
    inbox: &'a Mutex<Option<MessageStream>>,
    stream: Option<MessageStream>,
}

impl InboxLease<'_> {
    async fn recv(&mut self) -> Option<String> {
        self.stream.as_mut()?.recv().await
    }
}

impl Drop for InboxLease<'_> {
    fn drop(&mut self) {
        // Drop cannot await. A `drain` holding the lock at this exact moment
        // sees an empty inbox and releases it at once, so losing the race is
        // the only way the stream is not returned.
        if let Ok(mut inbox) = self.inbox.try_lock() {
            if inbox.is_none() {
                *inbox = self.stream.take();
            }
        }
    }
}

/// A hot container kept coherent with a cold store over a transport.
///
/// Reads are served from the hot container only. Mutators (on the
/// [`LiveCatalog`](super::LiveCatalog) and [`LiveConfig`](super::LiveConfig)
/// specialisations) write through to the cold store and then broadcast an
/// action message. Inbound messages are applied one at a time through the
/// store's inbox, either by [`drain`](Self::drain) or by a task running
/// [`run`](Self::run).
pub struct LiveStore<H: HotStore, S: ?Sized> {
    name: String,
    channel_name: String,

    pub(crate) hot: RwLock<H>,

    cold: Option<Arc<S>>,
    transport: Option<Arc<dyn Transport>>,

    default: Option<Defaults<H::Record>>,
    fall_back_to_default: bool,
    skip_init_if_default_set: bool,

    initialized: AtomicBool,

    /// Subscription stream. Taken out by `run` for as long as it runs.
    inbox: Mutex<Option<MessageStream>>,

    /// Held while inbound messages are applied, so they apply one at a time.
    dispatch: Mutex<()>,
}

impl<H, S> LiveStore<H, S>
where
    H: HotStore,
    S: ColdStore<H::Record> + ?Sized,
{
    /// Create a store around `hot`.
    ///
    /// With a default and `skip_init_if_default_set`, the default is loaded
    /// into `hot` here and the store is usable for reads immediately.
    pub fn new(config: LiveStoreConfig<H::Record>, hot: H) -> Result<Self> {
        let channel_name = H::KIND.channel_name(&config.name);
        let store = Self {
            name: config.name,
            channel_name,
            hot: RwLock::new(hot),
            cold: None,
            transport: None,
            default: config.default,
            fall_back_to_default: config.fall_back_to_default,
            skip_init_if_default_set: config.skip_init_if_default_set,
            initialized: AtomicBool::new(false),
            inbox: Mutex::new(None),
            dispatch: Mutex::new(()),
        };

        if store.can_skip_init() {
            store.load_defaults()?;
            debug!(store = %store.name, "Serving defaults without bootstrap");
        }
        Ok(store)
    }

    /// Attach the cold store (builder style).
    pub fn with_cold_store(mut self, cold: Arc<S>) -> Self {
        self.cold = Some(cold);
        self
    }

    /// Attach the transport (builder style).
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn attach_cold_store(&mut self, cold: Arc<S>) {
        self.cold = Some(cold);
    }

    pub fn attach_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transport = Some(transport);
    }

    // --- Accessors ---

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    pub fn kind(&self) -> StoreKind {
        H::KIND
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_default_set(&self) -> bool {
        self.default.is_some()
    }

    pub fn can_skip_init(&self) -> bool {
        self.skip_init_if_default_set && self.is_default_set()
    }

    pub fn len(&self) -> usize {
        self.hot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against the hot container under a read lock.
    pub fn read<T>(&self, f: impl FnOnce(&H) -> T) -> T {
        f(&self.hot.read())
    }

    // --- Guards ---

    fn collaborators(&self) -> Result<Ready<'_, S>> {
        let cold = self
            .cold
            .as_deref()
            .ok_or(CoherenceError::NotInitialized("no cold store attached"))?;
        let transport = self
            .transport
            .as_deref()
            .ok_or(CoherenceError::NotInitialized("no transport attached"))?;
        Ok(Ready { cold, transport })
    }

    /// Checked out by every mutator before touching anything.
    pub(crate) fn ready(&self) -> Result<Ready<'_, S>> {
        if !self.is_initialized() {
            return Err(CoherenceError::NotInitialized("init has not completed"));
        }
        self.collaborators()
    }

    fn cold(&self) -> Result<&S> {
        self.cold
            .as_deref()
            .ok_or(CoherenceError::NotInitialized("no cold store attached"))
    }

    // --- Hot container writes (never held across an await) ---

    fn default_records(&self) -> Vec<H::Record> {
        self.default
            .as_ref()
            .map(|d| d.records())
            .unwrap_or_default()
    }

    fn load_defaults(&self) -> Result<usize> {
        let records = self.default_records();
        let count = records.len();
        let mut hot = self.hot.write();
        for record in records {
            hot.load(record)?;
        }
        Ok(count)
    }

    fn refresh_all(&self, records: Vec<H::Record>) -> Result<usize> {
        let count = records.len();
        let mut hot = self.hot.write();
        for record in records {
            hot.refresh(record)?;
        }
        Ok(count)
    }

    fn refresh_one(&self, record: H::Record) -> Result<()> {
        self.hot.write().refresh(record)
    }

    fn evict(&self, key: H::Key) -> Result<()> {
        self.hot.write().evict(key)
    }

    fn activate_local(&self, key: H::Key) -> Result<()> {
        self.hot.write().activate(key)
    }

    // --- Lifecycle ---

    /// Bootstrap from the cold store and subscribe to the store's channel.
    ///
    /// A no-op when already initialized or when serving defaults without
    /// bootstrap. The hot container is only touched once the subscription
    /// is in place, so a failed attempt can simply be retried.
    pub async fn init(&self) -> Result<()> {
        if self.can_skip_init() || self.is_initialized() {
            return Ok(());
        }

        let mut inbox = self.inbox.lock().await;
        if self.is_initialized() {
            return Ok(());
        }
        let ready = self.collaborators()?;

        let records = match ready.cold.find_all().await {
            Ok(records) => records,
            Err(e) if self.fall_back_to_default && self.is_default_set() => {
                warn!(
                    store = %self.name,
                    error = %e,
                    "Cold store unreadable, falling back to default"
                );
                self.default_records()
            }
            Err(e) => return Err(e),
        };

        let stream = ready.transport.subscribe(&self.channel_name).await?;
        let loaded = self.refresh_all(records)?;
        *inbox = Some(stream);
        self.initialized.store(true, Ordering::SeqCst);

        info!(
            store = %self.name,
            channel = %self.channel_name,
            records = loaded,
            "Live store initialized"
        );
        Ok(())
    }

    // --- Inbound messages ---

    /// Decode and apply one raw action message.
    ///
    /// Unknown command tokens are logged and ignored; a malformed id is
    /// returned as `BadId`.
    pub async fn apply_message(&self, raw: &str) -> Result<()> {
        let action = match ActionMessage::decode(raw) {
            Ok(action) => action,
            Err(CoherenceError::BadCommand(token)) => {
                warn!(store = %self.name, command = %token, "Ignoring unknown command");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.apply(action).await
    }

    /// Apply a decoded action message to the hot container.
    pub async fn apply(&self, action: ActionMessage) -> Result<()> {
        if !H::KIND.supports(action.command) {
            warn!(
                store = %self.name,
                command = %action.command,
                "Ignoring command unsupported by {} stores",
                H::KIND
            );
            return Ok(());
        }

        let key = action.id.map(<H::Key as RecordKey>::from_raw);
        debug!(store = %self.name, command = %action.command, id = ?action.id, "Applying action");

        match (action.command, key) {
            (Command::Update | Command::Add, Some(key)) => {
                // The record may be gone again if a delete raced this update
                if let Some(record) = self.cold()?.find(key).await? {
                    self.refresh_one(record)?;
                }
                Ok(())
            }
            (Command::Update | Command::Add, None) => {
                let records = self.cold()?.find_all().await?;
                let count = self.refresh_all(records)?;
                debug!(store = %self.name, records = count, "Resynchronized from cold store");
                Ok(())
            }
            (Command::Remove, Some(key)) => self.evict(key),
            (Command::Activate, Some(key)) => self.activate_local(key),
            (command, None) => {
                warn!(store = %self.name, command = %command, "Ignoring command without id");
                Ok(())
            }
        }
    }

    /// Apply every message currently queued in the inbox, in order.
    ///
    /// Returns how many were applied. Stops at the first failing message.
    /// Returns 0 straight away while a [`run`](Self::run) task owns the inbox.
    pub async fn drain(&self) -> Result<usize> {
        let _dispatch = self.dispatch.lock().await;
        let mut inbox = self.inbox.lock().await;
        let Some(stream) = inbox.as_mut() else {
            return Ok(0);
        };

        let mut applied = 0;
        while let Ok(message) = stream.try_recv() {
            self.apply_message(&message).await?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Apply inbound messages as they arrive until the stream closes.
    ///
    /// Intended to be spawned once per store. The task takes the inbox for
    /// its lifetime and hands it back when it stops or is aborted. Failing
    /// messages are logged and skipped.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let stream = self.inbox.lock().await.take();
        let Some(stream) = stream else {
            return Err(CoherenceError::NotInitialized(
                "no subscription to run, or a dispatcher already owns it",
            ));
        };
        let mut lease = InboxLease {
            inbox: &self.inbox,
            stream: Some(stream),
        };

        while let Some(message) = lease.recv().await {
            let _dispatch = self.dispatch.lock().await;
            if let Err(e) = self.apply_message(&message).await {
                error!(
                    store = %self.name,
                    message = %message,
                    error = %e,
                    "Failed to apply action"
                );
            }
        }
        info!(store = %self.name, "Subscription closed, dispatcher stopping");
        Ok(())
    }

    // --- Outbound messages ---

    /// Publish `action` on the store's channel.
    ///
    /// Called only after the cold store write succeeded. A failure here is
    /// logged and returned; nothing is rolled back or retried.
    pub(crate) async fn broadcast(
        &self,
        transport: &dyn Transport,
        action: ActionMessage,
    ) -> Result<()> {
        let message = action.encode();
        match transport.publish(&self.channel_name, &message).await {
            Ok(()) => {
                debug!(channel = %self.channel_name, message = %message, "Broadcast action");
                Ok(())
            }
            Err(e) => {
                error!(
                    channel = %self.channel_name,
                    message = %message,
                    error = %e,
                    "Broadcast failed after durable write; replicas stay stale until next update"
                );
                Err(e)
            }
        }
    }
}
