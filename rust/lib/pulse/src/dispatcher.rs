use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use futures::future::try_join_all;
use tracing::{debug, trace};

use crate::config::{DispatcherConfig, WildcardToken};
use crate::error::{ConfigError, DispatchError};
use crate::listener::{Listener, ListenerFuture, ListenerId, Reply};
use crate::pattern::IntoPatterns;
use crate::trie::{Bucket, PatternTrie, StoreHook};

/// Hook applied to a listener bucket every time a listener is appended to
/// it. Its return value replaces the bucket.
pub type StoreHandlersHook<T> = StoreHook<Listener<T>>;

struct Shared<T> {
    config: DispatcherConfig,
    trie: PatternTrie<Listener<T>>,
    hook: Option<StoreHandlersHook<T>>,
    /// Event most recently handed to an emit method. Last write wins.
    current_event: RwLock<Option<String>>,
}

/// In-process event dispatcher with delimited wildcard patterns.
///
/// Listeners are registered with `on(pattern, listener)` and triggered with
/// one of three emit methods:
/// - `emit` calls listeners synchronously as the walk finds them
/// - `emit_async_sequential` collects the listeners, then awaits them one
///   after the other
/// - `emit_async` calls listeners as the walk finds them and awaits all of
///   their futures together
///
/// Patterns are split on the delimiter (default `.`):
/// - `"user.created"`: exact match
/// - `"user.*.created"`: `*` matches exactly one segment
/// - `"user.**"`: matches `user` and everything below it
///
/// # Examples
///
/// ```ignore
/// let events: Dispatcher<Payload> = Dispatcher::new();
///
/// events.on("user.*.created", Listener::sync(|p: &Payload| notify(p)));
/// events.on("user.**", Listener::from_async(|p: &Payload| audit(p.clone())));
///
/// let payload = events.emit("user.42.created", payload)?;
/// events.emit_async("user.42.updated", payload).await?;
/// ```
///
/// Cloning is cheap and every clone drives the same listener tree.
pub struct Dispatcher<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: 'static> Dispatcher<T> {
    /// Create a dispatcher with `.` as delimiter and `*` as wildcard.
    pub fn new() -> Self {
        Self::from_parts(DispatcherConfig::default(), None)
    }

    /// Create a dispatcher from a config, rejecting unusable tokens.
    pub fn with_config(config: DispatcherConfig) -> Result<Self, ConfigError> {
        DispatcherBuilder::new().config(config).build()
    }

    pub fn builder() -> DispatcherBuilder<T> {
        DispatcherBuilder::new()
    }

    fn from_parts(config: DispatcherConfig, hook: Option<StoreHandlersHook<T>>) -> Self {
        debug!(
            delimiter = %config.delimiter,
            wildcard = %config.wildcard.single(),
            hook = hook.is_some(),
            "dispatcher created"
        );
        Self {
            shared: Arc::new(Shared {
                trie: PatternTrie::new(config.wildcard.single()),
                config,
                hook,
                current_event: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.shared.config
    }

    // ====================================================================
    // Registration
    // ====================================================================

    /// Register a listener under one pattern or a list of patterns.
    ///
    /// Passing `None` is a silent no-op.
    pub fn on(&self, patterns: impl IntoPatterns, listener: impl Into<Option<Listener<T>>>) {
        let Some(listener) = listener.into() else {
            return;
        };
        for pattern in patterns.into_patterns() {
            let bucket = self.shared.trie.insert(
                &self.segments(&pattern),
                listener.clone(),
                self.shared.hook.as_ref(),
            );
            trace!(%pattern, listener = %listener.id(), ?bucket, "listener registered");
        }
    }

    /// Register a listener that removes itself before its first call.
    ///
    /// With a list of patterns the same wrapper is registered under each and
    /// the first one to fire removes all of them. The returned handle cancels
    /// the registration; `None` is returned when no listener was given.
    pub fn once(
        &self,
        patterns: impl IntoPatterns,
        listener: impl Into<Option<Listener<T>>>,
    ) -> Option<OnceHandle<T>> {
        let listener = listener.into()?;
        let patterns = patterns.into_patterns();
        let id = ListenerId::next();

        let owner = Arc::downgrade(&self.shared);
        let key = patterns.clone();
        let fired = AtomicBool::new(false);
        let wrapper = Listener::with_id(id, move |args: &T| {
            if let Some(shared) = owner.upgrade() {
                Dispatcher { shared }.remove(&key, Some(id));
            }
            // A bucket snapshot taken before the removal may still hold us.
            if fired.swap(true, Ordering::AcqRel) {
                return Ok(Reply::Done);
            }
            listener.call(args)
        });

        self.on(patterns.clone(), wrapper);
        Some(OnceHandle {
            owner: Arc::downgrade(&self.shared),
            patterns,
            id,
        })
    }

    /// Alias for [`Dispatcher::on`].
    pub fn add_listener(
        &self,
        patterns: impl IntoPatterns,
        listener: impl Into<Option<Listener<T>>>,
    ) {
        self.on(patterns, listener)
    }

    /// Alias for [`Dispatcher::on`].
    pub fn add_event_listener(
        &self,
        patterns: impl IntoPatterns,
        listener: impl Into<Option<Listener<T>>>,
    ) {
        self.on(patterns, listener)
    }

    // ====================================================================
    // Removal
    // ====================================================================

    /// Remove a listener from one pattern or a list of patterns.
    ///
    /// With a listener, only its first registration in the addressed bucket
    /// is removed. Without one, the whole bucket is cleared. Nothing matching
    /// is a silent no-op.
    pub fn off(&self, patterns: impl IntoPatterns, listener: Option<&Listener<T>>) {
        self.remove(&patterns.into_patterns(), listener.map(Listener::id));
    }

    /// Alias for [`Dispatcher::off`].
    pub fn remove_listener(&self, patterns: impl IntoPatterns, listener: Option<&Listener<T>>) {
        self.off(patterns, listener)
    }

    /// Alias for [`Dispatcher::off`].
    pub fn remove_event_listener(
        &self,
        patterns: impl IntoPatterns,
        listener: Option<&Listener<T>>,
    ) {
        self.off(patterns, listener)
    }

    /// Drop every registration.
    ///
    /// Emissions already walking keep the old tree and finish against it.
    pub fn remove_all_listeners(&self) {
        self.shared.trie.clear();
        debug!("all listeners removed");
    }

    fn remove(&self, patterns: &[String], id: Option<ListenerId>) -> bool {
        let mut any = false;
        for pattern in patterns {
            let segments = self.segments(pattern);
            let removed = match id {
                Some(id) => {
                    let selected = move |listener: &Listener<T>| listener.id() == id;
                    self.shared.trie.remove(&segments, Some(&selected))
                }
                None => self.shared.trie.remove(&segments, None),
            };
            trace!(%pattern, listener = ?id, removed, "listener removal");
            any |= removed;
        }
        any
    }

    // ====================================================================
    // Emission
    // ====================================================================

    /// Emit synchronously; listeners run as the walk discovers them.
    ///
    /// Below-wildcard buckets run newest registration first, exact buckets
    /// oldest first. The first listener error stops the emission and is
    /// returned; listeners already called stay called.
    ///
    /// Futures returned by listeners are not awaited. Inside a Tokio runtime
    /// each one is spawned detached and its outcome is ignored; outside a
    /// runtime it is dropped unpolled.
    ///
    /// Returns `args` unchanged.
    pub fn emit(&self, event: &str, args: T) -> Result<T, DispatchError> {
        self.begin(event, "sync");
        let segments = self.segments(event);
        self.shared.trie.walk(
            &segments,
            &mut |bucket, listeners| -> Result<(), DispatchError> {
                for listener in eager_order(bucket, listeners) {
                    let reply = listener
                        .call(&args)
                        .map_err(|source| DispatchError::listener(event, source))?;
                    if let Reply::Pending(fut) = reply {
                        detach(event, fut);
                    }
                }
                Ok(())
            },
        )?;
        Ok(args)
    }

    /// Emit and await listeners strictly one after another.
    ///
    /// All matching listeners are collected first, every bucket in
    /// registration order, then each is called and its future awaited before
    /// the next one starts. The first error ends the sequence.
    ///
    /// Returns `args` unchanged.
    pub async fn emit_async_sequential(&self, event: &str, args: T) -> Result<T, DispatchError> {
        self.begin(event, "sequential");
        let listeners = self.collect(event);
        for listener in listeners {
            let reply = listener
                .call(&args)
                .map_err(|source| DispatchError::listener(event, source))?;
            if let Reply::Pending(fut) = reply {
                fut.await
                    .map_err(|source| DispatchError::listener(event, source))?;
            }
        }
        Ok(args)
    }

    /// Emit and await all listener futures together.
    ///
    /// Listeners are called in the same order as [`Dispatcher::emit`]. Each
    /// returned future is spawned on the Tokio runtime, so this must run
    /// inside one. The call resolves once every future has settled, or with
    /// the first failure observed; spawned futures are not cancelled by a
    /// failure and keep running detached.
    ///
    /// Returns `args` unchanged.
    pub async fn emit_async(&self, event: &str, args: T) -> Result<T, DispatchError> {
        self.begin(event, "parallel");
        let mut pending = Vec::new();
        let segments = self.segments(event);
        self.shared.trie.walk(
            &segments,
            &mut |bucket, listeners| -> Result<(), DispatchError> {
                for listener in eager_order(bucket, listeners) {
                    let reply = listener
                        .call(&args)
                        .map_err(|source| DispatchError::listener(event, source))?;
                    if let Reply::Pending(fut) = reply {
                        pending.push(tokio::spawn(fut));
                    }
                }
                Ok(())
            },
        )?;

        trace!(event, spawned = pending.len(), "awaiting listeners");
        try_join_all(pending.into_iter().map(|handle| async move {
            match handle.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(DispatchError::listener(event, source)),
                Err(source) => Err(DispatchError::ListenerTask {
                    event: event.to_string(),
                    source,
                }),
            }
        }))
        .await?;
        Ok(args)
    }

    // ====================================================================
    // Inspection
    // ====================================================================

    /// Listeners that would fire for `event`, in sequential emission order.
    pub fn listeners(&self, event: &str) -> Vec<Listener<T>> {
        self.collect(event)
    }

    /// Check if any listener would fire for `event`.
    pub fn has_listeners(&self, event: &str) -> bool {
        !self.collect(event).is_empty()
    }

    /// Check if anything is registered under exactly this pattern.
    pub fn has_pattern(&self, pattern: &str) -> bool {
        self.shared.trie.has_pattern(&self.segments(pattern))
    }

    /// Total number of registrations.
    pub fn listener_count(&self) -> usize {
        self.shared.trie.len()
    }

    /// The event most recently passed to an emit method.
    ///
    /// Shared by every emission on this dispatcher: nested or concurrent
    /// emissions overwrite each other, so inside a listener this is only
    /// reliable before the listener emits anything itself.
    pub fn current_event(&self) -> Option<String> {
        self.shared
            .current_event
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn begin(&self, event: &str, strategy: &'static str) {
        *self
            .shared
            .current_event
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(event.to_string());
        trace!(event, strategy, "emitting");
    }

    fn collect(&self, event: &str) -> Vec<Listener<T>> {
        let mut listeners = Vec::new();
        self.shared.trie.collect(&self.segments(event), &mut listeners);
        listeners
    }

    fn segments<'a>(&self, pattern: &'a str) -> Vec<&'a str> {
        pattern.split(self.shared.config.delimiter.as_str()).collect()
    }
}

impl<T: 'static> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Eager paths run below-wildcard buckets newest first while collecting paths
// keep registration order. Kept for compatibility with existing consumers;
// candidate for unifying on registration order.
fn eager_order<V>(bucket: Bucket, mut listeners: Vec<V>) -> Vec<V> {
    if bucket == Bucket::Below {
        listeners.reverse();
    }
    listeners
}

// Work left over by a listener under `emit`. Nothing awaits it.
fn detach(event: &str, fut: ListenerFuture) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(fut);
        }
        Err(_) => trace!(event, "no runtime, pending listener work dropped"),
    }
}

/// Cancels a [`Dispatcher::once`] registration.
pub struct OnceHandle<T> {
    owner: Weak<Shared<T>>,
    patterns: Vec<String>,
    id: ListenerId,
}

impl<T: 'static> OnceHandle<T> {
    /// Remove the wrapper from every pattern it was registered under.
    ///
    /// Returns `false` when there was nothing left to remove: the listener
    /// already fired, was cancelled before, or the dispatcher is gone.
    pub fn cancel(&self) -> bool {
        match self.owner.upgrade() {
            Some(shared) => Dispatcher { shared }.remove(&self.patterns, Some(self.id)),
            None => false,
        }
    }

    /// Identity of the registered wrapper.
    pub fn listener_id(&self) -> ListenerId {
        self.id
    }
}

/// Builds a [`Dispatcher`] with non-default settings.
pub struct DispatcherBuilder<T> {
    config: DispatcherConfig,
    hook: Option<StoreHandlersHook<T>>,
}

impl<T: 'static> DispatcherBuilder<T> {
    pub fn new() -> Self {
        Self {
            config: DispatcherConfig::default(),
            hook: None,
        }
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.config.delimiter = delimiter.into();
        self
    }

    pub fn wildcard(mut self, wildcard: impl Into<WildcardToken>) -> Self {
        self.config.wildcard = wildcard.into();
        self
    }

    /// Set a hook that receives a bucket right after a listener is appended
    /// and returns its replacement, e.g. to keep it sorted by priority.
    ///
    /// The hook runs while the bucket is locked and must not call back into
    /// the dispatcher.
    pub fn store_handlers_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(Vec<Listener<T>>) -> Vec<Listener<T>> + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<Dispatcher<T>, ConfigError> {
        self.config.validate()?;
        Ok(Dispatcher::from_parts(self.config, self.hook))
    }
}

impl<T: 'static> Default for DispatcherBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
