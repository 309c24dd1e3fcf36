//! Pulse: in-process event dispatcher.
//!
//! Decoupled components register interest in structured event names and
//! get called when a matching event is emitted, without knowing about each
//! other.
//!
//! # Primitives
//!
//! - `on(pattern, listener)` / `once(pattern, listener)`: register
//! - `off(pattern, listener)`: remove one registration, or a whole bucket
//! - `emit(event, args)`: call listeners synchronously as they are found
//! - `emit_async_sequential(event, args)`: await listeners one by one
//! - `emit_async(event, args)`: start all listeners, await them together
//!
//! # Pattern Matching
//!
//! Event names and patterns are split on a delimiter (`.` by default):
//! - Exact: `user.created`
//! - Single segment: `user.*.created` matches `user.42.created`
//! - Everything below: `user.**` matches `user`, `user.42`, `user.42.created`
//! - All: `**` matches every event
//!
//! The wildcard token is configurable; the match-below token is always the
//! wildcard repeated twice.
//!
//! # Example
//!
//! ```ignore
//! use openerp_pulse::{Dispatcher, Listener};
//!
//! let events: Dispatcher<Order> = Dispatcher::new();
//!
//! events.on("order.*.paid", Listener::sync(|order: &Order| {
//!     println!("paid: {}", order.id);
//! }));
//!
//! events.on("order.**", Listener::from_async(|order: &Order| {
//!     let order = order.clone();
//!     async move { audit(order).await }
//! }));
//!
//! let order = events.emit("order.42.paid", order)?;
//! events.emit_async("order.42.shipped", order).await?;
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod pattern;
pub mod trie;

// Re-export primary types at crate root.
pub use config::{DispatcherConfig, WildcardToken};
pub use dispatcher::{Dispatcher, DispatcherBuilder, OnceHandle, StoreHandlersHook};
pub use error::{ConfigError, DispatchError};
pub use listener::{Listener, ListenerError, ListenerFuture, ListenerId, Reply};
pub use pattern::IntoPatterns;
pub use trie::{Bucket, PatternTrie, StoreHook};
