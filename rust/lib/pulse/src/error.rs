use thiserror::Error;

use crate::listener::ListenerError;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("delimiter must not be empty")]
    EmptyDelimiter,

    #[error("wildcard token must not be empty")]
    EmptyWildcard,

    #[error("wildcard token {wildcard:?} contains delimiter {delimiter:?}")]
    WildcardContainsDelimiter { wildcard: String, delimiter: String },
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("listener failed while handling {event:?}: {source}")]
    Listener {
        event: String,
        #[source]
        source: ListenerError,
    },

    #[error("listener task for {event:?} did not complete: {source}")]
    ListenerTask {
        event: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl DispatchError {
    pub(crate) fn listener(event: &str, source: ListenerError) -> Self {
        DispatchError::Listener {
            event: event.to_string(),
            source,
        }
    }

    /// The event whose emission failed.
    pub fn event(&self) -> &str {
        match self {
            DispatchError::Listener { event, .. } | DispatchError::ListenerTask { event, .. } => {
                event
            }
        }
    }
}
