use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Error type a listener may fail with.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// A boxed, `Send`-able future returned by asynchronous listeners.
pub type ListenerFuture = Pin<Box<dyn Future<Output = Result<(), ListenerError>> + Send>>;

type Callback<T> = dyn Fn(&T) -> Result<Reply, ListenerError> + Send + Sync;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// What a listener hands back once its synchronous part has run.
pub enum Reply {
    /// All work is done.
    Done,
    /// Work continues in the future. Async emissions await it, `emit` drops it.
    Pending(ListenerFuture),
}

impl Reply {
    /// Wrap a future as a pending reply.
    pub fn pending<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        Reply::Pending(Box::pin(fut))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Done => f.write_str("Done"),
            Reply::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Identity of a listener. Clones of a [`Listener`] share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reference to an event handler.
///
/// The callback receives the emission arguments by reference and runs its
/// synchronous part right away. It may return a future for the rest of the
/// work (see [`Reply`]); an `Err` is the handler failing.
///
/// Identity is the [`ListenerId`] assigned at construction, not the closure:
/// clone a listener to register or remove the same handler elsewhere.
/// Registering one listener twice makes it fire twice.
///
/// # Examples
///
/// ```ignore
/// let log = Listener::sync(|args: &String| println!("got {args}"));
///
/// let save = Listener::from_async(|args: &String| {
///     let args = args.clone();
///     async move {
///         db.save(args).await?;
///         Ok(())
///     }
/// });
/// ```
pub struct Listener<T> {
    id: ListenerId,
    callback: Arc<Callback<T>>,
}

impl<T> Listener<T> {
    /// Create a listener from a callback returning a [`Reply`].
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&T) -> Result<Reply, ListenerError> + Send + Sync + 'static,
    {
        Self::with_id(ListenerId::next(), callback)
    }

    /// Create a listener that always finishes synchronously and never fails.
    pub fn sync<F>(callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self::new(move |args| {
            callback(args);
            Ok(Reply::Done)
        })
    }

    /// Create a listener whose work is an async block.
    ///
    /// The closure itself runs during the walk; only the returned future is
    /// deferred. Copy out of `args` whatever the future needs.
    pub fn from_async<F, Fut>(callback: F) -> Self
    where
        F: Fn(&T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        Self::new(move |args| Ok(Reply::pending(callback(args))))
    }

    pub(crate) fn with_id<F>(id: ListenerId, callback: F) -> Self
    where
        F: Fn(&T) -> Result<Reply, ListenerError> + Send + Sync + 'static,
    {
        Self {
            id,
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Invoke the callback.
    pub fn call(&self, args: &T) -> Result<Reply, ListenerError> {
        (self.callback)(args)
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}
