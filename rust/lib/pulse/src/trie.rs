use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Hook applied to a bucket right after a value is appended to it.
///
/// Receives the whole bucket and returns its replacement, so callers can
/// keep a bucket sorted or deduplicated without the trie knowing why.
pub type StoreHook<V> = Arc<dyn Fn(Vec<V>) -> Vec<V> + Send + Sync>;

/// Which bucket of a node a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Values whose pattern ends exactly at the node.
    Exact,
    /// Values registered with the double wildcard: they match the node and
    /// everything beneath it.
    Below,
}

/// A segment trie for delimited wildcard patterns.
///
/// Patterns are handed over already split into segments. Two tokens are
/// special:
/// - the single wildcard (default `*`) matches exactly one segment
/// - the double wildcard (the single token twice, `**`) matches the current
///   position and every deeper one; it is terminal, later segments of the
///   pattern are ignored
///
/// # Examples
///
/// ```ignore
/// let trie = PatternTrie::new("*");
/// trie.insert(&["user", "*", "created"], 1, None);
/// trie.insert(&["user", "**"], 2, None);
///
/// let mut seen = Vec::new();
/// trie.collect(&["user", "42", "created"], &mut seen); // [2, 1]
/// ```
///
/// Every node sits behind its own lock and no lock is held while a walk
/// visitor runs, so visitors may insert or remove values mid-walk. Each
/// bucket is snapshotted when the walk reaches it.
pub struct PatternTrie<V> {
    root: RwLock<NodeRef<V>>,
    single: String,
    double: String,
}

type NodeRef<V> = Arc<RwLock<PatternNode<V>>>;

struct PatternNode<V> {
    /// Literal children, keyed by segment. Never keyed by a wildcard token.
    children: HashMap<String, NodeRef<V>>,
    /// Single-wildcard child, created on first use.
    wildcard: Option<NodeRef<V>>,
    /// Values whose pattern terminates here.
    handlers: Vec<V>,
    /// Values matching this node and every descendant.
    below: Vec<V>,
}

impl<V> PatternNode<V> {
    fn shared() -> NodeRef<V> {
        Arc::new(RwLock::new(Self {
            children: HashMap::new(),
            wildcard: None,
            handlers: Vec::new(),
            below: Vec::new(),
        }))
    }
}

impl<V: Clone> PatternTrie<V> {
    /// Create an empty trie using `wildcard` as the single-segment token.
    /// The double wildcard is `wildcard` repeated twice.
    pub fn new(wildcard: &str) -> Self {
        Self {
            root: RwLock::new(PatternNode::shared()),
            single: wildcard.to_string(),
            double: wildcard.repeat(2),
        }
    }

    /// Insert a value under the given pattern segments.
    ///
    /// Returns the bucket the value was appended to. When `hook` is given it
    /// is applied to that bucket after the append.
    pub fn insert(&self, segments: &[&str], value: V, hook: Option<&StoreHook<V>>) -> Bucket {
        let mut node = self.root();

        for &segment in segments {
            if segment == self.double {
                let mut guard = write(&node);
                guard.below.push(value);
                apply_hook(&mut guard.below, hook);
                return Bucket::Below;
            }

            let next = {
                let mut guard = write(&node);
                if segment == self.single {
                    Arc::clone(guard.wildcard.get_or_insert_with(PatternNode::shared))
                } else {
                    Arc::clone(
                        guard
                            .children
                            .entry(segment.to_string())
                            .or_insert_with(PatternNode::shared),
                    )
                }
            };
            node = next;
        }

        let mut guard = write(&node);
        guard.handlers.push(value);
        apply_hook(&mut guard.handlers, hook);
        Bucket::Exact
    }

    /// Remove values from the bucket addressed by the pattern segments.
    ///
    /// With no selector the whole bucket is cleared. With a selector only the
    /// first value it accepts is removed. A pattern that leads off the trie
    /// removes nothing.
    ///
    /// Returns `true` if anything was removed.
    pub fn remove(&self, segments: &[&str], selector: Option<&dyn Fn(&V) -> bool>) -> bool {
        let mut node = self.root();

        for &segment in segments {
            if segment == self.double {
                let removed = take_from(&mut write(&node).below, selector);
                return removed;
            }

            let next = {
                let guard = read(&node);
                if segment == self.single {
                    guard.wildcard.clone()
                } else {
                    guard.children.get(segment).cloned()
                }
            };
            match next {
                Some(child) => node = child,
                None => return false,
            }
        }

        let removed = take_from(&mut write(&node).handlers, selector);
        removed
    }

    /// Walk every bucket matching a concrete event path.
    ///
    /// At each depth the walk visits the node's below bucket, then descends
    /// into the wildcard child, then into the literal child for the current
    /// segment. Once the segments are exhausted the node's exact bucket is
    /// visited. Empty buckets are skipped. Buckets are handed over in
    /// registration order; ordering policy is the caller's business.
    ///
    /// The first visitor error stops the walk and is returned.
    pub fn walk<E, F>(&self, segments: &[&str], visit: &mut F) -> Result<(), E>
    where
        F: FnMut(Bucket, Vec<V>) -> Result<(), E>,
    {
        let root = self.root();
        walk_node(&root, segments, 0, visit)
    }

    /// Collect every value matching a concrete event path, in walk order.
    pub fn collect(&self, segments: &[&str], out: &mut Vec<V>) {
        let walked = self.walk(segments, &mut |_, values: Vec<V>| {
            out.extend(values);
            Ok::<(), std::convert::Infallible>(())
        });
        if let Err(never) = walked {
            match never {}
        }
    }

    /// Check if any values are stored at the exact pattern (not matching).
    pub fn has_pattern(&self, segments: &[&str]) -> bool {
        let mut node = self.root();

        for &segment in segments {
            if segment == self.double {
                let has = !read(&node).below.is_empty();
                return has;
            }
            let next = {
                let guard = read(&node);
                if segment == self.single {
                    guard.wildcard.clone()
                } else {
                    guard.children.get(segment).cloned()
                }
            };
            match next {
                Some(child) => node = child,
                None => return false,
            }
        }

        let has = !read(&node).handlers.is_empty();
        has
    }

    /// Total number of stored values across all buckets.
    pub fn len(&self) -> usize {
        count(&self.root())
    }

    /// Check if the trie holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the whole tree and start over with an empty root.
    ///
    /// Walks already in progress keep their reference to the old tree and
    /// finish against it.
    pub fn clear(&self) {
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = PatternNode::shared();
    }

    fn root(&self) -> NodeRef<V> {
        Arc::clone(&self.root.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn walk_node<V, E, F>(
    node: &NodeRef<V>,
    segments: &[&str],
    index: usize,
    visit: &mut F,
) -> Result<(), E>
where
    V: Clone,
    F: FnMut(Bucket, Vec<V>) -> Result<(), E>,
{
    let below = read(node).below.clone();
    if !below.is_empty() {
        visit(Bucket::Below, below)?;
    }

    if index == segments.len() {
        let handlers = read(node).handlers.clone();
        if !handlers.is_empty() {
            visit(Bucket::Exact, handlers)?;
        }
        return Ok(());
    }

    let wildcard = read(node).wildcard.clone();
    if let Some(child) = wildcard {
        walk_node(&child, segments, index + 1, visit)?;
    }

    let literal = read(node).children.get(segments[index]).cloned();
    if let Some(child) = literal {
        walk_node(&child, segments, index + 1, visit)?;
    }

    Ok(())
}

fn count<V>(node: &NodeRef<V>) -> usize {
    let guard = read(node);
    let mut total = guard.handlers.len() + guard.below.len();
    if let Some(ref wildcard) = guard.wildcard {
        total += count(wildcard);
    }
    for child in guard.children.values() {
        total += count(child);
    }
    total
}

fn apply_hook<V>(bucket: &mut Vec<V>, hook: Option<&StoreHook<V>>) {
    if let Some(hook) = hook {
        let current = std::mem::take(bucket);
        *bucket = hook(current);
    }
}

fn take_from<V>(bucket: &mut Vec<V>, selector: Option<&dyn Fn(&V) -> bool>) -> bool {
    match selector {
        None => {
            let had_values = !bucket.is_empty();
            bucket.clear();
            had_values
        }
        Some(selected) => match bucket.iter().position(|v| selected(v)) {
            Some(idx) => {
                bucket.remove(idx);
                true
            }
            None => false,
        },
    }
}

// Buckets are only ever replaced or edited as whole vectors, so a poisoned
// lock still guards a consistent node.
fn read<V>(node: &RwLock<V>) -> RwLockReadGuard<'_, V> {
    node.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<V>(node: &RwLock<V>) -> RwLockWriteGuard<'_, V> {
    node.write().unwrap_or_else(PoisonError::into_inner)
}
