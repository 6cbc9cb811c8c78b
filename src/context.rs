//! Request-scoped context.
//!
//! A [`Context`] is an immutable chain of nodes. Deriving a child (attaching a
//! value, a cancellation point or a deadline) never changes the parent, so a
//! context can be cloned freely and shared between coroutines working on the
//! same request.
//!
//! Values are keyed by their Rust type. Modules store values under private
//! key types, which keeps unrelated users of the same context from ever
//! reading or shadowing each other's entries.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Clone)]
pub struct Context {
    node: Arc<Node>,
}

enum Node {
    Background,
    Value {
        parent: Context,
        key: TypeId,
        value: Arc<dyn Any + Send + Sync>,
    },
    Cancel {
        parent: Context,
        flag: Arc<AtomicBool>,
    },
    Deadline {
        parent: Context,
        at: Instant,
    },
}

impl Node {
    fn parent(&self) -> Option<&Context> {
        match self {
            Node::Background => None,
            Node::Value { parent, .. }
            | Node::Cancel { parent, .. }
            | Node::Deadline { parent, .. } => Some(parent),
        }
    }
}

/// Cancels the context returned alongside it by [`Context::with_cancel`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Cancel the context and every context derived from it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Context {
    /// An empty root context: no values, never cancelled, no deadline.
    pub fn background() -> Self {
        Self {
            node: Arc::new(Node::Background),
        }
    }

    fn derive(&self, node: Node) -> Self {
        Self { node: Arc::new(node) }
    }

    fn ancestors(&self) -> impl Iterator<Item = &Context> {
        std::iter::successors(Some(self), |&ctx| ctx.node.parent())
    }

    /// Derive a context carrying `value`, shadowing any value of the same type.
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.derive(Node::Value {
            parent: self.clone(),
            key: TypeId::of::<T>(),
            value: Arc::new(value),
        })
    }

    /// Look up the nearest value of type `T`.
    pub fn value<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let wanted = TypeId::of::<T>();
        self.ancestors().find_map(|ctx| match ctx.node.as_ref() {
            Node::Value { key, value, .. } if *key == wanted => {
                Arc::clone(value).downcast::<T>().ok()
            }
            _ => None,
        })
    }

    /// Derive a cancellable context.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = self.derive(Node::Cancel {
            parent: self.clone(),
            flag: Arc::clone(&flag),
        });
        (ctx, CancelHandle { flag })
    }

    /// Derive a context that expires at `at`.
    pub fn with_deadline(&self, at: Instant) -> Self {
        self.derive(Node::Deadline {
            parent: self.clone(),
            at,
        })
    }

    /// Derive a context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The earliest deadline in the chain.
    pub fn deadline(&self) -> Option<Instant> {
        self.ancestors()
            .filter_map(|ctx| match ctx.node.as_ref() {
                Node::Deadline { at, .. } => Some(*at),
                _ => None,
            })
            .min()
    }

    /// `Some` once this context or any ancestor has been cancelled or has expired.
    pub fn err(&self) -> Option<ContextError> {
        let now = Instant::now();
        self.ancestors().find_map(|ctx| match ctx.node.as_ref() {
            Node::Cancel { flag, .. } if flag.load(Ordering::Acquire) => {
                Some(ContextError::Cancelled)
            }
            Node::Deadline { at, .. } if *at <= now => Some(ContextError::DeadlineExceeded),
            _ => None,
        })
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.ancestors().count())
            .field("deadline", &self.deadline())
            .field("err", &self.err())
            .finish()
    }
}
