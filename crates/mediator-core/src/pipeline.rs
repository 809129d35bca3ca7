//! Continuations, behaviors, handlers and pipelines.
//!
//! ```text
//! send ──► behavior[0] ──► behavior[1] ──► ... ──► handler
//!             │ next          │ next
//! ```
//!
//! `behavior[0]` is the outermost stage. Each stage receives a [`Next`] that
//! runs the remaining stages and the handler.

use futures::future::BoxFuture;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchResult;
use crate::message::Message;

type NextFn<M, R> =
    Box<dyn FnOnce(M, CancellationToken) -> BoxFuture<'static, DispatchResult<R>> + Send>;

/// The rest of the pipeline, ending in the terminal handler.
///
/// Consumed by [`Next::run`], so a behavior can dispatch at most once.
pub struct Next<M, R> {
    inner: NextFn<M, R>,
}

impl<M, R> Next<M, R> {
    /// Wrap a continuation.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(M, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = DispatchResult<R>> + Send + 'static,
    {
        Self {
            inner: Box::new(move |message, cancel| Box::pin(f(message, cancel))),
        }
    }

    /// Dispatch the message through the remaining stages.
    pub fn run(
        self,
        message: M,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, DispatchResult<R>> {
        (self.inner)(message, cancel)
    }
}

impl<M, R> std::fmt::Debug for Next<M, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// A decorator invoked for every dispatch of `M`.
///
/// Implementations may run code before and after `next`, or short-circuit
/// by not calling it at all.
pub trait PipelineBehavior<M: Message, R>: Send + Sync {
    fn handle<'a>(
        &'a self,
        message: M,
        next: Next<M, R>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, DispatchResult<R>>;
}

impl<M: Message, R, B> PipelineBehavior<M, R> for Arc<B>
where
    B: PipelineBehavior<M, R> + ?Sized,
{
    fn handle<'a>(
        &'a self,
        message: M,
        next: Next<M, R>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, DispatchResult<R>> {
        (**self).handle(message, next, cancel)
    }
}

/// Terminal handler producing the response for `M`.
pub trait Handler<M: Message, R>: Send + Sync {
    fn handle(&self, message: M, cancel: CancellationToken) -> BoxFuture<'_, DispatchResult<R>>;
}

/// Handler backed by an async closure. See [`handler_fn`].
pub struct FnHandler<F, M, R> {
    f: F,
    _marker: PhantomData<fn(M) -> R>,
}

/// Build a [`Handler`] from an async closure.
///
/// ```
/// use mediator_core::{handler_fn, CancellationToken, Message};
///
/// struct Ping;
/// impl Message for Ping {}
///
/// let handler = handler_fn(|_: Ping, _: CancellationToken| async { Ok("pong") });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut, M, R>(f: F) -> FnHandler<F, M, R>
where
    F: Fn(M, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = DispatchResult<R>> + Send + 'static,
{
    FnHandler {
        f,
        _marker: PhantomData,
    }
}

impl<F, Fut, M, R> Handler<M, R> for FnHandler<F, M, R>
where
    M: Message,
    F: Fn(M, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = DispatchResult<R>> + Send + 'static,
{
    fn handle(&self, message: M, cancel: CancellationToken) -> BoxFuture<'_, DispatchResult<R>> {
        Box::pin((self.f)(message, cancel))
    }
}

/// Ordered behaviors wrapped around one handler.
pub struct Pipeline<M, R> {
    handler: Arc<dyn Handler<M, R>>,
    behaviors: Vec<Arc<dyn PipelineBehavior<M, R>>>,
}

impl<M, R> Clone for Pipeline<M, R> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            behaviors: self.behaviors.clone(),
        }
    }
}

impl<M: Message, R: Send + 'static> Pipeline<M, R> {
    /// Create a pipeline with no behaviors.
    pub fn new<H>(handler: H) -> Self
    where
        H: Handler<M, R> + 'static,
    {
        Self {
            handler: Arc::new(handler),
            behaviors: Vec::new(),
        }
    }

    /// Append a behavior as the innermost stage.
    #[must_use]
    pub fn with_behavior<B>(mut self, behavior: B) -> Self
    where
        B: PipelineBehavior<M, R> + 'static,
    {
        self.behaviors.push(Arc::new(behavior));
        self
    }

    /// Insert a behavior as the outermost stage.
    #[must_use]
    pub fn wrap(mut self, behavior: Arc<dyn PipelineBehavior<M, R>>) -> Self {
        self.behaviors.insert(0, behavior);
        self
    }

    /// Number of behaviors in front of the handler.
    pub fn depth(&self) -> usize {
        self.behaviors.len()
    }

    /// Dispatch `message` through every stage.
    pub fn send(
        &self,
        message: M,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, DispatchResult<R>> {
        let handler = Arc::clone(&self.handler);
        let mut next: Next<M, R> = Next::new(move |message, cancel| async move {
            handler.handle(message, cancel).await
        });

        for behavior in self.behaviors.iter().rev() {
            let behavior = Arc::clone(behavior);
            let inner = next;
            next = Next::new(move |message, cancel| async move {
                behavior.handle(message, inner, cancel).await
            });
        }

        next.run(message, cancel)
    }
}
