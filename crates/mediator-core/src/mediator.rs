//! Type-keyed pipeline registry.
//!
//! A [`Mediator`] owns one [`Pipeline`] per message type. Cross-cutting
//! behaviors that apply to every message type are installed as a [`Layer`]
//! on the [`MediatorBuilder`]; the layer wraps each pipeline as it is
//! registered.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{DispatchResult, MediatorError};
use crate::message::Message;
use crate::pipeline::{Handler, Pipeline};

/// Wraps every pipeline registered after it.
///
/// Implemented for open (generic) behaviors that must run for every
/// message/response pairing.
pub trait Layer: Send + Sync {
    fn layer<M: Message, R: Send + 'static>(&self, pipeline: Pipeline<M, R>) -> Pipeline<M, R>;
}

/// Layer that leaves pipelines untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Layer for Identity {
    fn layer<M: Message, R: Send + 'static>(&self, pipeline: Pipeline<M, R>) -> Pipeline<M, R> {
        pipeline
    }
}

/// Two layers; `outer` runs in front of `inner`.
#[derive(Debug, Clone)]
pub struct Stack<Outer, Inner> {
    outer: Outer,
    inner: Inner,
}

impl<Outer: Layer, Inner: Layer> Layer for Stack<Outer, Inner> {
    fn layer<M: Message, R: Send + 'static>(&self, pipeline: Pipeline<M, R>) -> Pipeline<M, R> {
        self.outer.layer(self.inner.layer(pipeline))
    }
}

/// Routes each message to the pipeline registered for its type.
pub struct Mediator {
    pipelines: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Mediator {
    /// Start building a mediator with no layers.
    pub fn builder() -> MediatorBuilder<Identity> {
        MediatorBuilder {
            layer: Identity,
            pipelines: HashMap::new(),
        }
    }

    /// Dispatch `message` and wait for its response.
    ///
    /// Fails with [`MediatorError::HandlerNotFound`] when nothing is
    /// registered for `M` returning `R`.
    pub async fn send<M, R>(&self, message: M, cancel: CancellationToken) -> DispatchResult<R>
    where
        M: Message,
        R: Send + 'static,
    {
        let pipeline = self
            .pipelines
            .get(&TypeId::of::<M>())
            .and_then(|p| Arc::clone(p).downcast::<Pipeline<M, R>>().ok())
            .ok_or(MediatorError::HandlerNotFound {
                message_type: type_name::<M>(),
                response_type: type_name::<R>(),
            })?;

        pipeline.send(message, cancel).await
    }

    /// Whether a pipeline is registered for `M`.
    pub fn handles<M: Message>(&self) -> bool {
        self.pipelines.contains_key(&TypeId::of::<M>())
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("pipelines", &self.pipelines.len())
            .finish()
    }
}

/// Builder for [`Mediator`].
///
/// Layers apply to pipelines registered after the layer is added, so add
/// layers first.
pub struct MediatorBuilder<L> {
    layer: L,
    pipelines: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl<L: Layer> MediatorBuilder<L> {
    /// Add a layer. Layers added earlier run further out.
    pub fn layer<N: Layer>(self, layer: N) -> MediatorBuilder<Stack<L, N>> {
        MediatorBuilder {
            layer: Stack {
                outer: self.layer,
                inner: layer,
            },
            pipelines: self.pipelines,
        }
    }

    /// Register a bare handler for `M`.
    #[must_use]
    pub fn handler<M, R, H>(self, handler: H) -> Self
    where
        M: Message,
        R: Send + 'static,
        H: Handler<M, R> + 'static,
    {
        self.pipeline(Pipeline::new(handler))
    }

    /// Register a pipeline for `M`, wrapped by the current layers.
    ///
    /// A later registration for the same message type replaces the earlier one.
    #[must_use]
    pub fn pipeline<M, R>(mut self, pipeline: Pipeline<M, R>) -> Self
    where
        M: Message,
        R: Send + 'static,
    {
        let message_type = M::message_type();
        let pipeline = self.layer.layer(pipeline);
        if self
            .pipelines
            .insert(TypeId::of::<M>(), Arc::new(pipeline))
            .is_some()
        {
            tracing::warn!(
                message_type = %message_type,
                "Replacing previously registered pipeline"
            );
        }
        self
    }

    pub fn build(self) -> Mediator {
        tracing::debug!(pipelines = self.pipelines.len(), "Mediator built");
        Mediator {
            pipelines: self.pipelines,
        }
    }
}
