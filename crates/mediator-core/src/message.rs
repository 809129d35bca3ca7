//! Message identity.

use std::any::{type_name, TypeId};
use std::fmt;

/// Namespace reported for types whose path has no module component.
pub const GLOBAL_NAMESPACE: &str = "global";

/// A request dispatched through the mediator.
///
/// The default identity comes from the Rust type path: the last path
/// segment is the name and everything before it is the namespace.
/// Implementors can override [`Message::message_type`] to publish a stable
/// identity independent of module layout.
pub trait Message: Send + 'static {
    /// Identity used for routing and instrumentation.
    fn message_type() -> MessageType
    where
        Self: Sized,
    {
        MessageType::of::<Self>()
    }
}

/// Type identity of a message: its [`TypeId`], short name and namespace.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageType {
    id: TypeId,
    name: &'static str,
    namespace: Option<&'static str>,
}

impl MessageType {
    /// Derive the identity of `T` from its type path.
    pub fn of<T: ?Sized + 'static>() -> Self {
        let (namespace, name) = split_type_path(type_name::<T>());
        Self {
            id: TypeId::of::<T>(),
            name,
            namespace,
        }
    }

    /// Identity of `T` with an explicit name and namespace.
    pub fn named<T: ?Sized + 'static>(name: &'static str, namespace: Option<&'static str>) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
            namespace,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Short type name, e.g. `CreateOrder`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declaring namespace, e.g. `shop::orders`. `None` for path-less types.
    pub fn namespace(&self) -> Option<&'static str> {
        self.namespace
    }

    /// Namespace, or [`GLOBAL_NAMESPACE`] when the type has none.
    pub fn namespace_or_global(&self) -> &'static str {
        self.namespace.unwrap_or(GLOBAL_NAMESPACE)
    }

    /// Whether this identity belongs to `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageType")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace {
            Some(ns) => write!(f, "{ns}::{}", self.name),
            None => f.write_str(self.name),
        }
    }
}

/// Split `a::b::Foo<c::Bar>` into (`Some("a::b")`, `"Foo<c::Bar>"`).
///
/// Generic arguments stay with the name. Tuples, slices, arrays and
/// references have no namespace.
fn split_type_path(path: &'static str) -> (Option<&'static str>, &'static str) {
    if path.starts_with(['(', '[', '&', '*']) {
        return (None, path);
    }
    let base_end = path.find('<').unwrap_or(path.len());
    match path[..base_end].rfind("::") {
        Some(idx) => (Some(&path[..idx]), &path[idx + 2..]),
        None => (None, path),
    }
}
