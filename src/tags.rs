//! Tag keys and the per-dispatch tag set.

use mediator_core::MessageType;
use opentelemetry::{Key, KeyValue, Value};

/// Protocol family of the instrumented operation.
pub const MESSAGING_SYSTEM: &str = "messaging.system";
/// Kind of messaging operation.
pub const MESSAGING_OPERATION: &str = "messaging.operation";
/// Short name of the dispatched message type.
pub const MESSAGING_MESSAGE_TYPE: &str = "messaging.message.type";
/// Namespace declaring the message type.
pub const CODE_NAMESPACE: &str = "code.namespace";
/// Downstream duration in whole milliseconds, as a string.
pub const MESSAGING_TIME_DURATION: &str = "messaging.time.duration";
/// `success` or `error`.
pub const MESSAGING_OPERATION_STATUS: &str = "messaging.operation.status";
/// Set to `true` on failed dispatches.
pub const ERROR: &str = "error";
/// Serialized response, written by [`JsonResponse`](crate::JsonResponse).
pub const MESSAGING_RESPONSE_BODY: &str = "messaging.response.body";

pub const SYSTEM_MEDIATOR: &str = "mediator";
pub const OPERATION_PROCESS: &str = "process";
pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

/// Ordered tags built for one dispatch.
///
/// Handed to the enrichment strategy before the downstream call, then
/// extended with the outcome and used as the attribute set for dispatch
/// metrics. Duplicate keys are kept in insertion order; lookups return the
/// first match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSet {
    tags: Vec<KeyValue>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Baseline tags describing `message_type`.
    pub fn for_message(message_type: &MessageType) -> Self {
        let mut tags = Self {
            tags: Vec::with_capacity(6),
        };
        tags.add(MESSAGING_SYSTEM, SYSTEM_MEDIATOR);
        tags.add(MESSAGING_OPERATION, OPERATION_PROCESS);
        tags.add(MESSAGING_MESSAGE_TYPE, message_type.name());
        tags.add(CODE_NAMESPACE, message_type.namespace_or_global());
        tags
    }

    pub fn add(&mut self, key: impl Into<Key>, value: impl Into<Value>) {
        self.tags.push(KeyValue::new(key, value));
    }

    pub fn push(&mut self, tag: KeyValue) {
        self.tags.push(tag);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.tags
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyValue> {
        self.tags.iter()
    }

    pub fn as_slice(&self) -> &[KeyValue] {
        &self.tags
    }
}

impl Extend<KeyValue> for TagSet {
    fn extend<I: IntoIterator<Item = KeyValue>>(&mut self, iter: I) {
        self.tags.extend(iter);
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a KeyValue;
    type IntoIter = std::slice::Iter<'a, KeyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl From<TagSet> for Vec<KeyValue> {
    fn from(tags: TagSet) -> Self {
        tags.tags
    }
}
