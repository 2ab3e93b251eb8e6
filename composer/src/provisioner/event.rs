use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Ordered string map handed to the handler on every lifecycle event
///
/// Key order is stable, so two bags with the same entries compare equal and
/// serialize identically. Equality of bags is what decides whether a
/// deployment touches the resource at all.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBag(BTreeMap<String, String>);

impl PropertyBag {
    pub fn new() -> Self {
        PropertyBag(BTreeMap::new())
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

impl FromIterator<(String, String)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        PropertyBag(iter.into_iter().collect())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "Create",
            EventKind::Update => "Update",
            EventKind::Delete => "Delete",
        }
    }
}

/// One lifecycle invocation of a resource handler
///
/// `old_properties` is only present on updates; it carries the bag the
/// resource was last provisioned with so the handler can diff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub kind: EventKind,
    pub request_id: Uuid,
    pub properties: PropertyBag,
    pub old_properties: Option<PropertyBag>,
}

impl ResourceEvent {
    pub fn new(kind: EventKind, properties: PropertyBag, old_properties: Option<PropertyBag>) -> Self {
        ResourceEvent {
            kind,
            request_id: Uuid::new_v4(),
            properties,
            old_properties,
        }
    }
}

/// Handler-side failure, with the reason the provisioner records
#[derive(Clone, Debug, thiserror::Error)]
#[error("{reason}")]
pub struct HandlerFailure {
    pub reason: String,
}

impl HandlerFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        HandlerFailure {
            reason: reason.into(),
        }
    }
}

/// Effectful side of a custom resource
///
/// Delivery is at least once: the provisioner re-sends events on retry, so
/// implementations must converge when invoked repeatedly with the same bag.
#[async_trait]
pub trait ResourceHandler {
    async fn handle(&mut self, event: &ResourceEvent) -> Result<(), HandlerFailure>;
}
