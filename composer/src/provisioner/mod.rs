//! Custom-resource provisioning
//!
//! A [`Provisioner`] drives one logical resource through its lifecycle by
//! diffing desired property bags against what was last applied and invoking
//! the resource handler with Create/Update/Delete events. The handler owns
//! the side effects; the provisioner owns the state machine and its
//! history.

pub mod event;
pub mod state;

pub use event::{EventKind, HandlerFailure, PropertyBag, ResourceEvent, ResourceHandler};
pub use state::{State, Transition};

use chrono::Utc;

/// What a reconcile pass did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    Created,
    Updated,
    /// The desired bag matched the applied bag; the handler was not invoked
    Unchanged,
}

/// How a delete failure is treated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Log the failure and consider the resource gone
    #[default]
    BestEffort,
    /// Surface the failure and keep the resource in `DeleteFailed`
    Strict,
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("create of {logical_id} failed: {reason}")]
    CreateFailed { logical_id: String, reason: String },

    #[error("update of {logical_id} failed: {reason}")]
    UpdateFailed { logical_id: String, reason: String },

    #[error("delete of {logical_id} failed: {reason}")]
    DeleteFailed { logical_id: String, reason: String },
}

/// State machine for one custom resource
///
/// Events are delivered at least once: a failed pass leaves the machine in
/// the matching failed state, and the next pass re-invokes the handler with
/// the same intent. Nothing is cleaned up in between, which is exactly why
/// handlers must be idempotent.
pub struct Provisioner<H> {
    logical_id: String,
    handler: H,
    policy: DeletePolicy,
    state: State,
    applied: Option<PropertyBag>,
    history: Vec<Transition>,
}

impl<H: ResourceHandler> Provisioner<H> {
    pub fn new(logical_id: &str, handler: H, policy: DeletePolicy) -> Self {
        Provisioner {
            logical_id: logical_id.to_string(),
            handler,
            policy,
            state: State::Pending,
            applied: None,
            history: Vec::new(),
        }
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Bag the resource was last successfully provisioned with
    pub fn applied(&self) -> Option<&PropertyBag> {
        self.applied.as_ref()
    }

    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// Drive the resource towards the desired bag
    ///
    /// Absent resource: Create. Identical bag: steady state, no handler
    /// invocation. Any changed value: a single Update carrying both bags.
    pub async fn reconcile(
        &mut self,
        desired: &PropertyBag,
    ) -> Result<Reconciliation, ProvisionError> {
        match &self.applied {
            Some(applied) if applied == desired => {
                log::debug!("{} is in steady state", self.logical_id);
                Ok(Reconciliation::Unchanged)
            }
            Some(applied) => {
                let event = ResourceEvent::new(
                    EventKind::Update,
                    desired.clone(),
                    Some(applied.clone()),
                );
                self.transition(State::UpdateInProgress, Some(event.request_id));

                match self.handler.handle(&event).await {
                    Ok(()) => {
                        self.applied = Some(desired.clone());
                        self.transition(State::UpdateComplete, Some(event.request_id));
                        Ok(Reconciliation::Updated)
                    }
                    Err(failure) => {
                        self.transition(State::UpdateFailed, Some(event.request_id));
                        Err(ProvisionError::UpdateFailed {
                            logical_id: self.logical_id.clone(),
                            reason: failure.reason,
                        })
                    }
                }
            }
            None => {
                let event = ResourceEvent::new(EventKind::Create, desired.clone(), None);
                self.transition(State::CreateInProgress, Some(event.request_id));

                match self.handler.handle(&event).await {
                    Ok(()) => {
                        self.applied = Some(desired.clone());
                        self.transition(State::CreateComplete, Some(event.request_id));
                        Ok(Reconciliation::Created)
                    }
                    Err(failure) => {
                        self.transition(State::CreateFailed, Some(event.request_id));
                        Err(ProvisionError::CreateFailed {
                            logical_id: self.logical_id.clone(),
                            reason: failure.reason,
                        })
                    }
                }
            }
        }
    }

    /// Tear the resource down
    ///
    /// The handler always gets the Delete event, even when nothing was ever
    /// applied, mirroring how deployment engines deliver deletes for
    /// half-created resources.
    pub async fn delete(&mut self) -> Result<(), ProvisionError> {
        let properties = self.applied.clone().unwrap_or_default();
        let event = ResourceEvent::new(EventKind::Delete, properties, None);
        self.transition(State::DeleteInProgress, Some(event.request_id));

        match self.handler.handle(&event).await {
            Ok(()) => {
                self.applied = None;
                self.transition(State::DeleteComplete, Some(event.request_id));
                Ok(())
            }
            Err(failure) => match self.policy {
                DeletePolicy::BestEffort => {
                    log::warn!(
                        "delete of {} failed ({}), dropping the resource anyway",
                        self.logical_id,
                        failure.reason
                    );
                    self.applied = None;
                    self.transition(State::DeleteComplete, Some(event.request_id));
                    Ok(())
                }
                DeletePolicy::Strict => {
                    self.transition(State::DeleteFailed, Some(event.request_id));
                    Err(ProvisionError::DeleteFailed {
                        logical_id: self.logical_id.clone(),
                        reason: failure.reason,
                    })
                }
            },
        }
    }

    fn transition(&mut self, to: State, request_id: Option<uuid::Uuid>) {
        log::info!(
            "{}: {} -> {}",
            self.logical_id,
            self.state.as_str(),
            to.as_str()
        );

        self.history.push(Transition {
            from: self.state,
            to,
            at: Utc::now(),
            request_id,
        });
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Records every event; fails as long as `failures` is positive
    #[derive(Default)]
    struct RecordingHandler {
        events: Vec<ResourceEvent>,
        failures: u32,
    }

    #[async_trait]
    impl ResourceHandler for RecordingHandler {
        async fn handle(&mut self, event: &ResourceEvent) -> Result<(), HandlerFailure> {
            self.events.push(event.clone());
            if self.failures > 0 {
                self.failures -= 1;
                return Err(HandlerFailure::new("injected failure"));
            }
            Ok(())
        }
    }

    fn bag(version: &str) -> PropertyBag {
        PropertyBag::new()
            .with("DbSecretArn", "arn:aws:secretsmanager:secret:master")
            .with("Version", version)
    }

    #[tokio::test]
    async fn absent_resource_is_created_once() {
        let mut provisioner =
            Provisioner::new("DbInit", RecordingHandler::default(), DeletePolicy::BestEffort);

        let first = provisioner.reconcile(&bag("1.0.0")).await.unwrap();
        let second = provisioner.reconcile(&bag("1.0.0")).await.unwrap();

        assert_eq!(first, Reconciliation::Created);
        assert_eq!(second, Reconciliation::Unchanged);
        assert_eq!(provisioner.state(), State::CreateComplete);
        assert_eq!(provisioner.handler.events.len(), 1);
        assert_eq!(provisioner.handler.events[0].kind, EventKind::Create);
    }

    #[tokio::test]
    async fn a_version_bump_triggers_exactly_one_update() {
        let mut provisioner =
            Provisioner::new("DbInit", RecordingHandler::default(), DeletePolicy::BestEffort);

        provisioner.reconcile(&bag("1.0.0")).await.unwrap();
        let outcome = provisioner.reconcile(&bag("1.0.1")).await.unwrap();

        assert_eq!(outcome, Reconciliation::Updated);
        assert_eq!(provisioner.handler.events.len(), 2);

        let update = &provisioner.handler.events[1];
        assert_eq!(update.kind, EventKind::Update);
        assert_eq!(update.properties, bag("1.0.1"));
        assert_eq!(update.old_properties, Some(bag("1.0.0")));
    }

    #[tokio::test]
    async fn a_failed_create_is_retried_without_cleanup() {
        let handler = RecordingHandler {
            failures: 1,
            ..RecordingHandler::default()
        };
        let mut provisioner = Provisioner::new("DbInit", handler, DeletePolicy::BestEffort);

        let failed = provisioner.reconcile(&bag("1.0.0")).await;
        assert!(matches!(failed, Err(ProvisionError::CreateFailed { .. })));
        assert_eq!(provisioner.state(), State::CreateFailed);
        assert!(provisioner.applied().is_none());

        let retried = provisioner.reconcile(&bag("1.0.0")).await.unwrap();
        assert_eq!(retried, Reconciliation::Created);
        assert_eq!(provisioner.handler.events.len(), 2);
        assert_eq!(provisioner.handler.events[1].kind, EventKind::Create);
    }

    #[tokio::test]
    async fn a_failed_update_keeps_the_old_bag_applied() {
        let mut provisioner =
            Provisioner::new("DbInit", RecordingHandler::default(), DeletePolicy::BestEffort);
        provisioner.reconcile(&bag("1.0.0")).await.unwrap();

        provisioner.handler.failures = 1;
        let failed = provisioner.reconcile(&bag("1.0.1")).await;

        assert!(matches!(failed, Err(ProvisionError::UpdateFailed { .. })));
        assert_eq!(provisioner.state(), State::UpdateFailed);
        assert_eq!(provisioner.applied(), Some(&bag("1.0.0")));

        let retried = provisioner.reconcile(&bag("1.0.1")).await.unwrap();
        assert_eq!(retried, Reconciliation::Updated);
    }

    #[tokio::test]
    async fn delete_after_lifecycle_ends_in_delete_complete() {
        let mut provisioner =
            Provisioner::new("DbInit", RecordingHandler::default(), DeletePolicy::BestEffort);

        provisioner.reconcile(&bag("1.0.0")).await.unwrap();
        provisioner.reconcile(&bag("1.0.1")).await.unwrap();
        provisioner.delete().await.unwrap();

        assert_eq!(provisioner.state(), State::DeleteComplete);
        assert!(provisioner.applied().is_none());

        let delete = provisioner.handler.events.last().unwrap();
        assert_eq!(delete.kind, EventKind::Delete);
        assert_eq!(delete.properties, bag("1.0.1"));
    }

    #[tokio::test]
    async fn best_effort_delete_swallows_handler_failure() {
        let mut provisioner =
            Provisioner::new("DbInit", RecordingHandler::default(), DeletePolicy::BestEffort);
        provisioner.reconcile(&bag("1.0.0")).await.unwrap();

        provisioner.handler.failures = 1;
        provisioner.delete().await.unwrap();

        assert_eq!(provisioner.state(), State::DeleteComplete);
    }

    #[tokio::test]
    async fn strict_delete_surfaces_handler_failure() {
        let mut provisioner =
            Provisioner::new("DbInit", RecordingHandler::default(), DeletePolicy::Strict);
        provisioner.reconcile(&bag("1.0.0")).await.unwrap();

        provisioner.handler.failures = 1;
        let failed = provisioner.delete().await;

        assert!(matches!(failed, Err(ProvisionError::DeleteFailed { .. })));
        assert_eq!(provisioner.state(), State::DeleteFailed);
    }

    #[tokio::test]
    async fn every_transition_is_stamped_and_ordered() {
        let mut provisioner =
            Provisioner::new("DbInit", RecordingHandler::default(), DeletePolicy::BestEffort);
        provisioner.reconcile(&bag("1.0.0")).await.unwrap();

        let history = provisioner.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from, State::Pending);
        assert_eq!(history[0].to, State::CreateInProgress);
        assert_eq!(history[1].to, State::CreateComplete);
        assert!(history[0].at <= history[1].at);
        assert_eq!(history[0].request_id, history[1].request_id);
    }
}
