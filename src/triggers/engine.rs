//! Trigger evaluation and application

use crate::api::MessageData;
use crate::storage::{Storage, StorageResult, ThreadRecord};
use crate::triggers::rule::TriggerRule;
use std::collections::BTreeSet;

/// Effect of a matching rule on the thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    /// Protect the thread from the retention sweep
    Retain,
    /// Attach the tag with this id
    AttachTag(i64),
}

/// Writes issued by `TriggerEngine::apply`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedActions {
    pub retained: bool,
    pub tags_added: Vec<i64>,
}

impl AppliedActions {
    pub fn is_empty(&self) -> bool {
        !self.retained && self.tags_added.is_empty()
    }
}

/// Snapshot of the active trigger rules of a run
#[derive(Debug, Clone, Default)]
pub struct TriggerEngine {
    rules: Vec<TriggerRule>,
}

impl TriggerEngine {
    /// Builds an engine from a rule list, dropping inactive rules
    pub fn new(rules: Vec<TriggerRule>) -> Self {
        Self {
            rules: rules.into_iter().filter(|rule| rule.active).collect(),
        }
    }

    /// Snapshots the active rules currently in storage
    pub fn load(storage: &dyn Storage) -> StorageResult<Self> {
        Ok(Self::new(storage.load_active_triggers()?))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Returns the union of the actions of every rule matching the message
    pub fn evaluate(&self, thread_number: i64, message: &MessageData) -> BTreeSet<Action> {
        let mut actions = BTreeSet::new();

        for rule in &self.rules {
            if !rule.post_type.applies_to(thread_number, message) {
                continue;
            }

            if !rule.condition_holds(message) {
                continue;
            }

            if rule.retain_thread {
                actions.insert(Action::Retain);
            }
            if let Some(tag_id) = rule.tag_id {
                actions.insert(Action::AttachTag(tag_id));
            }
        }

        actions
    }

    /// Executes actions against the thread
    ///
    /// Retaining an already retained thread and attaching a tag the thread
    /// already carries are no-ops.
    pub fn apply(
        &self,
        storage: &mut dyn Storage,
        thread: &mut ThreadRecord,
        actions: &BTreeSet<Action>,
    ) -> StorageResult<AppliedActions> {
        let mut applied = AppliedActions::default();

        for action in actions {
            match *action {
                Action::Retain => {
                    if !thread.saved {
                        storage.set_thread_retention(thread.id, true, true)?;
                        thread.saved = true;
                        thread.auto_saved = true;
                        applied.retained = true;
                    }
                }
                Action::AttachTag(tag_id) => {
                    if !storage.thread_has_tag(thread.id, tag_id)? {
                        storage.add_thread_tag(thread.id, tag_id, true)?;
                        applied.tags_added.push(tag_id);
                    }
                }
            }
        }

        Ok(applied)
    }

    /// Evaluates the rules for a new message and applies the result
    pub fn handle(
        &self,
        storage: &mut dyn Storage,
        thread: &mut ThreadRecord,
        message: &MessageData,
    ) -> StorageResult<AppliedActions> {
        if self.rules.is_empty() {
            return Ok(AppliedActions::default());
        }

        let actions = self.evaluate(thread.number, message);
        if actions.is_empty() {
            return Ok(AppliedActions::default());
        }

        tracing::debug!(
            "Thread {} post {} matched triggers: {:?}",
            thread.number,
            message.number,
            actions
        );
        self.apply(storage, thread, &actions)
    }
}
