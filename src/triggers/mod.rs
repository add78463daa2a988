//! Trigger rules
//!
//! Triggers are declarative condition/action pairs evaluated against every
//! newly archived post. A matching rule can retain the thread (protect it
//! from the retention sweep) and/or attach a tag to it.

mod engine;
mod rule;

pub use engine::{Action, AppliedActions, TriggerEngine};
pub use rule::{PostType, RuleField, RuleOperator, TriggerRule};
