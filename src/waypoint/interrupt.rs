// SPDX-License-Identifier: MIT

//! Human-in-the-loop interrupts
//!
//! A node asks for external input by calling [`request`] or
//! [`request_with_validation`]. The first call raises an [`Interrupt`] which
//! suspends the run. When the run is resumed the node is executed again from
//! the top; this time the same call finds the submitted answers in the
//! [`NodeContext`] and returns them instead of suspending.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::context::NodeContext;
use super::error::{NodeError, RequirementError};

/// Submitted answers, keyed by requirement name
pub type Answers = HashMap<String, String>;

/// Identifies an interrupt by the node that raised it plus a run-unique token
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InterruptId {
    pub node_id: String,
    pub id: String,
}

impl InterruptId {
    /// Fresh id for `node_id`. The token mixes wall-clock time with a random
    /// value; collisions are unlikely but not impossible.
    pub fn generate(node_id: impl Into<String>) -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let random = Uuid::new_v4().simple().to_string();
        Self {
            node_id: node_id.into(),
            id: format!("{:x}.{}", nanos, &random[..16]),
        }
    }
}

impl fmt::Display for InterruptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_id, self.id)
    }
}

/// How a requested value is constrained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    /// Must be one of the suggestions
    Enum,
    /// Free text
    Custom,
    /// Free text, suggestions are hints only
    CustomWithSuggestions,
}

/// Declared shape of one requested field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(rename = "type")]
    pub kind: RequirementType,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl Requirement {
    pub fn custom() -> Self {
        Self {
            kind: RequirementType::Custom,
            suggestions: Vec::new(),
        }
    }

    pub fn one_of<I, T>(choices: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            kind: RequirementType::Enum,
            suggestions: choices.into_iter().map(Into::into).collect(),
        }
    }

    pub fn custom_with_suggestions<I, T>(hints: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            kind: RequirementType::CustomWithSuggestions,
            suggestions: hints.into_iter().map(Into::into).collect(),
        }
    }
}

/// All fields an interrupt needs answered
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Requirements(BTreeMap<String, Requirement>);

impl Requirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, requirement: Requirement) -> Self {
        self.insert(key, requirement);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, requirement: Requirement) {
        self.0.insert(key.into(), requirement);
    }

    pub fn get(&self, key: &str) -> Option<&Requirement> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Requirement)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Node-side validator: every declared key must carry a non-empty answer
    pub fn validate(&self, values: &Answers) -> Result<(), RequirementError> {
        for key in self.0.keys() {
            match values.get(key) {
                Some(value) if !value.is_empty() => {}
                _ => return Err(RequirementError::Missing(key.clone())),
            }
        }
        Ok(())
    }

    /// Resume-side check: every key present, enum answers within the allowed set.
    ///
    /// Returns only the answers for declared keys.
    pub fn check_answers(&self, values: &Answers) -> Result<Answers, RequirementError> {
        let mut accepted = Answers::with_capacity(self.0.len());
        for (key, requirement) in &self.0 {
            let answer = values
                .get(key)
                .ok_or_else(|| RequirementError::Missing(key.clone()))?;

            if requirement.kind == RequirementType::Enum
                && !requirement.suggestions.contains(answer)
            {
                return Err(RequirementError::Invalid {
                    key: key.clone(),
                    value: answer.clone(),
                    allowed: requirement.suggestions.clone(),
                });
            }

            accepted.insert(key.clone(), answer.clone());
        }
        Ok(accepted)
    }
}

impl FromIterator<(String, Requirement)> for Requirements {
    fn from_iter<I: IntoIterator<Item = (String, Requirement)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Execution paused here and needs the listed input
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Error)]
#[error("flow interrupted: {reason}")]
pub struct Interrupt {
    pub reason: String,
    pub message: String,
    /// Set when a previous answer was rejected by the node's validator
    #[serde(default)]
    pub validation_error: Option<String>,
    #[serde(default)]
    pub requirements: Requirements,
    pub interrupt_id: InterruptId,
}

/// An interrupt together with the answers submitted for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInterrupt {
    #[serde(flatten)]
    pub interrupt: Interrupt,
    #[serde(default)]
    pub values: Answers,
}

/// Ask for input without validating the answers beyond the resume-time checks
pub fn request(
    ctx: &NodeContext,
    message: impl Into<String>,
    reason: impl Into<String>,
    requirements: Requirements,
) -> Result<Answers, NodeError> {
    request_with_validation(ctx, message, reason, requirements, |_| {
        Ok::<(), RequirementError>(())
    })
}

/// Ask for input and run `validate` over the answers once they arrive.
///
/// A validation failure re-raises the stored interrupt (same id) with the
/// validator's message attached, so the caller can prompt again.
pub fn request_with_validation<F, E>(
    ctx: &NodeContext,
    message: impl Into<String>,
    reason: impl Into<String>,
    requirements: Requirements,
    validate: F,
) -> Result<Answers, NodeError>
where
    F: FnOnce(&Answers) -> Result<(), E>,
    E: fmt::Display,
{
    let node_id = ctx
        .node_id()
        .ok_or_else(|| NodeError::failed("node id not found in context"))?;

    if let Some(resolved) = ctx.resolved() {
        return match validate(&resolved.values) {
            Ok(()) => Ok(resolved.values.clone()),
            Err(err) => {
                log::debug!(
                    "Answers for interrupt {} rejected: {}",
                    resolved.interrupt.interrupt_id,
                    err
                );
                let mut interrupt = resolved.interrupt.clone();
                interrupt.validation_error = Some(err.to_string());
                Err(NodeError::Interrupted(interrupt))
            }
        };
    }

    let interrupt = Interrupt {
        reason: reason.into(),
        message: message.into(),
        validation_error: None,
        requirements,
        interrupt_id: InterruptId::generate(node_id),
    };
    log::debug!("Node {} raised interrupt {}", node_id, interrupt.interrupt_id);
    Err(NodeError::Interrupted(interrupt))
}
