//! Per-caller access checks applied before validation.

use std::collections::BTreeSet;

use capcall_primitives::Tag;
use capcall_tools::{InvocationContext, ToolDescriptor};

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The caller may invoke the tool.
    Allow,
    /// The caller may not invoke the tool.
    Deny {
        /// Human-readable explanation surfaced in the error.
        reason: String,
    },
}

impl AccessDecision {
    /// Builds a deny decision.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`AccessDecision::Allow`].
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decides whether a caller may invoke a resolved tool.
///
/// Policies run before the input is looked at, so a denied call never reaches
/// validation or the executor.
pub trait AccessPolicy: Send + Sync {
    /// Evaluates the request.
    fn evaluate(&self, descriptor: &ToolDescriptor, ctx: &InvocationContext) -> AccessDecision;
}

impl<F> AccessPolicy for F
where
    F: Fn(&ToolDescriptor, &InvocationContext) -> AccessDecision + Send + Sync,
{
    fn evaluate(&self, descriptor: &ToolDescriptor, ctx: &InvocationContext) -> AccessDecision {
        (self)(descriptor, ctx)
    }
}

/// Allows tools that carry at least one of the configured tags.
#[derive(Debug, Clone, Default)]
pub struct TagAllowList {
    allowed: BTreeSet<Tag>,
}

impl TagAllowList {
    /// Creates an allow-list from the supplied tags.
    #[must_use]
    pub fn new<I>(tags: I) -> Self
    where
        I: IntoIterator<Item = Tag>,
    {
        Self {
            allowed: tags.into_iter().collect(),
        }
    }

    /// Returns the allowed tags.
    #[must_use]
    pub fn allowed(&self) -> &BTreeSet<Tag> {
        &self.allowed
    }
}

impl AccessPolicy for TagAllowList {
    fn evaluate(&self, descriptor: &ToolDescriptor, _ctx: &InvocationContext) -> AccessDecision {
        if descriptor.tags().iter().any(|tag| self.allowed.contains(tag)) {
            AccessDecision::Allow
        } else {
            AccessDecision::deny(format!(
                "tool `{}` carries none of the allowed tags",
                descriptor.name()
            ))
        }
    }
}
