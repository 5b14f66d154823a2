//! Hooks notified on every invocation state change.

use std::sync::Arc;

use capcall_primitives::{CallerId, OperationId};
use tracing::{info, trace, warn};

use crate::lifecycle::InvocationState;

/// A single state change of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Invocation the change belongs to.
    pub operation_id: OperationId,
    /// Tool being invoked.
    pub tool: String,
    /// Requester identity.
    pub caller_id: CallerId,
    /// State before the change.
    pub from: InvocationState,
    /// State after the change.
    pub to: InvocationState,
}

/// Observer invoked whenever an invocation changes state.
pub trait InvocationObserver: Send + Sync {
    /// Records the supplied transition.
    fn on_transition(&self, transition: &Transition);
}

/// Observer that reports terminal outcomes to the tracing system.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl InvocationObserver for TracingObserver {
    fn on_transition(&self, transition: &Transition) {
        let Transition {
            operation_id,
            tool,
            caller_id,
            from,
            to,
        } = transition;
        match to {
            InvocationState::Succeeded => {
                info!(%operation_id, tool = %tool, %caller_id, "invocation succeeded");
            }
            InvocationState::Cancelled => {
                info!(%operation_id, tool = %tool, %caller_id, %from, "invocation cancelled");
            }
            InvocationState::Failed => {
                warn!(%operation_id, tool = %tool, %caller_id, %from, "invocation failed");
            }
            _ => trace!(%operation_id, tool = %tool, %from, %to, "invocation progressed"),
        }
    }
}

/// Composite observer that forwards transitions to a collection of observers.
pub struct CompositeObserver {
    observers: Vec<Arc<dyn InvocationObserver>>,
}

impl CompositeObserver {
    /// Creates a new composite observer from the supplied list.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn InvocationObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds an observer to the composite set.
    pub fn push(&mut self, observer: Arc<dyn InvocationObserver>) {
        self.observers.push(observer);
    }
}

impl InvocationObserver for CompositeObserver {
    fn on_transition(&self, transition: &Transition) {
        for observer in &self.observers {
            observer.on_transition(transition);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recording(Mutex<Vec<InvocationState>>);

    impl InvocationObserver for Recording {
        fn on_transition(&self, transition: &Transition) {
            self.0.lock().unwrap().push(transition.to);
        }
    }

    #[test]
    fn composite_fans_out_in_order() {
        let first = Arc::new(Recording::default());
        let second = Arc::new(Recording::default());
        let mut composite = CompositeObserver::new([first.clone() as Arc<dyn InvocationObserver>]);
        composite.push(second.clone());
        composite.push(Arc::new(TracingObserver));

        let transition = Transition {
            operation_id: OperationId::random(),
            tool: "echo".into(),
            caller_id: CallerId::new("planner").unwrap(),
            from: InvocationState::Executing,
            to: InvocationState::Succeeded,
        };
        composite.on_transition(&transition);

        assert_eq!(*first.0.lock().unwrap(), vec![InvocationState::Succeeded]);
        assert_eq!(*second.0.lock().unwrap(), vec![InvocationState::Succeeded]);
    }
}
