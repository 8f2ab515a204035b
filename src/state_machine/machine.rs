//! # Hierarchical State Machine Executor
//!
//! Run-to-completion dispatcher over a static tree of states.
//!
//! ## Semantics
//!
//! - `run` offers the current message to the current leaf, then to each
//!   ancestor, until a behavior returns [`RunOutcome::Handled`] or requests a
//!   transition. A message that reaches the root unhandled is dropped.
//! - A transition is requested with [`StateMachineContext::set_state`] from a
//!   run behavior and applied once that behavior returns. The first request
//!   in a run wins; later ones are ignored with a warning.
//! - Applying a transition exits from the current leaf up to, but excluding,
//!   the least common ancestor, enters from below the ancestor down to the
//!   target, then follows `initial` children down to a leaf. Targeting the
//!   current state or one of its ancestors exits and re-enters that state.
//! - Entry and exit behaviors must not request transitions.

use tracing::{trace, warn};

use super::errors::{StateMachineError, StateMachineResult};
use super::states::{RunOutcome, StateDescriptor, StateId};
use crate::logging::log_state_transition;

/// Executor-owned part of a module context
#[derive(Debug)]
pub struct StateMachineContext<S> {
    current: Option<S>,
    pending: Option<S>,
    transitions: u64,
}

impl<S: StateId> StateMachineContext<S> {
    /// Create a new context with no current state
    pub fn new() -> Self {
        Self {
            current: None,
            pending: None,
            transitions: 0,
        }
    }

    /// Current state; the leaf once the machine has settled
    pub fn current(&self) -> Option<S> {
        self.current
    }

    /// Request a transition to `target` once the running behavior returns
    pub fn set_state(&mut self, target: S) {
        match self.pending {
            None => self.pending = Some(target),
            Some(requested) => warn!(
                ?requested,
                ignored = ?target,
                "⚠️ Transition already requested in this run, ignoring"
            ),
        }
    }

    /// Number of transitions applied since start
    pub fn transition_count(&self) -> u64 {
        self.transitions
    }
}

impl<S: StateId> Default for StateMachineContext<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Module contexts embed a [`StateMachineContext`] and expose it here
pub trait StateMachineOwner<S: StateId> {
    fn state_machine(&self) -> &StateMachineContext<S>;
    fn state_machine_mut(&mut self) -> &mut StateMachineContext<S>;
}

/// Executor over a `'static` state table
pub struct HierarchicalStateMachine<S: 'static, C: 'static> {
    name: &'static str,
    table: &'static [StateDescriptor<S, C>],
}

impl<S, C> HierarchicalStateMachine<S, C>
where
    S: StateId,
    C: StateMachineOwner<S>,
{
    /// Create a new executor over `table`
    pub const fn new(name: &'static str, table: &'static [StateDescriptor<S, C>]) -> Self {
        Self { name, table }
    }

    /// Name used in logs and errors
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check table indices, parent chains and initial children
    pub fn validate(&self) -> StateMachineResult<()> {
        for (index, descriptor) in self.table.iter().enumerate() {
            if descriptor.id.index() != index {
                return Err(StateMachineError::invalid_table(
                    self.name,
                    format!(
                        "{:?} is stored at index {index} but maps to index {}",
                        descriptor.id,
                        descriptor.id.index()
                    ),
                ));
            }

            if let Some(parent) = descriptor.parent {
                self.descriptor(parent)?;
            }

            if let Some(child) = descriptor.initial {
                if self.descriptor(child)?.parent != Some(descriptor.id) {
                    return Err(StateMachineError::invalid_table(
                        self.name,
                        format!(
                            "initial state {child:?} of {:?} is not its direct child",
                            descriptor.id
                        ),
                    ));
                }
            }

            self.path_from_root(descriptor.id)?;
        }
        Ok(())
    }

    /// Current state of `ctx`
    pub fn current(&self, ctx: &C) -> Option<S> {
        ctx.state_machine().current()
    }

    /// Whether `state` is the current state or one of its ancestors
    pub fn is_in(&self, ctx: &C, state: S) -> bool {
        let mut cursor = ctx.state_machine().current();
        for _ in 0..=self.table.len() {
            match cursor {
                Some(candidate) if candidate == state => return true,
                Some(candidate) => {
                    cursor = self.table.get(candidate.index()).and_then(|d| d.parent);
                }
                None => return false,
            }
        }
        false
    }

    /// Enter `state` from the root, then settle on its initial leaf
    pub fn set_initial(&self, ctx: &mut C, state: S) -> StateMachineResult<()> {
        ctx.state_machine_mut().pending = None;
        for step in self.path_from_root(state)? {
            self.enter(ctx, step)?;
        }
        self.drill_down(ctx, state)?;

        log_state_transition(self.name, None, &format!("{:?}", self.settled(ctx)?));
        Ok(())
    }

    /// Dispatch the message stored in `ctx` to the current state
    pub fn run(&self, ctx: &mut C) -> StateMachineResult<()> {
        let mut state = self.settled(ctx)?;

        loop {
            let descriptor = self.descriptor(state)?;
            let outcome = match descriptor.run {
                Some(run) => run(ctx)?,
                None => RunOutcome::Propagate,
            };

            if let Some(target) = ctx.state_machine_mut().pending.take() {
                return self.transition(ctx, target);
            }

            if outcome == RunOutcome::Handled {
                return Ok(());
            }

            match descriptor.parent {
                Some(parent) => state = parent,
                None => {
                    trace!(machine = self.name, state = ?state, "Message unhandled at root");
                    return Ok(());
                }
            }
        }
    }

    fn transition(&self, ctx: &mut C, target: S) -> StateMachineResult<()> {
        let source = self.settled(ctx)?;
        let source_path = self.path_from_root(source)?;
        let target_path = self.path_from_root(target)?;

        let mut common = source_path
            .iter()
            .zip(&target_path)
            .take_while(|(a, b)| a == b)
            .count();
        // Target on the active path: exit and re-enter it
        if common == target_path.len() {
            common -= 1;
        }

        for &state in source_path[common..].iter().rev() {
            self.exit(ctx, state)?;
        }
        for &state in &target_path[common..] {
            self.enter(ctx, state)?;
        }
        self.drill_down(ctx, target)?;

        ctx.state_machine_mut().transitions += 1;
        let settled = self.settled(ctx)?;
        log_state_transition(
            self.name,
            Some(format!("{source:?}").as_str()),
            &format!("{settled:?}"),
        );
        Ok(())
    }

    fn enter(&self, ctx: &mut C, state: S) -> StateMachineResult<()> {
        let descriptor = self.descriptor(state)?;
        ctx.state_machine_mut().current = Some(state);
        if let Some(entry) = descriptor.entry {
            entry(ctx)?;
        }
        self.reject_pending(ctx)
    }

    fn exit(&self, ctx: &mut C, state: S) -> StateMachineResult<()> {
        let descriptor = self.descriptor(state)?;
        if let Some(exit) = descriptor.exit {
            exit(ctx)?;
        }
        self.reject_pending(ctx)?;
        ctx.state_machine_mut().current = descriptor.parent;
        Ok(())
    }

    fn drill_down(&self, ctx: &mut C, from: S) -> StateMachineResult<()> {
        let mut state = from;
        while let Some(child) = self.descriptor(state)?.initial {
            self.enter(ctx, child)?;
            state = child;
        }
        Ok(())
    }

    fn reject_pending(&self, ctx: &mut C) -> StateMachineResult<()> {
        match ctx.state_machine_mut().pending.take() {
            Some(target) => Err(StateMachineError::TransitionOutsideRun {
                machine: self.name.to_string(),
                target: format!("{target:?}"),
            }),
            None => Ok(()),
        }
    }

    fn settled(&self, ctx: &C) -> StateMachineResult<S> {
        ctx.state_machine()
            .current()
            .ok_or_else(|| StateMachineError::NotStarted {
                machine: self.name.to_string(),
            })
    }

    fn descriptor(&self, state: S) -> StateMachineResult<&'static StateDescriptor<S, C>> {
        self.table
            .get(state.index())
            .filter(|descriptor| descriptor.id == state)
            .ok_or_else(|| StateMachineError::UnknownState {
                machine: self.name.to_string(),
                state: format!("{state:?}"),
            })
    }

    /// States from the root down to and including `state`
    fn path_from_root(&self, state: S) -> StateMachineResult<Vec<S>> {
        let mut path = vec![state];
        let mut cursor = self.descriptor(state)?.parent;
        while let Some(parent) = cursor {
            if path.len() > self.table.len() {
                return Err(StateMachineError::invalid_table(
                    self.name,
                    format!("parent chain of {state:?} contains a cycle"),
                ));
            }
            path.push(parent);
            cursor = self.descriptor(parent)?.parent;
        }
        path.reverse();
        Ok(path)
    }
}
