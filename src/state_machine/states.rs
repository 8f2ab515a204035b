use std::fmt::Debug;

use super::errors::StateMachineResult;

/// State identity usable as a dense index into a static state table
pub trait StateId: Copy + Eq + Debug + Send + 'static {
    /// Position of this state's descriptor in the table
    fn index(self) -> usize;
}

/// Result of a run behavior that did not request a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The message was consumed; ancestors are not consulted
    Handled,
    /// Offer the message to the parent state
    Propagate,
}

/// Entry or exit behavior
pub type ActionFn<C> = fn(&mut C) -> StateMachineResult<()>;

/// Run behavior
pub type RunFn<C> = fn(&mut C) -> StateMachineResult<RunOutcome>;

/// One node of a state tree
///
/// Tables are `static` arrays of descriptors indexed by [`StateId::index`];
/// the hierarchy is expressed with parent ids, never references.
pub struct StateDescriptor<S, C> {
    pub id: S,
    pub parent: Option<S>,
    /// Child entered automatically when this state becomes the target
    pub initial: Option<S>,
    pub entry: Option<ActionFn<C>>,
    pub run: Option<RunFn<C>>,
    pub exit: Option<ActionFn<C>>,
}

impl<S, C> StateDescriptor<S, C> {
    /// Create a new state descriptor
    pub const fn new(
        id: S,
        parent: Option<S>,
        initial: Option<S>,
        entry: Option<ActionFn<C>>,
        run: Option<RunFn<C>>,
        exit: Option<ActionFn<C>>,
    ) -> Self {
        Self {
            id,
            parent,
            initial,
            entry,
            run,
            exit,
        }
    }
}
