// Hierarchical state machine executor shared by the orchestrating modules.
//
// State trees are static tables of descriptors indexed by a state enum; each
// module context embeds the executor's bookkeeping and is mutated only by its
// own task.

pub mod errors;
pub mod machine;
pub mod states;

pub use errors::{StateMachineError, StateMachineResult};
pub use machine::{HierarchicalStateMachine, StateMachineContext, StateMachineOwner};
pub use states::{ActionFn, RunFn, RunOutcome, StateDescriptor, StateId};
