pub mod handoff_stack;
pub mod shard;

pub use handoff_stack::HandoffStack;
pub use shard::ShardSelector;
