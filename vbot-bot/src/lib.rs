mod builder;
mod context;
mod instance;
mod message;
mod pool;

pub use builder::BotBuilder;
pub use context::{BotContext, ExecutionMode};
pub use instance::{BotDescriptor, BotInstance};
pub use message::{enrich, QueuedMessage};
pub use pool::{JobController, JobSummary, PoolController};
