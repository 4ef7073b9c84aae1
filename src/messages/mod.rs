pub mod context;
pub mod types;

pub use context::{keys, Context};
pub use types::Message;
