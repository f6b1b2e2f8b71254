pub mod conversation;
pub mod metrics;
pub mod segment;
pub mod transcript;

pub use conversation::*;
pub use metrics::*;
pub use segment::*;
pub use transcript::*;
