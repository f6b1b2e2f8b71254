pub mod stage1_sentiment;
pub mod stage2_improvement;
pub mod stage3_render;

pub use stage1_sentiment::*;
pub use stage2_improvement::*;
pub use stage3_render::*;
