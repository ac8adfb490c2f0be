//! LLM providers, concurrent dispatch and the judge stage

mod dispatch;
mod engine;
mod judge;
mod provider;

pub use dispatch::*;
pub use engine::*;
pub use judge::*;
pub use provider::*;
