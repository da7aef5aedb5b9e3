// ── Remote synchronization ──
//
// Reducer strategies and the engine that drives them.

mod engine;
mod merge;
mod strategy;

pub use engine::{Operation, SyncEngine, SyncEngineBuilder};
pub use merge::deep_merge;
pub use strategy::{CustomFn, Remote, Strategy};
