// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "conversion/mod.rs"]
pub mod conversion;
