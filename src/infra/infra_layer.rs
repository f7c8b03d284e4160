// The infra module contains implementations of core traits.
// Each external system gets its own submodule.

#[path = "drive/mod.rs"]
pub mod drive;
