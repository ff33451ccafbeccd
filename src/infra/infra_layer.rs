// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "registry_cache/json_fingerprint_store.rs"]
pub mod registry_cache;
