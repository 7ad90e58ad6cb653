//! Binding adapter over `dpapi_core`.

pub mod api;
