//! Purpose: Shared core library crate used by the `mshar` CLI and bindings.
//! Exports: `core` (bundling, artifact format, scanning, errors), `api`, `abi`.
//! Role: Internal library backing the binary; `api` is the stable surface.
//! Invariants: Treat `core` as internal until a dedicated library release.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod abi;
pub mod api;
pub mod core;
pub mod notice;
