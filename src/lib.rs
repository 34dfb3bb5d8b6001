//! Workspace-level integration tests live in `tests/`; see the member
//! crates under `crates/` for the engine itself.
