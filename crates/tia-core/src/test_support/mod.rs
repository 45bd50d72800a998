//! In-memory stand-ins for the remote, shared by unit and integration tests.

mod fake_tia;
pub mod records;

pub use fake_tia::FakeTia;
