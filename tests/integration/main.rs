//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host (x86_64) with no
//! real radio required.

#[cfg(not(target_os = "espidf"))]
mod boot_tests;
mod connection_flow_tests;
mod mock_radio;
mod pairing_tests;
