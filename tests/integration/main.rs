//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a device role end to
//! end against the simulated adapters.  All tests run on the host
//! (x86_64) with no real hardware required.

mod light_flow_tests;
mod mock_hw;
mod switch_flow_tests;
