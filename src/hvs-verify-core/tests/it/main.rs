//! Consolidated integration tests for hvs-verify-core.
//!
//! Kept in a single test binary so proptest suites do not run as parallel
//! processes.
//! See: https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod dispatch;
mod pipeline;
