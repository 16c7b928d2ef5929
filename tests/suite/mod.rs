//! Integration test suites.

mod options;
mod reconciler;
mod store;
