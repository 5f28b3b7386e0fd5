//! Shared test support.

// Each test binary compiles this module separately and none uses every helper.
#![allow(dead_code)]

pub mod mocks;

/// Routes middleware logs to the test writer. Run tests with
/// `RUST_LOG=mnemon=debug` to see retrieval and persistence decisions.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
