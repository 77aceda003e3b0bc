//! Shared helpers for integration tests

pub mod recorder;

/// Install a fmt subscriber honouring `RUST_LOG`. Safe to call from
/// every test.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
