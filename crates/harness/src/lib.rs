pub mod backend;
pub mod confirm;
pub mod device;
pub mod fixtures;

pub use backend::FakeBackend;
pub use confirm::ScriptedConfirmer;
pub use device::{RecordingSequence, SequenceEvent, TestDevice};

/// Install a test-friendly fmt subscriber once. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_test_writer()
        .try_init();
}
