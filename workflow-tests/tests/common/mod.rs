//! Common setup for session lifecycle tests.

use workflow_tests::TestHarness;

/// Start a fresh mock token service and a manager wired against it.
pub async fn setup() -> TestHarness {
    init_tracing();

    TestHarness::start()
        .await
        .expect("failed to start in-process mock auth service")
}

/// Same, with a custom refresh lead for timer-sensitive scenarios.
pub async fn setup_with_lead(lead_seconds: i64) -> TestHarness {
    init_tracing();

    TestHarness::start_with_lead(lead_seconds)
        .await
        .expect("failed to start in-process mock auth service")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
