//! Test helpers for guardian-server unit tests.

use guardian_types::GuardianConfig;

use crate::state::AppState;

/// Create an `AppState` on the default config. The worker URL is never
/// contacted unless a test drives the health probe.
pub fn test_app_state() -> AppState {
    AppState::new(GuardianConfig::default()).expect("failed to create test AppState")
}
