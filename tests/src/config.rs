//! Layered config loading against a real TOML file on disk.

use orchestrator_core::config::load_layered;
use orchestrator_kernel::{PlanConfig, TrustLevel};

#[tokio::test]
async fn missing_override_file_returns_base_unchanged() {
    let base = PlanConfig::default();
    let merged = load_layered(base.clone(), Some(std::path::Path::new("/nonexistent/override.toml"))).unwrap();
    assert_eq!(merged, base);
}

#[tokio::test]
async fn present_override_file_replaces_named_fields_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("override.toml");
    std::fs::write(&path, "max_retries = 9\ntrust_level = \"conservative\"\n").unwrap();

    let base = PlanConfig::default();
    let merged = load_layered(base.clone(), Some(path.as_path())).unwrap();

    assert_eq!(merged.max_retries, 9);
    assert_eq!(merged.trust_level, TrustLevel::Conservative);
    assert_eq!(merged.max_review_cycles, base.max_review_cycles);
}
