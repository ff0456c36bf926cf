// tests/integration_tests.rs

use std::fs;
use std::path::Path;

#[test]
fn test_config_file_parsing() {
    // Test that the default config can be parsed
    let config_content = r#"
base_url = "http://127.0.0.1:5000"
refresh_secs = 30
probe_secs = 30
cfr_secs = 300
timeout_secs = 10
theme = "light"
view = "departures"
log_enabled = false
"#;

    let config_path = "test_config.toml";
    fs::write(config_path, config_content).expect("Failed to write test config");

    // Verify file was created
    assert!(Path::new(config_path).exists());

    // Clean up
    fs::remove_file(config_path).expect("Failed to clean up test config");
}

#[test]
fn test_project_structure() {
    // Test that all expected source files exist
    let expected_files = vec![
        "src/main.rs",
        "src/app.rs",
        "src/ui.rs",
        "src/config.rs",
        "src/model.rs",
        "src/api.rs",
        "src/timers.rs",
        "src/runtime.rs",
        "src/logging.rs",
        "Cargo.toml",
        "README.md",
    ];

    for file in expected_files {
        assert!(Path::new(file).exists(), "Expected file {} not found", file);
    }
}

#[test]
fn test_cargo_toml_metadata() {
    // Test that Cargo.toml has required metadata
    let cargo_content = fs::read_to_string("Cargo.toml").expect("Failed to read Cargo.toml");

    assert!(cargo_content.contains("name = \"gara-tui\""), "Missing package name");
    assert!(cargo_content.contains("description ="), "Missing description");
    assert!(cargo_content.contains("license ="), "Missing license");
    assert!(cargo_content.contains("readme ="), "Missing readme");
    assert!(cargo_content.contains("homepage ="), "Missing homepage");
    assert!(cargo_content.contains("repository ="), "Missing repository");
}

#[test]
fn test_readme_exists_and_complete() {
    // Test that README.md exists and has essential sections
    let readme_content = fs::read_to_string("README.md").expect("Failed to read README.md");

    let required_sections = vec![
        "# Gara TUI",
        "## Features",
        "## Quick Start",
        "## Configuration",
        "## Controls",
        "## Development",
    ];

    for section in required_sections {
        assert!(readme_content.contains(section), "README missing section: {}", section);
    }
}
