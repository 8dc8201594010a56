use std::env;
use std::fs;
use std::process::Command;

use anyhow::Result;
use chrono::TimeZone;
use vergen_gitcl::{Emitter, GitclBuilder};

fn main() -> Result<()> {
    // Generate git information
    let gitcl = GitclBuilder::default()
        .describe(true, true, Some("[0-9]*"))
        .build()?;

    let gitcl_res = Emitter::default()
        .idempotent()
        .fail_on_error()
        .add_instructions(&gitcl)
        .and_then(|emitter| emitter.emit());

    if let Err(e) = gitcl_res {
        eprintln!("error occurred while generating instructions: {e:?}");
        Emitter::default().idempotent().fail_on_error().emit()?;
    }

    // Add build timestamp
    let now = match env::var("SOURCE_DATE_EPOCH") {
        Ok(val) => chrono::Utc.timestamp_opt(val.parse::<i64>()?, 0).unwrap(),
        Err(_) => chrono::Utc::now(),
    };

    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );

    // Record the engine library version for version reporting
    let lib_version = engine_version_from_metadata()
        .or_else(|_| engine_version_fallback())
        .unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=IECBURST_VERSION={lib_version}");

    println!("cargo:rerun-if-changed=iecburst/Cargo.toml");

    Ok(())
}

/// Get the iecburst version using cargo metadata (works with published and
/// local dependencies).
fn engine_version_from_metadata() -> Result<String> {
    let output = Command::new("cargo")
        .args(["metadata", "--format-version", "1"])
        .output()?;

    if !output.status.success() {
        anyhow::bail!("cargo metadata failed");
    }

    let metadata: serde_json::Value = serde_json::from_slice(&output.stdout)?;

    if let Some(packages) = metadata["packages"].as_array() {
        for package in packages {
            if package["name"].as_str() == Some("iecburst") {
                if let Some(version) = package["version"].as_str() {
                    return Ok(version.to_string());
                }
            }
        }
    }

    anyhow::bail!("iecburst package not found in metadata");
}

/// Fallback: manually parse iecburst/Cargo.toml.
fn engine_version_fallback() -> Result<String> {
    let toml_content = fs::read_to_string("iecburst/Cargo.toml")?;

    for line in toml_content.lines() {
        let line = line.trim();
        if line.starts_with("version") && line.contains('=') {
            if let Some(equals_pos) = line.find('=') {
                let version = line[equals_pos + 1..].trim().trim_matches('"');
                return Ok(version.to_string());
            }
        }
    }

    anyhow::bail!("could not find version in iecburst/Cargo.toml");
}
