use std::path::Path;

use async_trait::async_trait;

use super::{require_project_file, write_file, LangHelper};
use crate::error::{Error, Result};

/// Cargo projects, built on the upstream Rust image.
pub struct RustHelper;

#[async_trait]
impl LangHelper for RustHelper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["rust".to_owned()]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".rs"]
    }

    async fn build_from_image(&self) -> Result<String> {
        Ok("rust:1".to_owned())
    }

    async fn run_from_image(&self) -> Result<String> {
        Ok("debian:stable-slim".to_owned())
    }

    fn dockerfile_build_cmds(&self, _dir: &Path) -> Vec<String> {
        vec![
            "ADD . /function/src/".to_owned(),
            "RUN cd /function/src/ && cargo build --release".to_owned(),
        ]
    }

    fn dockerfile_copy_cmds(&self, _dir: &Path) -> Vec<String> {
        vec!["COPY --from=build-stage /function/src/target/release/func /function/func".to_owned()]
    }

    fn entrypoint(&self) -> &'static str {
        "/function/func"
    }

    fn has_pre_build(&self) -> bool {
        true
    }

    fn pre_build(&self, dir: &Path) -> Result<Option<Vec<String>>> {
        require_project_file(dir, "Cargo.toml", "Rust Cargo")?;
        Ok(None)
    }

    /// Drop the host-side `target/` the build context may have picked up.
    fn after_build(&self, dir: &Path) -> Result<()> {
        let target = dir.join("target");
        if !target.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(&target).map_err(|e| Error::Remove {
            path: target,
            source: e,
        })
    }

    fn has_boilerplate(&self) -> bool {
        true
    }

    async fn generate_boilerplate(&self, dir: &Path) -> Result<()> {
        if dir.join("Cargo.toml").exists() {
            return Err(Error::BoilerplateExists);
        }
        write_file(dir, "Cargo.toml", CARGO_TOML)?;
        write_file(dir, "src/main.rs", MAIN_RS)
    }
}

const CARGO_TOML: &str = r#"[package]
name = "func"
version = "0.1.0"
edition = "2021"

[dependencies]
"#;

const MAIN_RS: &str = r#"fn main() {
    println!("Hello, world!");
}
"#;
