use std::path::Path;

use async_trait::async_trait;

use super::LangHelper;
use crate::error::Result;

const PHP_IMAGE: &str = "fnproject/php:dev";

/// Single-stage PHP; composer dependencies are installed on the host
/// before the build.
pub struct PhpHelper;

#[async_trait]
impl LangHelper for PhpHelper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["php".to_owned()]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".php"]
    }

    async fn build_from_image(&self) -> Result<String> {
        Ok(PHP_IMAGE.to_owned())
    }

    async fn run_from_image(&self) -> Result<String> {
        Ok(PHP_IMAGE.to_owned())
    }

    fn is_multi_stage(&self) -> bool {
        false
    }

    fn dockerfile_build_cmds(&self, _dir: &Path) -> Vec<String> {
        vec!["ADD . /function/".to_owned()]
    }

    fn entrypoint(&self) -> &'static str {
        "php func.php"
    }

    fn has_pre_build(&self) -> bool {
        true
    }

    /// `composer install` inside the PHP image, with the function
    /// directory mounted, when a `composer.json` is present.
    fn pre_build(&self, dir: &Path) -> Result<Option<Vec<String>>> {
        if !dir.join("composer.json").exists() {
            return Ok(None);
        }
        Ok(Some(vec![
            "run".to_owned(),
            "--rm".to_owned(),
            "-v".to_owned(),
            format!("{}:/worker", dir.display()),
            "-w".to_owned(),
            "/worker".to_owned(),
            PHP_IMAGE.to_owned(),
            "composer".to_owned(),
            "install".to_owned(),
        ]))
    }
}
