use std::io::Write;
use std::path::Path;

use fn_core::FuncFile;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::langs::LangHelper;

/// Renders the Dockerfile for a function whose directory has none, from
/// its manifest and language helper.
pub struct DockerfileGenerator<'a> {
    ff: &'a FuncFile,
    helper: &'a dyn LangHelper,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(ff: &'a FuncFile, helper: &'a dyn LangHelper) -> Self {
        Self { ff, helper }
    }

    pub async fn render(&self, dir: &Path) -> Result<String> {
        let entrypoint = non_empty_or(&self.ff.entrypoint, self.helper.entrypoint());
        let cmd = non_empty_or(&self.ff.cmd, self.helper.cmd());
        if entrypoint.trim().is_empty() && cmd.trim().is_empty() {
            return Err(Error::MissingEntrypoint);
        }

        let multi_stage = self.helper.is_multi_stage();
        let build_image = if self.ff.build_image.is_empty() {
            self.helper.build_from_image().await?
        } else {
            self.ff.build_image.clone()
        };

        let mut lines = Vec::new();
        if multi_stage {
            lines.push(format!("FROM {build_image} as build-stage"));
        } else {
            lines.push(format!("FROM {build_image}"));
        }
        lines.push("WORKDIR /function".to_owned());
        lines.extend(self.helper.dockerfile_build_cmds(dir));

        if multi_stage {
            let run_image = if self.ff.run_image.is_empty() {
                self.helper.run_from_image().await?
            } else {
                self.ff.run_image.clone()
            };
            lines.push(format!("FROM {run_image}"));
            lines.push("WORKDIR /function".to_owned());
            lines.extend(self.helper.dockerfile_copy_cmds(dir));
        }

        if !entrypoint.trim().is_empty() {
            lines.push(format!("ENTRYPOINT [{}]", exec_form(entrypoint)));
        }
        if !cmd.trim().is_empty() {
            lines.push(format!("CMD [{}]", exec_form(cmd)));
        }

        let mut out = lines.join("\n");
        out.push('\n');
        Ok(out)
    }

    /// Render into a `Dockerfile*` temp file inside `dir`. The file is
    /// removed when the returned handle drops.
    pub async fn write_temp(&self, dir: &Path) -> Result<NamedTempFile> {
        let content = self.render(dir).await?;
        let mut file = tempfile::Builder::new()
            .prefix("Dockerfile")
            .tempfile_in(dir)
            .map_err(|e| Error::Write {
                path: dir.to_path_buf(),
                source: e,
            })?;
        file.write_all(content.as_bytes())
            .map_err(|e| Error::Write {
                path: file.path().to_path_buf(),
                source: e,
            })?;
        Ok(file)
    }
}

fn non_empty_or<'s>(value: &'s str, fallback: &'s str) -> &'s str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// Whitespace-split tokens as a JSON-ish exec list. Quotes inside tokens
/// are left as they are.
fn exec_form(command: &str) -> String {
    command
        .split_whitespace()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(", ")
}
