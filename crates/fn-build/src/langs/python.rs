use std::path::Path;

use async_trait::async_trait;

use super::{write_file, LangHelper, GREETING_TESTS};
use crate::error::{Error, Result};
use crate::fdk::{FdkSource, HelperContext, IndexFormat};

pub struct PythonHelper {
    version: &'static str,
    deprecated: bool,
    ctx: HelperContext,
    fdk: FdkSource,
}

impl PythonHelper {
    pub fn new(version: &'static str, ctx: HelperContext) -> Self {
        Self {
            version,
            deprecated: false,
            ctx,
            fdk: FdkSource::new(
                "Python",
                "https://pypi.org/pypi/fdk/json",
                "FN_PYTHON_FDK_VERSION",
                IndexFormat::PyPi,
            ),
        }
    }

    /// Mark this version as refused for new functions.
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }
}

#[async_trait]
impl LangHelper for PythonHelper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["python".to_owned(), format!("python{}", self.version)]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".py"]
    }

    async fn build_from_image(&self) -> Result<String> {
        Ok(format!("fnproject/python:{}-dev", self.version))
    }

    async fn run_from_image(&self) -> Result<String> {
        Ok(format!("fnproject/python:{}", self.version))
    }

    fn dockerfile_build_cmds(&self, dir: &Path) -> Vec<String> {
        let mut r = Vec::new();
        if dir.join("requirements.txt").exists() {
            let mut pip = "RUN pip3 install --target /python/  --no-cache --no-cache-dir".to_owned();
            if dir.join(".pip_cache").exists() {
                r.push("ADD .pip_cache /function/.pip_cache".to_owned());
                pip.push_str(" --no-index --find-links /function/.pip_cache");
            }
            r.push("ADD requirements.txt /function/".to_owned());
            r.push(format!(
                "{pip} -r requirements.txt &&\\\n    rm -fr ~/.cache/pip /tmp* requirements.txt func.yaml Dockerfile .venv &&\\\n    chmod -R o+r /python"
            ));
        }
        r.push("ADD . /function/".to_owned());
        if dir.join("setup.py").exists() {
            r.push("RUN python setup.py install".to_owned());
        }
        r.push("RUN rm -fr /function/.pip_cache".to_owned());
        r
    }

    fn dockerfile_copy_cmds(&self, _dir: &Path) -> Vec<String> {
        vec![
            "COPY --from=build-stage /python /python".to_owned(),
            "COPY --from=build-stage /function /function".to_owned(),
            "RUN chmod -R o+r /function".to_owned(),
            "ENV PYTHONPATH=/function:/python".to_owned(),
        ]
    }

    fn entrypoint(&self) -> &'static str {
        "/python/bin/fdk /function/func.py handler"
    }

    fn custom_memory(&self) -> u64 {
        256
    }

    fn has_boilerplate(&self) -> bool {
        true
    }

    async fn generate_boilerplate(&self, dir: &Path) -> Result<()> {
        if dir.join("func.py").exists() {
            return Err(Error::BoilerplateFileExists { file: "func.py" });
        }
        let version = self.ctx.fdk_version(&self.fdk).await?;
        let requirement = format!("fdk>={version}\n");
        write_file(dir, "func.py", HELLO_PYTHON)?;
        write_file(dir, "requirements.txt", &requirement)?;
        write_file(dir, "test.json", GREETING_TESTS)
    }

    fn fix_images_on_init(&self) -> bool {
        true
    }

    async fn latest_fdk_version(&self) -> Result<Option<String>> {
        self.ctx.fdk_version(&self.fdk).await.map(Some)
    }

    fn is_deprecated(&self) -> bool {
        self.deprecated
    }
}

const HELLO_PYTHON: &str = r#"import io
import json
import logging

from fdk import response


def handler(ctx, data: io.BytesIO = None):
    name = "World"
    try:
        body = json.loads(data.getvalue())
        name = body.get("name")
    except (Exception, ValueError) as ex:
        logging.getLogger().info('error parsing json payload: ' + str(ex))

    logging.getLogger().info("Inside Python Hello World function")
    return response.Response(
        ctx, response_data=json.dumps(
            {"message": "Hello {0}".format(name)}),
        headers={"Content-Type": "application/json"}
    )
"#;
