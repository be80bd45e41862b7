use std::path::Path;

use async_trait::async_trait;

use super::{write_file, LangHelper};
use crate::error::{Error, Result};
use crate::fdk::{FdkSource, HelperContext, IndexFormat};

pub struct NodeHelper {
    version: &'static str,
    ctx: HelperContext,
    fdk: FdkSource,
}

impl NodeHelper {
    pub fn new(version: &'static str, ctx: HelperContext) -> Self {
        Self {
            version,
            ctx,
            fdk: FdkSource::new(
                "Node",
                "https://registry.npmjs.org/@fnproject/fdk",
                "FN_NODE_FDK_VERSION",
                IndexFormat::Npm,
            ),
        }
    }
}

#[async_trait]
impl LangHelper for NodeHelper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["node".to_owned(), format!("node{}", self.version)]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".js"]
    }

    async fn build_from_image(&self) -> Result<String> {
        Ok(format!("fnproject/node:{}-dev", self.version))
    }

    async fn run_from_image(&self) -> Result<String> {
        Ok(format!("fnproject/node:{}", self.version))
    }

    /// `npm install` in the build stage unless the function ships a
    /// bundled `dist/` or its own `node_modules`.
    fn dockerfile_build_cmds(&self, dir: &Path) -> Vec<String> {
        let mut r = Vec::new();
        if dir.join("dist").exists() {
            return r;
        }
        if dir.join("package.json").exists() && !dir.join("node_modules").exists() {
            if dir.join("package-lock.json").exists() {
                r.push("ADD package-lock.json /function/".to_owned());
            }
            r.push("ADD package.json /function/".to_owned());
            r.push("RUN npm install".to_owned());
        }
        r
    }

    fn dockerfile_copy_cmds(&self, dir: &Path) -> Vec<String> {
        if dir.join("dist").exists() {
            return vec!["ADD dist/main.js /function/func.js".to_owned()];
        }
        let mut r = vec!["ADD . /function/".to_owned()];
        if dir.join("package.json").exists() && !dir.join("node_modules").exists() {
            r.push("COPY --from=build-stage /function/node_modules/ /function/node_modules/".to_owned());
        }
        r.push("RUN chmod -R o+r /function".to_owned());
        r
    }

    fn entrypoint(&self) -> &'static str {
        "node func.js"
    }

    fn has_boilerplate(&self) -> bool {
        true
    }

    async fn generate_boilerplate(&self, dir: &Path) -> Result<()> {
        if dir.join("package.json").exists() || dir.join("func.js").exists() {
            return Err(Error::BoilerplateExists);
        }
        let fdk = self.ctx.fdk_version(&self.fdk).await?;
        write_file(dir, "package.json", &PACKAGE_JSON.replace("{fdk_version}", &fdk))?;
        write_file(dir, "func.js", FUNC_JS)
    }

    fn fix_images_on_init(&self) -> bool {
        true
    }

    async fn latest_fdk_version(&self) -> Result<Option<String>> {
        self.ctx.fdk_version(&self.fdk).await.map(Some)
    }
}

/// Node 4 on the AWS Lambda compatibility image. Never auto-detected.
pub struct LambdaNodeHelper;

#[async_trait]
impl LangHelper for LambdaNodeHelper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["lambda-nodejs4.3".to_owned(), "lambda-node-4".to_owned()]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    async fn build_from_image(&self) -> Result<String> {
        Ok("fnproject/lambda:node-4".to_owned())
    }

    async fn run_from_image(&self) -> Result<String> {
        Ok("fnproject/lambda:node-4".to_owned())
    }

    fn is_multi_stage(&self) -> bool {
        false
    }

    fn dockerfile_build_cmds(&self, dir: &Path) -> Vec<String> {
        let mut r = Vec::new();
        if dir.join("package.json").exists() {
            r.push("ADD package.json /function/".to_owned());
            r.push("RUN npm install".to_owned());
        }
        r.push("ADD . /function/".to_owned());
        r
    }

    fn cmd(&self) -> &'static str {
        "func.handler"
    }
}

const FUNC_JS: &str = r#"const fdk=require('@fnproject/fdk');

fdk.handle(function(input){
  let name = 'World';
  if (input.name) {
    name = input.name;
  }
  console.log('\nInside Node Hello World function')
  return {'message': 'Hello ' + name}
})
"#;

const PACKAGE_JSON: &str = r#"{
    "name": "hellofn",
    "version": "1.0.0",
    "description": "example function",
    "main": "func.js",
    "author": "",
    "license": "Apache-2.0",
    "dependencies": {
        "@fnproject/fdk": ">={fdk_version}"
    }
}
"#;
