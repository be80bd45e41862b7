use std::path::Path;

use async_trait::async_trait;

use super::{write_file, LangHelper};
use crate::error::{Error, Result};
use crate::fdk::{FdkSource, HelperContext, IndexFormat};

pub struct RubyHelper {
    version: &'static str,
    ctx: HelperContext,
    fdk: FdkSource,
}

impl RubyHelper {
    pub fn new(version: &'static str, ctx: HelperContext) -> Self {
        Self {
            version,
            ctx,
            fdk: FdkSource::new(
                "Ruby",
                "https://rubygems.org/api/v1/versions/fdk/latest.json",
                "FN_RUBY_FDK_VERSION",
                IndexFormat::RubyGems,
            ),
        }
    }
}

#[async_trait]
impl LangHelper for RubyHelper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["ruby".to_owned(), format!("ruby{}", self.version)]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".rb"]
    }

    async fn build_from_image(&self) -> Result<String> {
        Ok(format!("fnproject/ruby:{}-dev", self.version))
    }

    async fn run_from_image(&self) -> Result<String> {
        Ok(format!("fnproject/ruby:{}", self.version))
    }

    fn dockerfile_build_cmds(&self, dir: &Path) -> Vec<String> {
        if dir.join("Gemfile").exists() {
            vec![
                "ADD Gemfile* /function/".to_owned(),
                "RUN bundle install".to_owned(),
            ]
        } else {
            Vec::new()
        }
    }

    fn dockerfile_copy_cmds(&self, _dir: &Path) -> Vec<String> {
        vec![
            "COPY --from=build-stage /usr/lib/ruby/gems/ /usr/lib/ruby/gems/".to_owned(),
            "COPY . /function/".to_owned(),
            "RUN chmod -R o+r /function".to_owned(),
        ]
    }

    fn entrypoint(&self) -> &'static str {
        "ruby func.rb"
    }

    fn has_boilerplate(&self) -> bool {
        true
    }

    async fn generate_boilerplate(&self, dir: &Path) -> Result<()> {
        for file in ["func.rb", "Gemfile"] {
            if dir.join(file).exists() {
                return Err(Error::BoilerplateFileExists { file });
            }
        }
        let fdk = self.ctx.fdk_version(&self.fdk).await?;
        write_file(dir, "func.rb", HELLO_RUBY)?;
        write_file(
            dir,
            "Gemfile",
            &format!("source 'https://rubygems.org' do\n  gem 'fdk', '>= {fdk}'\nend\n"),
        )
    }

    fn fix_images_on_init(&self) -> bool {
        true
    }

    async fn latest_fdk_version(&self) -> Result<Option<String>> {
        self.ctx.fdk_version(&self.fdk).await.map(Some)
    }
}

const HELLO_RUBY: &str = r#"require 'fdk'

def myfunction(context:, input:)
  input_value = input.respond_to?(:fetch) ? input.fetch('name') : input
  name = input_value.to_s.strip.empty? ? 'World' : input_value
  FDK.log(entry: "Inside Ruby Hello World function")
  { message: "Hello #{name}!" }
end

FDK.handle(target: :myfunction)
"#;
