use std::path::Path;

use async_trait::async_trait;

use super::{require_project_file, write_file, LangHelper, GREETING_TESTS};
use crate::error::{Error, Result};
use crate::fdk::{FdkSource, HelperContext, IndexFormat};

const CLOJURE_VERSION: &str = "1.9.0";

/// Leiningen projects packaged as a standalone jar.
pub struct ClojureHelper {
    ctx: HelperContext,
    fdk: FdkSource,
}

impl ClojureHelper {
    pub fn new(ctx: HelperContext) -> Self {
        Self {
            ctx,
            fdk: FdkSource::new(
                "Clojure",
                "https://clojars.org/api/artifacts/unpause/fdk-clj",
                "FN_CLOJURE_FDK_VERSION",
                IndexFormat::Clojars,
            ),
        }
    }
}

#[async_trait]
impl LangHelper for ClojureHelper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["clojure".to_owned()]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".clj"]
    }

    async fn build_from_image(&self) -> Result<String> {
        Ok("clojure:lein".to_owned())
    }

    async fn run_from_image(&self) -> Result<String> {
        Ok("openjdk:9-jre".to_owned())
    }

    fn dockerfile_build_cmds(&self, _dir: &Path) -> Vec<String> {
        vec![
            "ADD project.clj /function/project.clj".to_owned(),
            "ADD src /function/src".to_owned(),
            r#"RUN ["lein", "uberjar"]"#.to_owned(),
        ]
    }

    fn dockerfile_copy_cmds(&self, _dir: &Path) -> Vec<String> {
        vec![
            "COPY --from=build-stage /function/target/com.fdk.func-1.0.0-standalone.jar /function/app/func.jar"
                .to_owned(),
        ]
    }

    fn entrypoint(&self) -> &'static str {
        "java -jar /function/app/func.jar"
    }

    fn has_pre_build(&self) -> bool {
        true
    }

    fn pre_build(&self, dir: &Path) -> Result<Option<Vec<String>>> {
        require_project_file(dir, "project.clj", "Leiningen")?;
        Ok(None)
    }

    fn has_boilerplate(&self) -> bool {
        true
    }

    async fn generate_boilerplate(&self, dir: &Path) -> Result<()> {
        if dir.join("project.clj").exists() || dir.join("test.json").exists() {
            return Err(Error::BoilerplateExists);
        }
        let fdk = self.ctx.fdk_version(&self.fdk).await?;
        write_file(dir, "project.clj", &project_file(&fdk))?;
        write_file(dir, "test.json", GREETING_TESTS)?;
        write_file(dir, "src/func/core.clj", HELLO_CLOJURE)?;
        write_file(dir, "test/func/core_test.clj", HELLO_CLOJURE_TEST)
    }

    fn fix_images_on_init(&self) -> bool {
        true
    }

    async fn latest_fdk_version(&self) -> Result<Option<String>> {
        self.ctx.fdk_version(&self.fdk).await.map(Some)
    }
}

fn project_file(fdk_version: &str) -> String {
    format!(
        r#"(defproject com.fdk.func "1.0.0"
  :description "Clojure FDK for Fn"
  :url "https://github.com/fnproject"
  :license {{:name "Apache License Version 2.0"
            :url "http://www.apache.org/licenses/LICENSE-2.0.txt"}}
  :dependencies [[org.clojure/clojure "{CLOJURE_VERSION}"]
                 [unpause/fdk-clj "{fdk_version}"]
                 [org.clojure/test.check "0.9.0"]]
  :main func.core
  :jvm-opts ["-Duser.timezone=UTC"]
  :profiles {{:uberjar {{:aot :all}}}}
  :test-paths ["test"])
"#
    )
}

const HELLO_CLOJURE: &str = r#"(ns func.core
  (:require [fdk-clj.core :as fdk])
  (:gen-class))

(defn handler [ctx data]
  { :message (str "Hello " (get data :name "World")) })

(defn -main [& args] (fdk/handle handler))
"#;

const HELLO_CLOJURE_TEST: &str = r#"(ns func.core-test
  (:refer-clojure :exclude [extend second])
  (:require [clojure.test :refer :all]
            [func.core :refer :all]))

(deftest handler-test
  (is (= (handler nil { :name "Johnny" }) { :message "Hello Johnny" }))
  (is (= (handler nil nil) {:message "Hello World"})))
"#;
