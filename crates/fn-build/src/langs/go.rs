use std::path::Path;

use async_trait::async_trait;

use super::{write_file, LangHelper};
use crate::error::{Error, Result};
use crate::fdk::{FdkSource, HelperContext, IndexFormat};

pub struct GoHelper {
    version: &'static str,
    ctx: HelperContext,
    fdk: FdkSource,
}

impl GoHelper {
    pub fn new(version: &'static str, ctx: HelperContext) -> Self {
        Self {
            version,
            ctx,
            fdk: FdkSource::new(
                "Go",
                "https://api.github.com/repos/fnproject/fdk-go/tags",
                "FN_GO_FDK_VERSION",
                IndexFormat::GithubTags,
            ),
        }
    }
}

#[async_trait]
impl LangHelper for GoHelper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["go".to_owned(), format!("go{}", self.version)]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".go"]
    }

    async fn build_from_image(&self) -> Result<String> {
        Ok(format!("fnproject/go:{}-dev", self.version))
    }

    async fn run_from_image(&self) -> Result<String> {
        Ok(format!("fnproject/go:{}", self.version))
    }

    fn dockerfile_build_cmds(&self, dir: &Path) -> Vec<String> {
        let vendor = dir.join("vendor").is_dir();
        let mut r = Vec::new();
        if !vendor && dir.join("Gopkg.toml").exists() {
            r.push("RUN go get -u github.com/golang/dep/cmd/dep".to_owned());
            if dir.join("Gopkg.lock").exists() {
                r.push("ADD Gopkg.* /go/src/func/".to_owned());
                r.push("RUN cd /go/src/func/ && dep ensure --vendor-only".to_owned());
                r.push("ADD . /go/src/func/".to_owned());
            } else {
                r.push("ADD . /go/src/func/".to_owned());
                r.push("RUN cd /go/src/func/ && dep ensure".to_owned());
            }
        } else if dir.join("go.mod").exists() {
            r.push("WORKDIR /go/src/func/".to_owned());
            r.push("ENV GO111MODULE=on".to_owned());
            if vendor {
                r.push(r#"ENV GOFLAGS="-mod=vendor""#.to_owned());
            }
            r.push("COPY . .".to_owned());
        } else {
            r.push("ADD . /go/src/func/".to_owned());
        }
        r.push("RUN cd /go/src/func/ && go build -o func".to_owned());
        r
    }

    fn dockerfile_copy_cmds(&self, _dir: &Path) -> Vec<String> {
        vec!["COPY --from=build-stage /go/src/func/func /function/".to_owned()]
    }

    fn entrypoint(&self) -> &'static str {
        "./func"
    }

    fn has_boilerplate(&self) -> bool {
        true
    }

    async fn generate_boilerplate(&self, dir: &Path) -> Result<()> {
        if dir.join("func.go").exists() {
            return Err(Error::BoilerplateFileExists { file: "func.go" });
        }
        let fdk = self.ctx.fdk_version(&self.fdk).await?;
        write_file(dir, "func.go", HELLO_GO)?;
        write_file(dir, "go.mod", &format!("module func\n\nrequire github.com/fnproject/fdk-go {fdk}\n"))?;
        write_file(dir, "test.json", super::GREETING_TESTS)
    }

    fn fix_images_on_init(&self) -> bool {
        true
    }

    async fn latest_fdk_version(&self) -> Result<Option<String>> {
        self.ctx.fdk_version(&self.fdk).await.map(Some)
    }
}

const HELLO_GO: &str = r#"package main

import (
	"context"
	"encoding/json"
	"fmt"
	"io"
	"log"

	fdk "github.com/fnproject/fdk-go"
)

func main() {
	fdk.Handle(fdk.HandlerFunc(myHandler))
}

type Person struct {
	Name string `json:"name"`
}

func myHandler(ctx context.Context, in io.Reader, out io.Writer) {
	p := &Person{Name: "World"}
	json.NewDecoder(in).Decode(p)
	msg := struct {
		Msg string `json:"message"`
	}{
		Msg: fmt.Sprintf("Hello %s", p.Name),
	}
	log.Print("Inside Go Hello World function")
	json.NewEncoder(out).Encode(&msg)
}
"#;
