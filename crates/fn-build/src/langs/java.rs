use std::path::Path;

use async_trait::async_trait;

use super::{maven_build_cmds, require_project_file, write_file, LangHelper};
use crate::error::{Error, Result};
use crate::fdk::{FdkSource, HelperContext, IndexFormat};

const JAVA_FDK_URL: &str = "https://repo1.maven.org/maven2/com/fnproject/fn/fdk/maven-metadata.xml";
const JAVA_FDK_ENV: &str = "FN_JAVA_FDK_VERSION";

pub(crate) fn java_fdk_source() -> FdkSource {
    FdkSource::new("Java", JAVA_FDK_URL, JAVA_FDK_ENV, IndexFormat::MavenMetadata)
}

/// Maven projects on the Java FDK images.
pub struct JavaHelper {
    version: &'static str,
    ctx: HelperContext,
    fdk: FdkSource,
}

impl JavaHelper {
    pub fn new(version: &'static str, ctx: HelperContext) -> Self {
        Self {
            version,
            ctx,
            fdk: java_fdk_source(),
        }
    }

    fn image_prefixes(&self) -> Result<(&'static str, &'static str)> {
        match self.version {
            "8" => Ok(("", "")),
            "11" => Ok(("jdk11-", "jre11-")),
            "17" => Ok(("jdk17-", "jre17-")),
            other => Err(Error::UnsupportedJavaVersion {
                version: other.to_owned(),
            }),
        }
    }
}

#[async_trait]
impl LangHelper for JavaHelper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["java".to_owned(), format!("java{}", self.version)]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".java"]
    }

    async fn build_from_image(&self) -> Result<String> {
        let (build, _) = self.image_prefixes()?;
        let fdk = self.ctx.fdk_version(&self.fdk).await?;
        Ok(format!("fnproject/fn-java-fdk-build:{build}{fdk}"))
    }

    async fn run_from_image(&self) -> Result<String> {
        let (_, run) = self.image_prefixes()?;
        let fdk = self.ctx.fdk_version(&self.fdk).await?;
        Ok(format!("fnproject/fn-java-fdk:{run}{fdk}"))
    }

    fn dockerfile_build_cmds(&self, _dir: &Path) -> Vec<String> {
        maven_build_cmds(self.ctx.env.as_ref())
    }

    fn dockerfile_copy_cmds(&self, _dir: &Path) -> Vec<String> {
        vec!["COPY --from=build-stage /function/target/*.jar /function/app/".to_owned()]
    }

    fn cmd(&self) -> &'static str {
        "com.example.fn.HelloFunction::handleRequest"
    }

    fn has_pre_build(&self) -> bool {
        true
    }

    fn pre_build(&self, dir: &Path) -> Result<Option<Vec<String>>> {
        require_project_file(dir, "pom.xml", "Maven")?;
        Ok(None)
    }

    fn has_boilerplate(&self) -> bool {
        true
    }

    async fn generate_boilerplate(&self, dir: &Path) -> Result<()> {
        if dir.join("pom.xml").exists() {
            return Err(Error::BoilerplateExists);
        }
        let fdk = self.ctx.fdk_version(&self.fdk).await?;
        write_file(dir, "pom.xml", &pom_file(&fdk, self.version))?;
        write_file(
            dir,
            "src/main/java/com/example/fn/HelloFunction.java",
            HELLO_JAVA,
        )?;
        write_file(
            dir,
            "src/test/java/com/example/fn/HelloFunctionTest.java",
            HELLO_JAVA_TEST,
        )
    }

    fn fix_images_on_init(&self) -> bool {
        true
    }

    async fn latest_fdk_version(&self) -> Result<Option<String>> {
        self.ctx.fdk_version(&self.fdk).await.map(Some)
    }
}

/// The early Java 9 images. Build-only; it has no boilerplate.
pub struct Java9Helper;

#[async_trait]
impl LangHelper for Java9Helper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["java9".to_owned()]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    async fn build_from_image(&self) -> Result<String> {
        Ok("fnproject/fn-java-fdk-build-1.9:latest".to_owned())
    }

    async fn run_from_image(&self) -> Result<String> {
        Ok("fnproject/fn-java-fdk-1.9:latest".to_owned())
    }

    fn dockerfile_copy_cmds(&self, _dir: &Path) -> Vec<String> {
        vec!["COPY --from=build-stage /function/target/*.jar /function/app/".to_owned()]
    }
}

/// GraalVM native images of Maven Java functions.
pub struct SvmHelper {
    java: JavaHelper,
}

impl SvmHelper {
    pub fn new(ctx: HelperContext) -> Self {
        Self {
            java: JavaHelper::new("11", ctx),
        }
    }
}

#[async_trait]
impl LangHelper for SvmHelper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["svm".to_owned()]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[]
    }

    async fn build_from_image(&self) -> Result<String> {
        Ok("fnproject/fn-java-svm:dev".to_owned())
    }

    async fn run_from_image(&self) -> Result<String> {
        Ok("fnproject/fn-java-svm:latest".to_owned())
    }

    /// The Maven lines without their `RUN` steps, then a native-image
    /// package under the `svm` profile.
    fn dockerfile_build_cmds(&self, dir: &Path) -> Vec<String> {
        let mut cmds: Vec<String> = self
            .java
            .dockerfile_build_cmds(dir)
            .into_iter()
            .filter(|c| !c.starts_with("RUN"))
            .collect();
        cmds.push("ARG MVN_PROFILE=svm".to_owned());
        cmds.push(r#"RUN mvn -P"${MVN_PROFILE}" -Dgraalvm.home="${GRAALVM_HOME}" package"#.to_owned());
        cmds
    }

    fn dockerfile_copy_cmds(&self, _dir: &Path) -> Vec<String> {
        vec!["COPY --from=build-stage /function/target/func /function".to_owned()]
    }

    fn cmd(&self) -> &'static str {
        self.java.cmd()
    }

    fn has_pre_build(&self) -> bool {
        self.java.has_pre_build()
    }

    fn pre_build(&self, dir: &Path) -> Result<Option<Vec<String>>> {
        self.java.pre_build(dir)
    }

    fn has_boilerplate(&self) -> bool {
        true
    }

    async fn generate_boilerplate(&self, dir: &Path) -> Result<()> {
        self.java.generate_boilerplate(dir).await
    }

    fn fix_images_on_init(&self) -> bool {
        self.java.fix_images_on_init()
    }
}

fn pom_file(fdk_version: &str, java_version: &str) -> String {
    // Java 8 is spelled 1.8 in compiler plugin configuration.
    let release = if java_version == "8" { "1.8" } else { java_version };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 http://maven.apache.org/xsd/maven-4.0.0.xsd">
    <modelVersion>4.0.0</modelVersion>
    <properties>
        <project.build.sourceEncoding>UTF-8</project.build.sourceEncoding>
        <fdk.version>{fdk_version}</fdk.version>
    </properties>
    <groupId>com.example.fn</groupId>
    <artifactId>hello</artifactId>
    <version>1.0.0</version>

    <dependencies>
        <dependency>
            <groupId>com.fnproject.fn</groupId>
            <artifactId>api</artifactId>
            <version>${{fdk.version}}</version>
        </dependency>
        <dependency>
            <groupId>com.fnproject.fn</groupId>
            <artifactId>testing-core</artifactId>
            <version>${{fdk.version}}</version>
            <scope>test</scope>
        </dependency>
        <dependency>
            <groupId>com.fnproject.fn</groupId>
            <artifactId>testing-junit4</artifactId>
            <version>${{fdk.version}}</version>
            <scope>test</scope>
        </dependency>
        <dependency>
            <groupId>junit</groupId>
            <artifactId>junit</artifactId>
            <version>4.13.2</version>
            <scope>test</scope>
        </dependency>
    </dependencies>

    <build>
        <plugins>
            <plugin>
                <groupId>org.apache.maven.plugins</groupId>
                <artifactId>maven-compiler-plugin</artifactId>
                <version>3.8.1</version>
                <configuration>
                    <source>{release}</source>
                    <target>{release}</target>
                </configuration>
            </plugin>
            <plugin>
                <groupId>org.apache.maven.plugins</groupId>
                <artifactId>maven-surefire-plugin</artifactId>
                <version>2.22.1</version>
                <configuration>
                    <useSystemClassLoader>false</useSystemClassLoader>
                </configuration>
            </plugin>
        </plugins>
    </build>
</project>
"#
    )
}

const HELLO_JAVA: &str = r#"package com.example.fn;

public class HelloFunction {

    public String handleRequest(String input) {
        String name = (input == null || input.isEmpty()) ? "world" : input;

        System.out.println("Inside Java Hello World function");
        return "Hello, " + name + "!";
    }

}
"#;

const HELLO_JAVA_TEST: &str = r#"package com.example.fn;

import com.fnproject.fn.testing.*;
import org.junit.*;

import static org.junit.Assert.*;

public class HelloFunctionTest {

    @Rule
    public final FnTestingRule testing = FnTestingRule.createDefault();

    @Test
    public void shouldReturnGreeting() {
        testing.givenEvent().enqueue();
        testing.thenRun(HelloFunction.class, "handleRequest");

        FnResult result = testing.getOnlyResult();
        assertEquals("Hello, world!", result.getBodyAsString());
    }

}
"#;
