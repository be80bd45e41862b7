use std::path::Path;

use async_trait::async_trait;

use super::java::java_fdk_source;
use super::{maven_build_cmds, require_project_file, write_file, LangHelper};
use crate::error::{Error, Result};
use crate::fdk::{FdkSource, HelperContext};

/// Kotlin on the Java 11 FDK images, built with Maven.
pub struct KotlinHelper {
    ctx: HelperContext,
    fdk: FdkSource,
}

impl KotlinHelper {
    pub fn new(ctx: HelperContext) -> Self {
        Self {
            ctx,
            fdk: java_fdk_source(),
        }
    }
}

#[async_trait]
impl LangHelper for KotlinHelper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["kotlin".to_owned()]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".kt"]
    }

    async fn build_from_image(&self) -> Result<String> {
        let fdk = self.ctx.fdk_version(&self.fdk).await?;
        Ok(format!("fnproject/fn-java-fdk-build:jdk11-{fdk}"))
    }

    async fn run_from_image(&self) -> Result<String> {
        let fdk = self.ctx.fdk_version(&self.fdk).await?;
        Ok(format!("fnproject/fn-java-fdk:jre11-{fdk}"))
    }

    fn dockerfile_build_cmds(&self, _dir: &Path) -> Vec<String> {
        maven_build_cmds(self.ctx.env.as_ref())
    }

    fn dockerfile_copy_cmds(&self, _dir: &Path) -> Vec<String> {
        vec!["COPY --from=build-stage /function/target/*.jar /function/app/".to_owned()]
    }

    fn cmd(&self) -> &'static str {
        "com.fn.example.HelloFunctionKt::hello"
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
        write_file(dir, "pom.xml", &POM.replace("{fdk_version}", &fdk))?;
        write_file(dir, "src/main/kotlin/HelloFunction.kt", HELLO_KOTLIN)?;
        write_file(dir, "src/test/kotlin/HelloFunctionTest.kt", HELLO_KOTLIN_TEST)
    }

    fn fix_images_on_init(&self) -> bool {
        true
    }

    async fn latest_fdk_version(&self) -> Result<Option<String>> {
        self.ctx.fdk_version(&self.fdk).await.map(Some)
    }
}

const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 http://maven.apache.org/xsd/maven-4.0.0.xsd">
    <modelVersion>4.0.0</modelVersion>
    <groupId>com.example.fn</groupId>
    <artifactId>hello</artifactId>
    <version>1.0.0</version>

    <properties>
        <kotlin.version>1.2.51</kotlin.version>
        <fdk.version>{fdk_version}</fdk.version>
        <project.build.sourceEncoding>UTF-8</project.build.sourceEncoding>
    </properties>

    <dependencies>
        <dependency>
            <groupId>com.fnproject.fn</groupId>
            <artifactId>api</artifactId>
            <version>${fdk.version}</version>
        </dependency>
        <dependency>
            <groupId>org.jetbrains.kotlin</groupId>
            <artifactId>kotlin-stdlib</artifactId>
            <version>${kotlin.version}</version>
        </dependency>
        <dependency>
            <groupId>com.fnproject.fn</groupId>
            <artifactId>testing-core</artifactId>
            <version>${fdk.version}</version>
            <scope>test</scope>
        </dependency>
        <dependency>
            <groupId>com.fnproject.fn</groupId>
            <artifactId>testing-junit4</artifactId>
            <version>${fdk.version}</version>
            <scope>test</scope>
        </dependency>
        <dependency>
            <groupId>org.jetbrains.kotlin</groupId>
            <artifactId>kotlin-test-junit</artifactId>
            <version>${kotlin.version}</version>
            <scope>test</scope>
        </dependency>
    </dependencies>

    <build>
        <sourceDirectory>${project.basedir}/src/main/kotlin</sourceDirectory>
        <testSourceDirectory>${project.basedir}/src/test/kotlin</testSourceDirectory>
        <plugins>
            <plugin>
                <artifactId>kotlin-maven-plugin</artifactId>
                <groupId>org.jetbrains.kotlin</groupId>
                <version>${kotlin.version}</version>
                <executions>
                    <execution>
                        <id>compile</id>
                        <goals> <goal>compile</goal> </goals>
                    </execution>
                    <execution>
                        <id>test-compile</id>
                        <phase>compile</phase>
                        <goals> <goal>test-compile</goal> </goals>
                    </execution>
                </executions>
            </plugin>
        </plugins>
    </build>
</project>
"#;

const HELLO_KOTLIN: &str = r#"package com.fn.example

fun hello(input: String) = when {
    input.isEmpty() -> ("Hello, world!")
    else -> ("Hello, ${input}")
}
"#;

const HELLO_KOTLIN_TEST: &str = r#"package com.fn.example

import com.fnproject.fn.testing.*
import org.junit.*
import kotlin.test.assertEquals

class HelloFunctionTest {

    @Rule @JvmField
    val fn = FnTestingRule.createDefault()

    @Test
    fun `should return default greeting`() {
        with(fn) {
            givenEvent().enqueue()
            thenRun("com.fn.example.HelloFunctionKt", "hello")
            assertEquals("Hello, world!", getOnlyResult().getBodyAsString())
        }
    }
}
"#;
