use std::path::Path;

use async_trait::async_trait;

use super::{write_file, LangHelper};
use crate::error::{Error, Result};
use crate::fdk::{FdkSource, HelperContext, IndexFormat};

pub struct DotnetHelper {
    version: &'static str,
    ctx: HelperContext,
    fdk: FdkSource,
}

impl DotnetHelper {
    pub fn new(version: &'static str, ctx: HelperContext) -> Self {
        Self {
            version,
            ctx,
            fdk: FdkSource::new(
                ".NET",
                "https://api.github.com/repos/fnproject/fdk-dotnet/tags",
                "FN_DOTNET_FDK_VERSION",
                IndexFormat::GithubTags,
            ),
        }
    }

    fn target_framework(&self) -> String {
        match self.version {
            "3.1" => "netcoreapp3.1".to_owned(),
            v => format!("net{v}"),
        }
    }
}

#[async_trait]
impl LangHelper for DotnetHelper {
    fn lang_strings(&self) -> Vec<String> {
        vec!["dotnet".to_owned(), format!("dotnet{}", self.version)]
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".cs"]
    }

    async fn build_from_image(&self) -> Result<String> {
        let fdk = self.ctx.fdk_version(&self.fdk).await?;
        Ok(format!("fnproject/dotnet:{}-{fdk}-dev", self.version))
    }

    async fn run_from_image(&self) -> Result<String> {
        let fdk = self.ctx.fdk_version(&self.fdk).await?;
        Ok(format!("fnproject/dotnet:{}-{fdk}", self.version))
    }

    fn dockerfile_build_cmds(&self, _dir: &Path) -> Vec<String> {
        vec![
            "COPY . .".to_owned(),
            "RUN dotnet sln add src/Function/Function.csproj tests/Function.Tests/Function.Tests.csproj"
                .to_owned(),
            "RUN dotnet build -c Release".to_owned(),
            "RUN dotnet test -c Release".to_owned(),
            "RUN dotnet publish src/Function/Function.csproj -c Release -o out".to_owned(),
        ]
    }

    fn dockerfile_copy_cmds(&self, _dir: &Path) -> Vec<String> {
        vec!["COPY --from=build-stage /function/out/ /function/".to_owned()]
    }

    fn entrypoint(&self) -> &'static str {
        "dotnet Function.dll"
    }

    fn cmd(&self) -> &'static str {
        "Function:Greeter:greet"
    }

    fn has_boilerplate(&self) -> bool {
        true
    }

    async fn generate_boilerplate(&self, dir: &Path) -> Result<()> {
        if dir.join("Function.sln").exists() {
            return Err(Error::BoilerplateFileExists {
                file: "Function.sln",
            });
        }
        let fdk = self.ctx.fdk_version(&self.fdk).await?;
        let framework = self.target_framework();
        write_file(dir, "Function.sln", SOLUTION)?;
        write_file(
            dir,
            "src/Function/Function.csproj",
            &SRC_CSPROJ
                .replace("{framework}", &framework)
                .replace("{fdk_version}", &fdk),
        )?;
        write_file(dir, "src/Function/Program.cs", HELLO_DOTNET)?;
        write_file(
            dir,
            "tests/Function.Tests/Function.Tests.csproj",
            &TESTS_CSPROJ.replace("{framework}", &framework),
        )?;
        write_file(dir, "tests/Function.Tests/ProgramTest.cs", HELLO_DOTNET_TEST)
    }

    fn fix_images_on_init(&self) -> bool {
        true
    }

    async fn latest_fdk_version(&self) -> Result<Option<String>> {
        self.ctx.fdk_version(&self.fdk).await.map(Some)
    }
}

const HELLO_DOTNET: &str = r#"using Fnproject.Fn.Fdk;

using System.Runtime.CompilerServices;
[assembly:InternalsVisibleTo("Function.Tests")]
namespace Function {
	class Greeter {
		public string greet(string input) {
			return string.Format("Hello {0}!",
				input.Length == 0 ? "World" : input.Trim());
		}

		static void Main(string[] args) { Fdk.Handle(args[0]); }
	}
}
"#;

const HELLO_DOTNET_TEST: &str = r#"using Function;
using NUnit.Framework;

namespace Function.Tests {
	public class GreeterTest {
		[Test]
		public void TestGreetValid() {
			Greeter greeter = new Greeter();
			string response = greeter.greet("Dotnet");
			Assert.AreEqual("Hello Dotnet!", response);
		}

		[Test]
		public void TestGreetEmpty() {
			Greeter greeter = new Greeter();
			string response = greeter.greet("");
			Assert.AreEqual("Hello World!", response);
		}
	}
}
"#;

const SOLUTION: &str = r#"Microsoft Visual Studio Solution File, Format Version 12.00
# Visual Studio 15
VisualStudioVersion = 15.0.26124.0
MinimumVisualStudioVersion = 15.0.26124.0
Global
  GlobalSection(SolutionConfigurationPlatforms) = preSolution
    Debug|Any CPU = Debug|Any CPU
    Release|Any CPU = Release|Any CPU
  EndGlobalSection
  GlobalSection(SolutionProperties) = preSolution
    HideSolutionNode = FALSE
  EndGlobalSection
EndGlobal
"#;

const SRC_CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk">

  <PropertyGroup>
    <OutputType>Exe</OutputType>
    <TargetFramework>{framework}</TargetFramework>
  </PropertyGroup>

  <ItemGroup>
    <PackageReference Include="Fnproject.Fn.Fdk" Version="{fdk_version}" />
  </ItemGroup>
</Project>
"#;

const TESTS_CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk">

  <PropertyGroup>
    <TargetFramework>{framework}</TargetFramework>
    <IsPackable>false</IsPackable>
  </PropertyGroup>

  <ItemGroup>
    <PackageReference Include="NUnit" Version="3.12.0" />
    <PackageReference Include="NUnit3TestAdapter" Version="3.16.1" />
    <PackageReference Include="Microsoft.NET.Test.Sdk" Version="16.5.0" />
    <ProjectReference Include="..\..\src\Function\Function.csproj" />
  </ItemGroup>

</Project>
"#;
