//! Language helpers, Dockerfile synthesis and container builds for fn.
//!
//! # Build pipeline
//!
//! ```text
//! fn build
//!   1. Engine check  ── <engine> version (docker >= 17.5.0)
//!   2. Build steps   ── manifest `build:` lines via /bin/sh -c
//!   3. Dockerfile    ── user Dockerfile, or DockerfileGenerator::render()
//!                       into a temp file next to the sources
//!   4. Pre-build     ── helper checks / engine command (composer install)
//!   5. Build         ── <engine> build -t IMAGE -f DOCKERFILE ... .
//!   6. After-build   ── helper cleanup
//! ```
//!
//! Runtime helpers live in [`langs`]; the one serving a manifest is picked
//! from its `runtime` tag through the [`Registry`].

pub mod dockerfile;
pub mod driver;
pub mod error;
pub mod executor;
pub mod fdk;
pub mod langs;
pub mod pipeline;
pub mod server;

pub use dockerfile::DockerfileGenerator;
pub use driver::{BuildRequest, Builder, RunRequest};
pub use error::{Error, ExecError, Result};
pub use executor::{ContainerExecutor, OutputMode, RealExecutor};
pub use fdk::{FdkIndex, HttpFdkIndex};
pub use langs::{LangHelper, Registry};
pub use pipeline::{build_function, image_for, stamp_images, BuildOptions};
