//! Test cases for `fn test`: loading and output matching.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::funcfile::{FnTest, OutputMap};
use crate::{Error, Result};

pub const TEST_FILE: &str = "test.json";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TestFile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<FnTest>,
}

/// Collect the cases for the function in `dir`. A `test.json` next to the
/// manifest replaces the manifest's own `tests`.
pub fn load_cases(dir: &Path, declared: &[FnTest]) -> Result<Vec<FnTest>> {
    let test_file = dir.join(TEST_FILE);
    let tests = if crate::paths::exists(&test_file) {
        let bytes = std::fs::read(&test_file).map_err(|e| Error::ManifestRead {
            path: test_file.clone(),
            source: e,
        })?;
        let tf: TestFile = serde_json::from_slice(&bytes).map_err(|e| Error::TestFile {
            path: test_file.clone(),
            source: e,
        })?;
        tf.tests
    } else {
        declared.to_vec()
    };

    if tests.is_empty() {
        return Err(Error::NoTests);
    }
    Ok(tests)
}

/// Bytes piped to the function for a case. A missing input or a body that
/// is the empty string sends nothing.
pub fn input_bytes(case: &FnTest) -> Vec<u8> {
    match &case.input {
        None => Vec::new(),
        Some(input) => match &input.body {
            serde_json::Value::String(s) if s.is_empty() => Vec::new(),
            body => body.to_string().into_bytes(),
        },
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Mismatch {
    #[error("Unexpected output found: {0}")]
    UnexpectedOutput(String),

    #[error("Mismatched output found.\nexpected:\n{expected}\ngot:\n{got}")]
    Output { expected: String, got: String },
}

/// Compare a function's stdout with the expected body as JSON documents.
/// Object key order is not significant.
pub fn check_output(expected: Option<&OutputMap>, got: &str) -> std::result::Result<(), Mismatch> {
    let Some(expected) = expected else {
        if got.is_empty() {
            return Ok(());
        }
        return Err(Mismatch::UnexpectedOutput(got.to_owned()));
    };

    let actual: Option<serde_json::Value> = match serde_json::from_str(got) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(error = %e, "function output is not JSON");
            None
        }
    };
    if actual.as_ref() == Some(&expected.body) {
        Ok(())
    } else {
        Err(Mismatch::Output {
            expected: expected.body.to_string(),
            got: got.to_owned(),
        })
    }
}
