//! The JSON schema enforced on migrated function manifests.

use serde_json::{json, Value};

use crate::{Error, Result};

/// Schema for `schema_version: 20180708` manifests.
pub fn v20180708_schema() -> Value {
    let string = json!({ "type": "string" });
    let integer = json!({ "type": "integer" });
    json!({
        "title": "V20180708 func file schema",
        "type": "object",
        "properties": {
            "name": string,
            "schema_version": integer,
            "version": string,
            "runtime": string,
            "build_image": string,
            "run_image": string,
            "entrypoint": string,
            "content_type": string,
            "cmd": string,
            "memory": integer,
            "timeout": integer,
            "idle_timeout": integer,
            "config": { "type": "object" },
            "triggers": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": string,
                        "type": string,
                        "source": string
                    }
                }
            }
        }
    })
}

/// Validate `document` against `schema`, collecting every violation.
pub fn validate(schema: &Value, document: &Value) -> Result<()> {
    let validator = jsonschema::options()
        .build(schema)
        .map_err(|e| Error::InvalidSchema(e.to_string()))?;

    let errors: Vec<String> = validator.iter_errors(document).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaValidation { errors })
    }
}

/// Validate a serialized manifest's JSON projection against the current schema.
pub fn validate_func_file(document: &Value) -> Result<()> {
    validate(&v20180708_schema(), document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_migrated_manifest() {
        let doc = json!({
            "schema_version": 20180708,
            "name": "hello",
            "version": "0.0.1",
            "runtime": "go",
            "triggers": [{ "name": "hello", "type": "http", "source": "/hello" }]
        });
        validate_func_file(&doc).unwrap();
    }

    #[test]
    fn reports_every_type_error() {
        let doc = json!({ "name": 7, "memory": "lots" });
        let err = validate_func_file(&doc).unwrap_err();
        match err {
            Error::SchemaValidation { errors } => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn message_lists_errors() {
        let err = Error::SchemaValidation {
            errors: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            err.to_string(),
            "The func.yaml is not valid. Please see errors:\n- a\n- b"
        );
    }
}
