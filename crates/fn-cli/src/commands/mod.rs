pub mod apps;
pub mod build;
pub mod context;
pub mod deploy;
pub mod functions;
pub mod init;
pub mod invoke;
pub mod migrate;
pub mod server;
pub mod test;
pub mod triggers;
pub mod version;

use std::collections::BTreeMap;

use serde_json::Value;

/// Split repeated `KEY=VALUE` flags. A missing `=` yields an empty value,
/// which deletes the key where config is merged.
pub(crate) fn parse_config(pairs: &[String]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|p| match p.split_once('=') {
            Some((k, v)) => (k.to_owned(), v.to_owned()),
            None => (p.clone(), String::new()),
        })
        .collect()
}

/// Split repeated `KEY=JSON` flags; values that are not JSON are kept as
/// strings.
pub(crate) fn parse_annotations(pairs: &[String]) -> anyhow::Result<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for p in pairs {
        let Some((k, v)) = p.split_once('=') else {
            anyhow::bail!("annotations must be of the form KEY=VALUE, got {p:?}");
        };
        let value = match serde_json::from_str::<Value>(v) {
            Ok(json) => json,
            Err(e) => {
                tracing::debug!(key = k, error = %e, "annotation is not JSON, keeping it as a string");
                Value::String(v.to_owned())
            }
        };
        out.insert(k.to_owned(), value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_pairs_split_on_first_equals() {
        let got = parse_config(&["A=1".to_owned(), "URL=a=b".to_owned(), "GONE".to_owned()]);
        assert_eq!(got["A"], "1");
        assert_eq!(got["URL"], "a=b");
        assert_eq!(got["GONE"], "");
    }

    #[test]
    fn annotations_accept_json_or_plain_strings() {
        let got =
            parse_annotations(&["n=3".to_owned(), "s=hello".to_owned(), r#"o={"a":1}"#.to_owned()])
                .unwrap();
        assert_eq!(got["n"], serde_json::json!(3));
        assert_eq!(got["s"], serde_json::json!("hello"));
        assert_eq!(got["o"], serde_json::json!({"a": 1}));
        assert!(parse_annotations(&["novalue".to_owned()]).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn config_value_keeps_everything_after_the_first_equals(
                key in "[A-Za-z_][A-Za-z0-9_]{0,20}",
                value in "[ -~]{0,40}",
            ) {
                let got = parse_config(&[format!("{key}={value}")]);
                prop_assert_eq!(got.get(&key), Some(&value));
            }

            #[test]
            fn annotations_never_panic(s in "\\PC*") {
                let _ = parse_annotations(&[s]);
            }
        }
    }
}
