use arch_lint::rules::{NoErrorSwallowing, NoSilentResultDrop};
use arch_lint::{Analyzer, Severity};

/// Every fn crate must propagate or log its errors: no swallowed `Err`
/// arms and no `Result`s dropped without an allow annotation. Test code is
/// exempt.
#[test]
fn fn_crates_do_not_swallow_errors() {
    let workspace = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("workspace root");

    let analyzer = Analyzer::builder()
        .root(workspace)
        .exclude("**/target/**")
        .exclude("**/tests/**")
        .exclude("examples/**")
        .rule(NoErrorSwallowing::new())
        .rule(NoSilentResultDrop::new())
        .build()
        .expect("build analyzer");

    let result = analyzer.analyze().expect("analyze");
    assert!(
        !result.has_violations_at(Severity::Warning),
        "{}",
        result.format_test_report(Severity::Warning)
    );
}
