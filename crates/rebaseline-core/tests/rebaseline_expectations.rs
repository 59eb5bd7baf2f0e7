//! `rebaseline-expectations` against the fake host.

use rebaseline_core::commands::parallel::RebaselineOptions;
use rebaseline_core::commands::rebaseline_expectations;
use rebaseline_core::fakes::{mock_host, ExecutiveCall, FakeHost};
use rebaseline_core::{BuilderInfo, BuilderRegistry};

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn internal(subcommand: &str, suffixes: &str, builder: &str, test: &str) -> Vec<String> {
    argv(&[
        "/mock-checkout/blink-rebaseline",
        subcommand,
        "--suffixes",
        suffixes,
        "--builder",
        builder,
        "--test",
        test,
    ])
}

fn mac_host() -> FakeHost {
    let mut host = mock_host();
    host.builders = BuilderRegistry::from_entries([
        ("MOCK Mac10.10".to_string(), BuilderInfo::new("test-mac-mac10.10", &["mock-specifier"])),
        ("MOCK Mac10.11".to_string(), BuilderInfo::new("test-mac-mac10.11", &["mock-specifier"])),
    ]);
    host
}

#[tokio::test]
async fn marked_tests_are_rebaselined_on_every_builder() {
    let host = mac_host();
    let results = r#"ADD_RESULTS({
    "tests": {
        "userscripts": {
            "another-test.html": {"expected": "PASS", "actual": "PASS TEXT"},
            "images.svg": {"expected": "FAIL", "actual": "IMAGE"}
        }
    }
});"#;
    for builder in ["MOCK Mac10.10", "MOCK Mac10.11"] {
        host.results.set_results(builder, results).unwrap();
    }
    host.write_layout_test_file("userscripts/another-test.html", "Dummy test contents");
    host.write_layout_test_file("userscripts/images.svg", "Dummy test contents");
    host.write_layout_test_file(
        "TestExpectations",
        "Bug(x) [ Mac ] userscripts/another-test.html [ Rebaseline ]\n\
         Bug(x) [ Mac ] userscripts/images.svg [ Rebaseline ]\n\
         Bug(x) [ Mac ] userscripts/not-actually-failing.html [ Rebaseline ]\n",
    );

    rebaseline_expectations::execute(&host, RebaselineOptions::default(), None)
        .await
        .unwrap();

    let copy = "copy-existing-baselines-internal";
    let rebaseline = "rebaseline-test-internal";
    assert_eq!(
        host.executive.calls(),
        vec![
            ExecutiveCall::Parallel(vec![
                internal(copy, "txt", "MOCK Mac10.10", "userscripts/another-test.html"),
                internal(copy, "txt", "MOCK Mac10.11", "userscripts/another-test.html"),
                internal(copy, "png", "MOCK Mac10.10", "userscripts/images.svg"),
                internal(copy, "png", "MOCK Mac10.11", "userscripts/images.svg"),
            ]),
            ExecutiveCall::Parallel(vec![
                internal(rebaseline, "txt", "MOCK Mac10.10", "userscripts/another-test.html"),
                internal(rebaseline, "txt", "MOCK Mac10.11", "userscripts/another-test.html"),
                internal(rebaseline, "png", "MOCK Mac10.10", "userscripts/images.svg"),
                internal(rebaseline, "png", "MOCK Mac10.11", "userscripts/images.svg"),
            ]),
        ]
    );
}

#[tokio::test]
async fn nothing_marked_writes_nothing() {
    let host = mac_host();
    host.write_layout_test_file("TestExpectations", "");

    let changes = rebaseline_expectations::execute(&host, RebaselineOptions::default(), None)
        .await
        .unwrap();

    assert!(changes.is_empty());
    assert!(host.executive.calls().is_empty());
    assert!(host.filesystem.written_files().is_empty());
}

#[test]
fn tests_to_rebaseline_lists_all_suffixes() {
    let host = mac_host();
    host.write_layout_test_file("userscripts/another-test.html", "Dummy test contents");
    host.write_layout_test_file("TestExpectations", "Bug(x) userscripts/another-test.html [ Rebaseline ]\n");

    let list = rebaseline_expectations::tests_to_rebaseline(&host, Some("test-mac-mac10.11")).unwrap();

    assert_eq!(list.len(), 1);
    assert_eq!(
        list["userscripts/another-test.html"]["MOCK Mac10.11"],
        argv(&["txt", "png", "wav"])
    );
}

#[tokio::test]
async fn test_passing_everywhere_only_updates_expectations() {
    let host = mac_host();
    host.executive.line_removing();
    let passing = r#"ADD_RESULTS({
    "tests": {
        "fast": {
            "dom": {
                "prototype-taco.html": {"expected": "FAIL", "actual": "PASS", "is_unexpected": true}
            }
        }
    }
});"#;
    for builder in ["MOCK Mac10.10", "MOCK Mac10.11"] {
        host.results.set_results(builder, passing).unwrap();
    }
    host.write_layout_test_file("TestExpectations", "\nBug(foo) fast/dom/prototype-taco.html [ Rebaseline ]\n");
    host.write_layout_test_file("fast/dom/prototype-taco.html", "Dummy test contents");

    rebaseline_expectations::execute(&host, RebaselineOptions::default(), None)
        .await
        .unwrap();

    assert!(host.executive.calls().is_empty());
    assert_eq!(
        host.read_layout_test_file("TestExpectations").unwrap(),
        "\nBug(foo) [ Linux Win ] fast/dom/prototype-taco.html [ Rebaseline ]\n"
    );
}
