//! End-to-end `auto-rebaseline` runs against the fake host.

use std::path::PathBuf;

use rebaseline_core::commands::auto_rebaseline::{
    AutoRebaseline, AutoRebaselineOptions, AUTO_REBASELINE_ALT_BRANCH_NAME, AUTO_REBASELINE_BRANCH_NAME,
};
use rebaseline_core::commands::parallel::RebaselineOptions;
use rebaseline_core::config::DEFAULT_TREE_STATUS_URL;
use rebaseline_core::fakes::{mock_host, ExecutiveCall, FakeHost};
use rebaseline_core::{BuilderInfo, BuilderRegistry};

const TACO: &str = "fast/dom/prototype-taco.html";
const STRAWBERRY: &str = "fast/dom/prototype-strawberry.html";
const CHOCOLATE: &str = "fast/dom/prototype-chocolate.html";

const TACO_BLAME: &str = "
6469e754a1 path/to/TestExpectations                   (<foobarbaz1@chromium.org> 2013-04-28 04:52:41 +0000   13) Bug(foo) fast/dom/prototype-taco.html [ NeedsRebaseline ]
";

const TACO_PASSES: &str = r#"ADD_RESULTS({
    "tests": {
        "fast": {
            "dom": {
                "prototype-taco.html": {
                    "expected": "FAIL",
                    "actual": "PASS",
                    "is_unexpected": true
                }
            }
        }
    },
    "chromium_revision": "9000"
});"#;

const TACO_FAILS_TEXT: &str = r#"ADD_RESULTS({
    "tests": {
        "fast": {
            "dom": {
                "prototype-taco.html": {
                    "expected": "PASS",
                    "actual": "PASS TEXT",
                    "is_unexpected": true
                }
            }
        }
    },
    "chromium_revision": "9000"
});"#;

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

fn optimize(suffixes: &str, test: &str) -> Vec<String> {
    argv(&[
        "/mock-checkout/blink-rebaseline",
        "optimize-baselines",
        "--no-modify-scm",
        "--suffixes",
        suffixes,
        test,
    ])
}

fn options() -> AutoRebaselineOptions {
    AutoRebaselineOptions {
        rebaseline: RebaselineOptions {
            optimize: true,
            verbose: false,
            results_directory: None,
        },
        dry_run: false,
        auth_refresh_token_json: None,
    }
}

fn land_calls(branch: &str) -> Vec<ExecutiveCall> {
    vec![
        ExecutiveCall::single(&["git", "cl", "upload", "-f"]),
        ExecutiveCall::single(&["git", "pull"]),
        ExecutiveCall::single(&["git", "cl", "land", "-f", "-v"]),
        ExecutiveCall::Single(argv(&["git", "config", &format!("branch.{branch}.rietveldissue")])),
    ]
}

fn host_with_builders(builders: &[(&str, &str)]) -> FakeHost {
    let mut host = mock_host();
    host.builders = BuilderRegistry::from_entries(
        builders
            .iter()
            .map(|(name, port)| (name.to_string(), BuilderInfo::new(port, &["mock-specifier"]))),
    );
    host.executive.line_removing();
    host.web.set_response(DEFAULT_TREE_STATUS_URL, Some("open"));
    host
}

/// Taco marked `NeedsRebaseline` everywhere and passing on both Mac bots.
fn taco_host() -> FakeHost {
    let host = host_with_builders(&[
        ("MOCK Mac10.10", "test-mac-mac10.10"),
        ("MOCK Mac10.11", "test-mac-mac10.11"),
    ]);
    host.scm.set_blame(TACO_BLAME);
    for builder in ["MOCK Mac10.10", "MOCK Mac10.11"] {
        host.results.set_results(builder, TACO_PASSES).unwrap();
    }
    host.write_layout_test_file("TestExpectations", "\nBug(foo) fast/dom/prototype-taco.html [ NeedsRebaseline ]\n");
    host.write_layout_test_file(TACO, "Dummy test contents");
    host
}

#[tokio::test]
async fn execute_rebaselines_and_lands() {
    let host = host_with_builders(&[
        ("MOCK Mac10.10", "test-mac-mac10.10"),
        ("MOCK Mac10.11", "test-mac-mac10.11"),
    ]);
    host.scm.set_blame(
        "
6469e754a1 path/to/TestExpectations                   (<foobarbaz1@chromium.org> 2013-06-14 20:18:46 +0000   11) # Test NeedsRebaseline being in a comment doesn't bork parsing.
6469e754a1 path/to/TestExpectations                   (<foobarbaz1@chromium.org> 2013-06-14 20:18:46 +0000   11) crbug.com/24182 [ Debug ] path/to/norebaseline.html [ Failure ]
6469e754a1 path/to/TestExpectations                   (<foobarbaz1@chromium.org> 2013-04-28 04:52:41 +0000   13) Bug(foo) fast/dom/prototype-taco.html [ NeedsRebaseline ]
6469e754a1 path/to/TestExpectations                   (<foobarbaz1@chromium.org> 2013-06-14 20:18:46 +0000   11) crbug.com/24182 [ Mac10.11 ] fast/dom/prototype-strawberry.html [ NeedsRebaseline ]
6469e754a1 path/to/TestExpectations                   (<foobarbaz1@chromium.org> 2013-04-28 04:52:41 +0000   12) crbug.com/24182 fast/dom/prototype-chocolate.html [ NeedsRebaseline ]
624caaaaaa path/to/TestExpectations                   (<foo@chromium.org>        2013-04-28 04:52:41 +0000   12) crbug.com/24182 path/to/not-cycled-through-bots.html [ NeedsRebaseline ]
0000000000 path/to/TestExpectations                   (<foo@chromium.org>        2013-04-28 04:52:41 +0000   12) crbug.com/24182 path/to/locally-changed-lined.html [ NeedsRebaseline ]
",
    );
    host.results
        .set_results(
            "MOCK Mac10.10",
            r#"ADD_RESULTS({
    "tests": {
        "fast": {
            "dom": {
                "prototype-taco.html": {"expected": "PASS", "actual": "PASS TEXT", "is_unexpected": true},
                "prototype-chocolate.html": {"expected": "FAIL", "actual": "IMAGE+TEXT"}
            }
        }
    },
    "chromium_revision": "9000"
});"#,
        )
        .unwrap();
    host.results
        .set_results(
            "MOCK Mac10.11",
            r#"ADD_RESULTS({
    "tests": {
        "fast": {
            "dom": {
                "prototype-taco.html": {"expected": "PASS", "actual": "PASS TEXT", "is_unexpected": true},
                "prototype-chocolate.html": {"expected": "FAIL", "actual": "PASS"},
                "prototype-strawberry.html": {"expected": "PASS", "actual": "IMAGE PASS", "is_unexpected": true}
            }
        }
    },
    "chromium_revision": "9000"
});"#,
        )
        .unwrap();
    host.write_layout_test_file(
        "TestExpectations",
        "
crbug.com/24182 [ Debug ] path/to/norebaseline.html [ Rebaseline ]
Bug(foo) fast/dom/prototype-taco.html [ NeedsRebaseline ]
crbug.com/24182 [ Mac10.11 ] fast/dom/prototype-strawberry.html [ NeedsRebaseline ]
crbug.com/24182 fast/dom/prototype-chocolate.html [ NeedsRebaseline ]
crbug.com/24182 path/to/not-cycled-through-bots.html [ NeedsRebaseline ]
crbug.com/24182 path/to/locally-changed-lined.html [ NeedsRebaseline ]
",
    );
    for test in [TACO, STRAWBERRY, CHOCOLATE] {
        host.write_layout_test_file(test, "Dummy test contents");
    }

    host.web.set_response(DEFAULT_TREE_STATUS_URL, Some("closed"));
    AutoRebaseline::new(&host, options()).execute().await.unwrap();
    assert!(host.executive.calls().is_empty());

    host.web.set_response(DEFAULT_TREE_STATUS_URL, Some("open"));
    AutoRebaseline::new(&host, options()).execute().await.unwrap();

    let copy = "copy-existing-baselines-internal";
    let rebaseline = "rebaseline-test-internal";
    let mut expected = vec![
        ExecutiveCall::Parallel(vec![
            internal(copy, "txt,png", "MOCK Mac10.10", CHOCOLATE),
            internal(copy, "png", "MOCK Mac10.11", STRAWBERRY),
            internal(copy, "txt", "MOCK Mac10.10", TACO),
            internal(copy, "txt", "MOCK Mac10.11", TACO),
        ]),
        ExecutiveCall::Parallel(vec![
            internal(rebaseline, "txt,png", "MOCK Mac10.10", CHOCOLATE),
            internal(rebaseline, "png", "MOCK Mac10.11", STRAWBERRY),
            internal(rebaseline, "txt", "MOCK Mac10.10", TACO),
            internal(rebaseline, "txt", "MOCK Mac10.11", TACO),
        ]),
        ExecutiveCall::Parallel(vec![
            optimize("txt,png", CHOCOLATE),
            optimize("png", STRAWBERRY),
            optimize("txt", TACO),
        ]),
    ];
    expected.extend(land_calls(AUTO_REBASELINE_BRANCH_NAME));
    assert_eq!(host.executive.calls(), expected);

    assert_eq!(
        host.read_layout_test_file("TestExpectations").unwrap(),
        "
crbug.com/24182 [ Debug ] path/to/norebaseline.html [ Rebaseline ]
Bug(foo) [ Linux Win ] fast/dom/prototype-taco.html [ NeedsRebaseline ]
crbug.com/24182 [ Linux Win ] fast/dom/prototype-chocolate.html [ NeedsRebaseline ]
crbug.com/24182 path/to/not-cycled-through-bots.html [ NeedsRebaseline ]
crbug.com/24182 path/to/locally-changed-lined.html [ NeedsRebaseline ]
"
    );

    let commits = host.scm.local_commits();
    assert_eq!(commits.len(), 1);
    assert!(commits[0].starts_with("Auto-rebaseline for r1234"));
    assert!(host
        .scm
        .operations()
        .contains(&format!("delete_branch {AUTO_REBASELINE_BRANCH_NAME}")));
}

#[tokio::test]
async fn hung_upload_stops_landing() {
    let host = host_with_builders(&[("MOCK Mac10.11", "test-mac-mac10.11")]);
    host.executive.hang_on("git cl upload");
    host.scm.set_blame(TACO_BLAME);
    host.results.set_results("MOCK Mac10.11", TACO_FAILS_TEXT).unwrap();
    host.write_layout_test_file("TestExpectations", "\nBug(foo) fast/dom/prototype-taco.html [ NeedsRebaseline ]\n");
    host.write_layout_test_file(TACO, "Dummy test contents");

    AutoRebaseline::new(&host, options())
        .with_time_limit(std::time::Duration::ZERO)
        .execute()
        .await
        .unwrap();

    assert_eq!(
        host.executive.calls(),
        vec![
            ExecutiveCall::Parallel(vec![internal(
                "copy-existing-baselines-internal",
                "txt",
                "MOCK Mac10.11",
                TACO
            )]),
            ExecutiveCall::Parallel(vec![internal("rebaseline-test-internal", "txt", "MOCK Mac10.11", TACO)]),
            ExecutiveCall::Parallel(vec![optimize("txt", TACO)]),
            ExecutiveCall::single(&["git", "cl", "upload", "-f"]),
        ]
    );
}

#[tokio::test]
async fn test_passing_everywhere_only_updates_expectations() {
    let host = taco_host();

    AutoRebaseline::new(&host, options()).execute().await.unwrap();

    assert_eq!(host.executive.calls(), land_calls(AUTO_REBASELINE_BRANCH_NAME));
    assert_eq!(
        host.read_layout_test_file("TestExpectations").unwrap(),
        "\nBug(foo) [ Linux Win ] fast/dom/prototype-taco.html [ NeedsRebaseline ]\n"
    );
}

async fn run_on_win_from_branch(current_branch: &str) -> FakeHost {
    let host = host_with_builders(&[("MOCK Win", "test-win-win7")]);
    host.scm.set_blame(TACO_BLAME);
    host.scm.set_current_branch(current_branch);
    host.results.set_results("MOCK Win", TACO_PASSES).unwrap();
    host.write_layout_test_file("TestExpectations", "\nBug(foo) fast/dom/prototype-taco.html [ NeedsRebaseline ]\n");
    host.write_layout_test_file(TACO, "Dummy test contents");

    AutoRebaseline::new(&host, options()).execute().await.unwrap();

    assert_eq!(
        host.read_layout_test_file("TestExpectations").unwrap(),
        "\nBug(foo) [ Linux Mac Win10 ] fast/dom/prototype-taco.html [ NeedsRebaseline ]\n"
    );
    host
}

#[tokio::test]
async fn uses_alternate_branch_when_on_temporary_branch() {
    let host = run_on_win_from_branch(AUTO_REBASELINE_BRANCH_NAME).await;

    assert_eq!(host.executive.calls(), land_calls(AUTO_REBASELINE_ALT_BRANCH_NAME));
    assert!(host
        .scm
        .operations()
        .contains(&format!("checkout {AUTO_REBASELINE_BRANCH_NAME}")));
}

#[tokio::test]
async fn stuck_on_alternate_branch_uses_main_branch() {
    let host = run_on_win_from_branch(AUTO_REBASELINE_ALT_BRANCH_NAME).await;

    assert_eq!(host.executive.calls(), land_calls(AUTO_REBASELINE_BRANCH_NAME));
}

#[tokio::test]
async fn auth_refresh_token_is_passed_to_git_cl() {
    let token = "/creds/refresh_tokens/test_rietveld_token";
    let host = taco_host();
    let mut options = options();
    options.auth_refresh_token_json = Some(PathBuf::from(token));

    AutoRebaseline::new(&host, options).execute().await.unwrap();

    assert_eq!(
        host.executive.calls(),
        vec![
            ExecutiveCall::single(&["git", "cl", "upload", "-f", "--auth-refresh-token-json", token]),
            ExecutiveCall::single(&["git", "pull"]),
            ExecutiveCall::single(&["git", "cl", "land", "-f", "-v", "--auth-refresh-token-json", token]),
            ExecutiveCall::Single(argv(&[
                "git",
                "config",
                &format!("branch.{AUTO_REBASELINE_BRANCH_NAME}.rietveldissue")
            ])),
        ]
    );
}

#[tokio::test]
async fn dry_run_neither_commits_nor_lands() {
    let host = taco_host();
    let mut options = options();
    options.dry_run = true;

    AutoRebaseline::new(&host, options).execute().await.unwrap();

    assert!(host.executive.calls().is_empty());
    assert!(host.scm.local_commits().is_empty());
    assert!(host.scm.operations().is_empty());
    assert_eq!(
        host.read_layout_test_file("TestExpectations").unwrap(),
        "\nBug(foo) [ Linux Win ] fast/dom/prototype-taco.html [ NeedsRebaseline ]\n"
    );
}

#[tokio::test]
async fn dirty_working_directory_aborts() {
    let host = taco_host();
    host.scm.set_working_directory_changes(true);

    AutoRebaseline::new(&host, options()).execute().await.unwrap();

    assert!(host.executive.calls().is_empty());
    assert!(host.filesystem.written_files().is_empty());
}

#[tokio::test]
async fn interrupted_run_aborts() {
    let host = taco_host();
    host.results
        .set_results(
            "MOCK Mac10.11",
            r#"{"tests": {}, "interrupted": true, "chromium_revision": "9000"}"#,
        )
        .unwrap();

    AutoRebaseline::new(&host, options()).execute().await.unwrap();

    assert!(host.executive.calls().is_empty());
    assert!(host.filesystem.written_files().is_empty());
}
