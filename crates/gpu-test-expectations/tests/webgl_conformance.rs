//! The built-in WebGL conformance list against a scratch copy of the suite.

use std::path::Path;

use gpu_test_expectations::webgl::EXTENSION_PREFIX;
use gpu_test_expectations::{
    AngleBackend, BrowserType, BuildType, Expectation, GpuConfig, GpuExpectationError, Os, Vendor,
    WebGlConformanceExpectations, WEBGL_CONFORMANCE_EXPECTATIONS,
};
use tempfile::TempDir;

/// A directory holding an empty file for every test the list names.
fn fake_suite() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for entry in WEBGL_CONFORMANCE_EXPECTATIONS {
        if entry.pattern.contains('*') || entry.pattern.contains(EXTENSION_PREFIX) {
            continue;
        }
        touch(&dir.path().join(entry.pattern));
    }
    dir
}

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, "").unwrap();
}

fn load() -> (TempDir, WebGlConformanceExpectations) {
    let suite = fake_suite();
    let expectations = WebGlConformanceExpectations::new(suite.path()).unwrap();
    (suite, expectations)
}

#[test]
fn builtin_list_loads_against_complete_suite() {
    let (_suite, expectations) = load();
    assert_eq!(expectations.len(), WEBGL_CONFORMANCE_EXPECTATIONS.len());
}

#[test]
fn missing_test_file_fails_loading() {
    let suite = fake_suite();
    let victim = suite.path().join("conformance/rendering/point-size.html");
    std::fs::remove_file(&victim).unwrap();

    let err = WebGlConformanceExpectations::new(suite.path()).unwrap_err();
    assert!(matches!(err, GpuExpectationError::MissingTest(p) if p == victim));
}

#[test]
fn windows_amd_radeon_is_flaky_except_where_failing() {
    let (_suite, expectations) = load();
    let config = GpuConfig::new(Os::Win7)
        .with_gpu(Vendor::Amd, 0x6779)
        .with_angle(AngleBackend::D3d9);

    assert_eq!(
        expectations.expectation_for("conformance/rendering/point-size.html", &config),
        Expectation::Flaky { max_retries: 2 }
    );
    assert_eq!(
        expectations.expectation_for("conformance/rendering/more-than-65536-indices.html", &config),
        Expectation::Fail
    );
    assert_eq!(
        expectations.expectation_for("conformance/extensions/oes-texture-float-with-canvas.html", &config),
        Expectation::Skip
    );
}

#[test]
fn linux_intel_debug_skips_uniform_arrays() {
    let (_suite, expectations) = load();
    let release = GpuConfig::new(Os::Linux).with_gpu(Vendor::Intel, 0x412);
    let test = "conformance/uniforms/gl-uniform-arrays.html";

    assert_eq!(expectations.expectation_for(test, &release), Expectation::Pass);
    assert_eq!(
        expectations.expectation_for(test, &release.clone().with_build(BuildType::Debug)),
        Expectation::Skip
    );
}

#[test]
fn webview_crashes_are_skipped_only_in_webview() {
    let (_suite, expectations) = load();
    let test = "conformance/textures/misc/texture-npot-video.html";
    let android = GpuConfig::new(Os::Android);

    assert_eq!(expectations.expectation_for(test, &android), Expectation::Pass);
    assert_eq!(
        expectations.expectation_for(
            test,
            &android.with_browser(BrowserType::AndroidWebviewShell)
        ),
        Expectation::Skip
    );
}

#[test]
fn extension_availability_on_mac() {
    let (_suite, expectations) = load();
    let mac = GpuConfig::new(Os::ElCapitan);

    assert_eq!(
        expectations.expectation_for("WebglExtension.EXT_color_buffer_float", &mac),
        Expectation::Fail
    );
    assert_eq!(
        expectations.expectation_for("WebglExtension.OES_texture_float", &mac),
        Expectation::Pass
    );
    assert_eq!(
        expectations.max_retries_for("WebglExtension.EXT_color_buffer_float", &mac),
        0
    );
}
