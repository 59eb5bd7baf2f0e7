//! The WebGL conformance expectations.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{GpuExpectationError, Result};
use crate::expectations::{GpuTestExpectations, DEFAULT_FLAKY_RETRIES};

/// Kind of a built-in entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Fail,
    Flaky,
    Skip,
}

/// One entry of [`WEBGL_CONFORMANCE_EXPECTATIONS`].
#[derive(Debug, Clone, Copy)]
pub struct BuiltinExpectation {
    pub kind: EntryKind,
    pub pattern: &'static str,
    pub conditions: &'static [&'static str],
    pub bug: Option<u32>,
}

const fn fail(pattern: &'static str, conditions: &'static [&'static str], bug: Option<u32>) -> BuiltinExpectation {
    BuiltinExpectation { kind: EntryKind::Fail, pattern, conditions, bug }
}

const fn flaky(pattern: &'static str, conditions: &'static [&'static str], bug: Option<u32>) -> BuiltinExpectation {
    BuiltinExpectation { kind: EntryKind::Flaky, pattern, conditions, bug }
}

const fn skip(pattern: &'static str, conditions: &'static [&'static str], bug: Option<u32>) -> BuiltinExpectation {
    BuiltinExpectation { kind: EntryKind::Skip, pattern, conditions, bug }
}

/// Prefix of tests checking extension availability rather than files in
/// the suite.
pub const EXTENSION_PREFIX: &str = "WebglExtension.";

/// Expectations for the WebGL conformance suite, in priority order.
#[rustfmt::skip]
pub const WEBGL_CONFORMANCE_EXPECTATIONS: &[BuiltinExpectation] = &[
    fail("WebglExtension.EXT_color_buffer_float", &["win", "mac"], None),
    fail("WebglExtension.WEBGL_compressed_texture_astc", &["win", "mac", "linux"], None),
    fail("WebglExtension.WEBGL_compressed_texture_atc", &["win", "mac", "linux"], None),
    fail("WebglExtension.WEBGL_compressed_texture_etc1", &["mac", "linux"], None),
    fail("WebglExtension.WEBGL_compressed_texture_pvrtc", &["win", "mac", "linux"], None),
    fail("WebglExtension.EXT_disjoint_timer_query", &["win", "d3d9"], None),
    fail("WebglExtension.EXT_sRGB", &["win", "d3d9"], None),
    fail("WebglExtension.WEBGL_compressed_texture_etc1", &["win", "d3d9"], None),
    fail("WebglExtension.WEBGL_depth_texture", &["win", "amd", "d3d9"], None),
    fail("WebglExtension.WEBGL_draw_buffers", &["win", "d3d9"], None),
    fail("WebglExtension.EXT_disjoint_timer_query", &["android"], None),
    fail("WebglExtension.EXT_frag_depth", &["android"], None),
    fail("WebglExtension.EXT_shader_texture_lod", &["android"], None),
    fail("WebglExtension.WEBGL_compressed_texture_astc", &["android"], None),
    fail("WebglExtension.WEBGL_compressed_texture_pvrtc", &["android"], None),
    fail("WebglExtension.WEBGL_compressed_texture_s3tc", &["android"], None),
    fail("WebglExtension.WEBGL_depth_texture", &["android"], None),
    fail("WebglExtension.WEBGL_draw_buffers", &["android"], None),
    fail("WebglExtension.OES_texture_float_linear", &["android", "qualcomm:Adreno (TM) 330"], None),
    fail(
        "conformance/extensions/oes-texture-float-with-image-data.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(609883),
    ),
    fail(
        "conformance/extensions/oes-texture-float-with-image.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(609883),
    ),
    fail(
        "conformance/extensions/oes-texture-half-float-with-canvas.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(609883),
    ),
    fail(
        "conformance/extensions/oes-texture-half-float-with-image-data.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(609883),
    ),
    fail(
        "conformance/extensions/oes-texture-half-float-with-image.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(609883),
    ),
    fail(
        "conformance/extensions/oes-texture-half-float-with-video.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(609883),
    ),
    fail(
        "conformance/extensions/webgl-compressed-texture-atc.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(609883),
    ),
    fail(
        "conformance/glsl/bugs/sampler-struct-function-arg.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(609883),
    ),
    skip(
        "conformance/glsl/misc/shader-with-non-reserved-words.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(609883),
    ),
    fail("WebglExtension.EXT_sRGB", &["android", "qualcomm:Adreno (TM) 418"], Some(610951)),
    fail(
        "conformance/textures/misc/tex-image-and-sub-image-2d-with-array-buffer-view.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail("conformance/textures/canvas/*", &["android", "qualcomm:Adreno (TM) 418"], Some(610951)),
    fail(
        "conformance/textures/image/tex-2d-rgb-rgb-unsigned_short_5_6_5.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/image/tex-2d-rgba-rgba-unsigned_byte.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/image/tex-2d-rgba-rgba-unsigned_short_4_4_4_4.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/image/tex-2d-rgba-rgba-unsigned_short_5_5_5_1.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/image_data/tex-2d-rgb-rgb-unsigned_byte.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/image_data/tex-2d-rgb-rgb-unsigned_short_5_6_5.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/image_data/tex-2d-rgba-rgba-unsigned_byte.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/image_data/tex-2d-rgba-rgba-unsigned_short_4_4_4_4.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/image_data/tex-2d-rgba-rgba-unsigned_short_5_5_5_1.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/svg_image/tex-2d-rgb-rgb-unsigned_byte.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/svg_image/tex-2d-rgb-rgb-unsigned_short_5_6_5.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/svg_image/tex-2d-rgba-rgba-unsigned_byte.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/svg_image/tex-2d-rgba-rgba-unsigned_short_4_4_4_4.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/svg_image/tex-2d-rgba-rgba-unsigned_short_5_5_5_1.html",
        &["android", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail(
        "conformance/textures/video/tex-2d-rgb-rgb-unsigned_byte.html",
        &["android", "android-content-shell", "qualcomm:Adreno (TM) 418"],
        Some(610951),
    ),
    fail("WebglExtension.EXT_sRGB", &["android", "qualcomm:Adreno (TM) 420"], None),
    fail("WebglExtension.WEBGL_compressed_texture_atc", &["android", "nvidia:NVIDIA Tegra"], None),
    fail("deqp/data/gles2/shaders/functions.html", &[], Some(478572)),
    fail("conformance/extensions/ext-sRGB.html", &[], Some(540900)),
    fail("conformance/textures/misc/tex-sub-image-2d-bad-args.html", &[], Some(570453)),
    fail(
        "conformance/attribs/gl-disabled-vertex-attrib.html",
        &["win", "linux", "nvidia", "opengl"],
        Some(1007),
    ),
    fail("conformance/extensions/oes-texture-half-float.html", &["win"], Some(607283)),
    fail(
        "conformance/glsl/bugs/pow-of-small-constant-in-user-defined-function.html",
        &["win"],
        Some(485641),
    ),
    fail("conformance/glsl/constructors/glsl-construct-vec-mat-index.html", &["win"], Some(525188)),
    flaky("deqp/data/gles2/shaders/constants.html", &["win"], Some(594922)),
    fail(
        "conformance/textures/misc/copy-tex-image-and-sub-image-2d.html",
        &["win7", "intel"],
        None,
    ),
    flaky("conformance/*", &["win", "amd:0x6779"], Some(491419)),
    fail(
        "conformance/extensions/angle-instanced-arrays.html",
        &["win", "amd", "d3d9"],
        Some(475095),
    ),
    fail(
        "conformance/rendering/more-than-65536-indices.html",
        &["win", "amd", "d3d9"],
        Some(475095),
    ),
    skip("conformance/extensions/oes-texture-float-with-canvas.html", &["win", "d3d9"], Some(896)),
    skip(
        "conformance/extensions/oes-texture-half-float-with-canvas.html",
        &["win", "d3d9"],
        Some(896),
    ),
    fail(
        "conformance/glsl/bugs/floor-div-cos-should-not-truncate.html",
        &["win", "d3d9"],
        Some(1179),
    ),
    flaky("conformance/glsl/functions/*", &["win", "d3d9"], Some(415609)),
    fail("conformance/ogles/GL/cos/cos_001_to_006.html", &["win", "intel", "d3d9"], Some(540538)),
    flaky("conformance/*", &["win", "nvidia", "opengl"], Some(582083)),
    skip("conformance/glsl/misc/shader-struct-scope.html", &["win", "amd", "opengl"], Some(1007)),
    skip(
        "conformance/glsl/misc/shaders-with-invariance.html",
        &["win", "amd", "opengl"],
        Some(1007),
    ),
    fail(
        "conformance/glsl/misc/struct-nesting-of-variable-names.html",
        &["win", "amd", "opengl"],
        Some(1007),
    ),
    fail("deqp/data/gles2/shaders/preprocessor.html", &["win", "amd", "opengl"], Some(478572)),
    fail("conformance/extensions/webgl-draw-buffers.html", &["win", "intel", "opengl"], Some(1007)),
    fail(
        "conformance/glsl/functions/glsl-function-normalize.html",
        &["win", "intel", "opengl"],
        Some(1007),
    ),
    fail("conformance/glsl/misc/shader-struct-scope.html", &["win", "intel", "opengl"], Some(1007)),
    fail(
        "conformance/uniforms/uniform-default-values.html",
        &["win", "intel", "opengl"],
        Some(1007),
    ),
    fail("conformance/glsl/misc/shaders-with-invariance.html", &["mac"], Some(421710)),
    fail("deqp/data/gles2/shaders/preprocessor.html", &["mac"], Some(478572)),
    fail("deqp/data/gles2/shaders/scoping.html", &["mac"], Some(478572)),
    fail(
        "conformance/glsl/bugs/array-of-struct-with-int-first-position.html",
        &["mac", "nvidia:0xfd5", "nvidia:0xfe9"],
        Some(368912),
    ),
    fail(
        "conformance/extensions/webgl-draw-buffers.html",
        &["mavericks", "nvidia:0xfe9"],
        Some(586536),
    ),
    flaky(
        "conformance/extensions/oes-texture-float-with-video.html",
        &["mac", "amd:0x6821"],
        Some(599272),
    ),
    fail("conformance/extensions/oes-texture-half-float.html", &["linux", "opengl"], Some(607283)),
    fail("conformance/extensions/angle-instanced-arrays.html", &["linux", "nvidia"], Some(544989)),
    flaky("conformance/extensions/oes-element-index-uint.html", &["linux", "nvidia"], Some(524144)),
    flaky(
        "conformance/textures/image/tex-2d-rgb-rgb-unsigned_byte.html",
        &["linux", "nvidia"],
        Some(596622),
    ),
    flaky("conformance/more/functions/uniformi.html", &["linux", "amd"], Some(550989)),
    fail("deqp/data/gles2/shaders/preprocessor.html", &["linux", "amd"], Some(478572)),
    fail(
        "conformance/extensions/angle-instanced-arrays.html",
        &["linux", "amd:0x6779"],
        Some(479260),
    ),
    flaky(
        "conformance/extensions/ext-texture-filter-anisotropic.html",
        &["linux", "amd:0x6779"],
        Some(436212),
    ),
    flaky("conformance/glsl/misc/shader-struct-scope.html", &["linux", "amd:0x6779"], Some(436212)),
    flaky(
        "conformance/glsl/misc/struct-nesting-of-variable-names.html",
        &["linux", "amd:0x6779"],
        Some(436212),
    ),
    flaky("conformance/rendering/point-size.html", &["linux", "amd:0x6779"], Some(436212)),
    flaky(
        "conformance/textures/misc/texture-sub-image-cube-maps.html",
        &["linux", "amd:0x6779"],
        Some(436212),
    ),
    flaky("conformance/more/functions/uniformf.html", &["linux", "amd:0x6779"], Some(436212)),
    fail(
        "conformance/glsl/misc/shaders-with-invariance.html",
        &["linux", "amd:0x6779"],
        Some(479952),
    ),
    flaky("conformance/textures/misc/texture-mips.html", &["linux", "amd:0x6779"], Some(479981)),
    flaky(
        "conformance/textures/misc/texture-size-cube-maps.html",
        &["linux", "amd:0x6779"],
        Some(479983),
    ),
    flaky(
        "conformance/uniforms/uniform-default-values.html",
        &["linux", "amd:0x6779"],
        Some(482013),
    ),
    flaky(
        "conformance/glsl/samplers/glsl-function-texture2dlod.html",
        &["linux", "amd:0x6779"],
        Some(436212),
    ),
    flaky(
        "conformance/glsl/samplers/glsl-function-texture2dprojlod.html",
        &["linux", "amd:0x6779"],
        Some(436212),
    ),
    skip(
        "conformance/glsl/bugs/temp-expressions-should-not-crash.html",
        &["linux", "intel"],
        Some(540543),
    ),
    fail(
        "conformance/glsl/bugs/qualcomm-loop-with-continue-crash.html",
        &["linux", "intel"],
        Some(540543),
    ),
    fail("conformance/glsl/misc/empty_main.vert.html", &["linux", "intel"], Some(540543)),
    fail("conformance/glsl/misc/gl_position_unset.vert.html", &["linux", "intel"], Some(540543)),
    fail("conformance/glsl/misc/shaders-with-invariance.html", &["linux", "intel"], Some(540543)),
    fail("conformance/glsl/misc/shaders-with-varyings.html", &["linux", "intel"], Some(540543)),
    fail(
        "conformance/extensions/ext-disjoint-timer-query.html",
        &["linux", "intel", "opengl"],
        Some(1312),
    ),
    fail("deqp/data/gles2/shaders/linkage.html", &["linux", "intel"], Some(540543)),
    fail("deqp/data/gles2/shaders/preprocessor.html", &["linux", "intel"], Some(1312)),
    fail("deqp/data/gles2/shaders/scoping.html", &["linux", "intel"], Some(610800)),
    fail(
        "conformance/glsl/bugs/sampler-array-using-loop-index.html",
        &["linux", "intel", "opengl"],
        Some(598924),
    ),
    skip(
        "conformance/uniforms/gl-uniform-arrays.html",
        &["linux", "debug", "intel:0x412"],
        Some(604140),
    ),
    fail(
        "conformance/extensions/webgl-draw-buffers.html",
        &["linux", "intel:0x412", "opengl"],
        Some(586536),
    ),
    fail("deqp/data/gles2/shaders/constants.html", &["android"], Some(478572)),
    fail("deqp/data/gles2/shaders/conversions.html", &["android"], Some(478572)),
    fail("deqp/data/gles2/shaders/declarations.html", &["android"], Some(478572)),
    fail("deqp/data/gles2/shaders/linkage.html", &["android"], Some(478572)),
    fail(
        "conformance/textures/image/tex-2d-rgb-rgb-unsigned_byte.html",
        &["android"],
        Some(586183),
    ),
    skip("conformance/textures/image_bitmap_from_video/*", &["android"], Some(585108)),
    skip(
        "conformance/textures/video/tex-2d-rgb-rgb-unsigned_byte.html",
        &["android", "android-webview-shell"],
        Some(352645),
    ),
    skip(
        "conformance/textures/video/tex-2d-rgb-rgb-unsigned_short_5_6_5.html",
        &["android", "android-webview-shell"],
        Some(352645),
    ),
    skip(
        "conformance/textures/video/tex-2d-rgba-rgba-unsigned_byte.html",
        &["android", "android-webview-shell"],
        Some(352645),
    ),
    skip(
        "conformance/textures/video/tex-2d-rgba-rgba-unsigned_short_4_4_4_4.html",
        &["android", "android-webview-shell"],
        Some(352645),
    ),
    skip(
        "conformance/textures/video/tex-2d-rgba-rgba-unsigned_short_5_5_5_1.html",
        &["android", "android-webview-shell"],
        Some(352645),
    ),
    skip(
        "conformance/textures/misc/texture-npot-video.html",
        &["android", "android-webview-shell"],
        Some(352645),
    ),
    fail(
        "conformance/extensions/oes-texture-float-with-canvas.html",
        &["android", "qualcomm"],
        Some(499555),
    ),
    skip(
        "conformance/extensions/oes-texture-float-with-video.html",
        &["android", "qualcomm"],
        Some(499555),
    ),
    fail(
        "conformance/glsl/bugs/struct-constructor-highp-bug.html",
        &["android", "qualcomm:Adreno (TM) 330"],
        Some(559342),
    ),
    fail(
        "conformance/glsl/bugs/qualcomm-loop-with-continue-crash.html",
        &["android", "qualcomm:Adreno (TM) 330"],
        Some(527761),
    ),
    fail(
        "conformance/glsl/bugs/sketchfab-lighting-shader-crash.html",
        &["android", "qualcomm:Adreno (TM) 330"],
        Some(551937),
    ),
    fail(
        "conformance/context/context-attributes-alpha-depth-stencil-antialias.html",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    fail(
        "conformance/context/premultiplyalpha-test.html",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    fail(
        "conformance/extensions/oes-texture-float-with-image-data.html",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    fail(
        "conformance/extensions/oes-texture-float-with-image.html",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    fail(
        "conformance/textures/image_bitmap_from_blob/*",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(585108),
    ),
    fail(
        "conformance/textures/image_bitmap_from_canvas/*",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(585108),
    ),
    fail(
        "conformance/textures/image_bitmap_from_image/*",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(585108),
    ),
    fail(
        "conformance/textures/image_bitmap_from_image_data/*",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(585108),
    ),
    fail(
        "conformance/textures/image_bitmap_from_image_bitmap/*",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(598262),
    ),
    fail(
        "conformance/textures/video/tex-2d-rgb-rgb-unsigned_byte.html",
        &["android", "android-content-shell", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    fail(
        "conformance/textures/video/tex-2d-rgba-rgba-unsigned_byte.html",
        &["android", "android-content-shell", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    fail(
        "conformance/textures/video/tex-2d-rgb-rgb-unsigned_short_5_6_5.html",
        &["android", "android-content-shell", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    fail(
        "conformance/textures/video/tex-2d-rgba-rgba-unsigned_short_4_4_4_4.html",
        &["android", "android-content-shell", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    fail(
        "conformance/textures/video/tex-2d-rgba-rgba-unsigned_short_5_5_5_1.html",
        &["android", "android-content-shell", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    skip(
        "conformance/more/functions/bindBufferBadArgs.html",
        &["android", "android-webview-shell", "qualcomm:Adreno (TM) 420"],
        Some(499874),
    ),
    fail(
        "conformance/rendering/gl-scissor-test.html",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    fail(
        "conformance/textures/misc/copy-tex-image-and-sub-image-2d.html",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    fail(
        "conformance/textures/misc/tex-image-and-sub-image-2d-with-array-buffer-view.html",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    fail("conformance/textures/canvas/*", &["android", "qualcomm:Adreno (TM) 420"], Some(499555)),
    fail(
        "conformance/textures/image_data/*",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    fail("conformance/textures/image/*", &["android", "qualcomm:Adreno (TM) 420"], Some(499555)),
    fail(
        "conformance/textures/webgl_canvas/*",
        &["android", "qualcomm:Adreno (TM) 420"],
        Some(499555),
    ),
    skip(
        "conformance/extensions/oes-texture-float-with-video.html",
        &["android", "nvidia"],
        Some(499555),
    ),
    fail(
        "conformance/glsl/bugs/multiplication-assignment.html",
        &["android", "nvidia"],
        Some(606096),
    ),
    fail(
        "conformance/glsl/constructors/glsl-construct-mat2.html",
        &["android", "nvidia"],
        Some(606096),
    ),
    fail(
        "conformance/glsl/constructors/glsl-construct-mat3.html",
        &["android", "nvidia"],
        Some(606096),
    ),
    fail(
        "conformance/glsl/constructors/glsl-construct-mat4.html",
        &["android", "nvidia"],
        Some(606096),
    ),
    skip("conformance/rendering/multisample-corruption.html", &["android"], None),
    fail("conformance/extensions/webgl-depth-texture.html", &["chromeos"], Some(382651)),
    fail("conformance/glsl/misc/empty_main.vert.html", &["chromeos", "intel"], Some(375556)),
    fail("conformance/glsl/misc/gl_position_unset.vert.html", &["chromeos", "intel"], Some(375556)),
    fail("conformance/glsl/misc/shaders-with-varyings.html", &["chromeos", "intel"], Some(375556)),
    fail(
        "conformance/renderbuffers/framebuffer-object-attachment.html",
        &["chromeos", "intel"],
        Some(375556),
    ),
    fail("conformance/textures/misc/texture-size-limit.html", &["chromeos", "intel"], Some(385361)),
    fail(
        "conformance/attribs/gl-vertex-attrib-render.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/glsl/functions/glsl-function-atan-xy.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/glsl/functions/glsl-function-cos.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/glsl/functions/glsl-function-sin.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/glsl/variables/gl-frontfacing.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/limits/gl-max-texture-dimensions.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/acos/acos_001_to_006.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/asin/asin_001_to_006.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/atan/atan_001_to_008.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/build/build_009_to_016.html",
        &["chromeos", "intel:0xa011"],
        Some(378938),
    ),
    fail(
        "conformance/ogles/GL/control_flow/control_flow_001_to_008.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/cos/cos_001_to_006.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/discard/discard_001_to_002.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/functions/functions_001_to_008.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/functions/functions_065_to_072.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/functions/functions_081_to_088.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/functions/functions_097_to_104.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/functions/functions_105_to_112.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/functions/functions_113_to_120.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/functions/functions_121_to_126.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/gl_FrontFacing/gl_FrontFacing_001_to_001.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/log/log_001_to_008.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/log2/log2_001_to_008.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/normalize/normalize_001_to_006.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/ogles/GL/sin/sin_001_to_006.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail("conformance/rendering/point-size.html", &["chromeos", "intel:0xa011"], Some(375554)),
    fail("conformance/rendering/polygon-offset.html", &["chromeos", "intel:0xa011"], Some(375554)),
    fail(
        "conformance/textures/misc/texture-mips.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/textures/misc/texture-npot.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/textures/misc/texture-npot-video.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/textures/misc/texture-size.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    fail(
        "conformance/uniforms/gl-uniform-arrays.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
    skip(
        "conformance/uniforms/uniform-default-values.html",
        &["chromeos", "intel:0xa011"],
        Some(375554),
    ),
];

/// [`GpuTestExpectations`] for a checkout of the WebGL conformance suite.
///
/// Every pattern without a `*` that is not an extension check must name a
/// file below the suite's root.
#[derive(Debug, Clone)]
pub struct WebGlConformanceExpectations {
    conformance_path: PathBuf,
    expectations: GpuTestExpectations,
}

impl WebGlConformanceExpectations {
    /// Load [`WEBGL_CONFORMANCE_EXPECTATIONS`] against the suite at
    /// `conformance_path`.
    pub fn new(conformance_path: impl Into<PathBuf>) -> Result<Self> {
        let mut expectations = Self::empty(conformance_path);
        for entry in WEBGL_CONFORMANCE_EXPECTATIONS {
            match entry.kind {
                EntryKind::Fail => expectations.fail(entry.pattern, entry.conditions, entry.bug)?,
                EntryKind::Flaky => expectations.flaky(
                    entry.pattern,
                    entry.conditions,
                    entry.bug,
                    DEFAULT_FLAKY_RETRIES,
                )?,
                EntryKind::Skip => expectations.skip(entry.pattern, entry.conditions, entry.bug)?,
            }
        }
        info!(
            path = %expectations.conformance_path.display(),
            entries = expectations.expectations.len(),
            "loaded WebGL conformance expectations"
        );
        Ok(expectations)
    }

    /// No entries yet; add them with [`Self::fail`] and friends.
    pub fn empty(conformance_path: impl Into<PathBuf>) -> Self {
        WebGlConformanceExpectations {
            conformance_path: conformance_path.into(),
            expectations: GpuTestExpectations::new(),
        }
    }

    pub fn conformance_path(&self) -> &Path {
        &self.conformance_path
    }

    pub fn check_pattern_is_valid(&self, pattern: &str) -> Result<()> {
        if pattern.contains('*') || pattern.contains(EXTENSION_PREFIX) {
            return Ok(());
        }
        let full_path = self.conformance_path.join(pattern);
        if !full_path.exists() {
            return Err(GpuExpectationError::MissingTest(full_path));
        }
        Ok(())
    }

    pub fn fail(&mut self, pattern: &str, conditions: &[&str], bug: Option<u32>) -> Result<()> {
        self.check_pattern_is_valid(pattern)?;
        self.expectations.fail(pattern, conditions, bug)
    }

    pub fn flaky(&mut self, pattern: &str, conditions: &[&str], bug: Option<u32>, max_retries: u32) -> Result<()> {
        self.check_pattern_is_valid(pattern)?;
        self.expectations.flaky(pattern, conditions, bug, max_retries)
    }

    pub fn skip(&mut self, pattern: &str, conditions: &[&str], bug: Option<u32>) -> Result<()> {
        self.check_pattern_is_valid(pattern)?;
        self.expectations.skip(pattern, conditions, bug)
    }
}

impl Deref for WebGlConformanceExpectations {
    type Target = GpuTestExpectations;

    fn deref(&self) -> &GpuTestExpectations {
        &self.expectations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionSet;

    #[test]
    fn test_builtin_conditions_all_parse() {
        for entry in WEBGL_CONFORMANCE_EXPECTATIONS {
            assert!(
                ConditionSet::parse(entry.conditions).is_ok(),
                "bad conditions for {}",
                entry.pattern
            );
        }
    }

    #[test]
    fn test_wildcards_and_extensions_skip_the_file_check() {
        let expectations = WebGlConformanceExpectations::empty("/nonexistent");
        assert!(expectations.check_pattern_is_valid("conformance/textures/canvas/*").is_ok());
        assert!(expectations.check_pattern_is_valid("WebglExtension.EXT_sRGB").is_ok());
        assert!(matches!(
            expectations.check_pattern_is_valid("conformance/rendering/point-size.html"),
            Err(GpuExpectationError::MissingTest(p)) if p.ends_with("conformance/rendering/point-size.html")
        ));
    }
}
