//! Build script: embeds the git short hash and checks GPU toolkits.
//!
//! whisper-rs-sys compiles whisper.cpp from source; a missing toolkit for the
//! selected GPU feature surfaces here as a readable warning instead of deep
//! inside the cmake output.

use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if has_feature("CUDA") {
        check_tool("nvcc", &["--version"], "CUDA", "install the CUDA toolkit (nvcc)");
    }
    if has_feature("VULKAN") {
        check_tool(
            "glslc",
            &["--version"],
            "Vulkan",
            "install the Vulkan SDK (glslc, vulkan headers)",
        );
    }
    if has_feature("HIPBLAS") {
        check_tool("hipcc", &["--version"], "ROCm", "install ROCm (hipcc, hipBLAS)");
    }
    if has_feature("OPENBLAS") {
        check_tool(
            "pkg-config",
            &["--exists", "openblas"],
            "OpenBLAS",
            "install libopenblas-dev",
        );
    }
    if has_feature("WHISPER") {
        check_tool("cmake", &["--version"], "whisper", "install cmake");
    }
}

fn check_tool(binary: &str, args: &[&str], feature: &str, hint: &str) {
    match Command::new(binary).args(args).output() {
        Ok(out) if out.status.success() => {}
        _ => {
            println!("cargo::warning={feature} build requested but `{binary}` was not found");
            println!("cargo::warning=  → {hint}");
        }
    }
}

/// Crate features reach build scripts as `CARGO_FEATURE_*` variables.
fn has_feature(name: &str) -> bool {
    std::env::var_os(format!("CARGO_FEATURE_{name}")).is_some()
}
