//! Records the version of the compiler building the binary so the `meta`
//! event can report it.

use std::process::Command;

fn main() {
    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "rustc (unknown)".to_string());

    println!("cargo:rustc-env=PIDBG_RUSTC_VERSION={version}");
    println!("cargo:rerun-if-env-changed=RUSTC");
}
