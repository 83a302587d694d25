//! Puts `memory.x` (the STM32F4 flash/RAM layout the demo links against)
//! on the linker search path. Host builds never consume the script; copying
//! it unconditionally keeps the build script target-agnostic.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    fs::copy("memory.x", out_dir.join("memory.x")).expect("copy memory.x");

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed=memory.x");
}
