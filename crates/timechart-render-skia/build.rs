// File: crates/timechart-render-skia/build.rs
// Summary: Links the Windows system libraries Skia and ICU need.

fn main() {
    #[cfg(target_os = "windows")]
    {
        // RegOpenKeyExW, RegQueryInfoKeyW
        println!("cargo:rustc-link-lib=advapi32");
    }
}
