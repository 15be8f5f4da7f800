// Shared build-script helper for README-to-rustdoc embedding.
// Include from a crate's build.rs with: include!("../build_common.rs");
//
// The including file must import:
//   use std::env;
//   use std::fs;
//   use std::path::Path;

/// Copy the crate's README.md into OUT_DIR for `#![doc = include_str!(...)]`,
/// rewriting intra-repo source links to crate-relative rustdoc paths so the
/// rendered docs do not point at files rustdoc cannot serve.
fn process_readme_for_rustdoc(crate_dir: &str) {
    println!("cargo:rerun-if-changed=README.md");

    let readme_path = Path::new(crate_dir).join("README.md");
    let content = fs::read_to_string(&readme_path).unwrap_or_else(|_| {
        // A crate without a README still compiles; rustdoc just gets the
        // crate name as its front page.
        let name = env::var("CARGO_PKG_NAME").unwrap_or_default();
        format!("# {name}\n")
    });

    let rustdoc_content = content.replace("](src/", "](").replace(".rs)", ")");

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    fs::write(
        Path::new(&out_dir).join("README_GENERATED.md"),
        rustdoc_content,
    )
    .expect("write README_GENERATED.md");
}
