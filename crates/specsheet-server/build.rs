use std::path::PathBuf;

fn main() {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap());
    let real_dist = manifest_dir.join("../../frontend/dist");

    println!("cargo:rerun-if-changed={}", real_dist.display());

    // The UI is plain static files; no bundler step.
    if real_dist.join("index.html").exists() {
        println!(
            "cargo:rustc-env=SPECSHEET_FRONTEND_DIST={}",
            real_dist.display()
        );
        return;
    }

    // Packaged without the frontend directory (e.g. `cargo package`). Write a
    // stub into OUT_DIR so the RustEmbed proc-macro does not fail.
    let stub_dir = out_dir.join("frontend-dist");
    std::fs::create_dir_all(&stub_dir).expect("create stub frontend-dist dir");
    std::fs::write(
        stub_dir.join("index.html"),
        "<!doctype html><html><body>\
         <p>Web UI not bundled. The JSON API is available under <code>/api</code>.</p>\
         </body></html>",
    )
    .expect("write stub index.html");
    println!(
        "cargo:rustc-env=SPECSHEET_FRONTEND_DIST={}",
        stub_dir.display()
    );
    println!("cargo:warning=frontend/dist not found; specsheet-server will serve a stub UI");
}
