use std::env;

fn main() {
    // Version string shown by the CLI and sent in the X-Client header
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".to_string());
    let version = match env::var("NVDB_MAPPER_BUILD_TAG") {
        Ok(tag) if !tag.is_empty() => format!("{version}+{tag}"),
        _ => version,
    };
    println!("cargo:rustc-env=NVDB_MAPPER_VERSION={version}");

    println!("cargo:rerun-if-env-changed=NVDB_MAPPER_BUILD_TAG");
    println!("cargo:rerun-if-changed=src/");
    println!("cargo:rerun-if-changed=Cargo.toml");
}
