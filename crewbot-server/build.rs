fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    // Release builds outside a git checkout pass the hash in explicitly
    println!("cargo:rerun-if-env-changed=CREWBOT_GIT_HASH");
    if let Ok(hash) = std::env::var("CREWBOT_GIT_HASH") {
        println!("cargo:rustc-env=CREWBOT_GIT_HASH={}", hash);
    }
}
