use std::process::Command;
use std::time::SystemTime;

/// Short revision of the checkout, or the `GEOMETA_GIT_HASH` override used by
/// release builds made outside of a git work tree.
fn git_hash() -> Option<String> {
    if let Ok(hash) = std::env::var("GEOMETA_GIT_HASH") {
        return Some(hash);
    }

    let output = match Command::new("git").args(["rev-parse", "HEAD"]).output() {
        Ok(output) => output,
        Err(e) => {
            println!("cargo:warning=Failed to execute git command: {e}");
            return None;
        }
    };
    if !output.status.success() {
        println!(
            "cargo:warning=git rev-parse HEAD failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).chars().take(7).collect())
}

fn main() {
    println!("cargo:rerun-if-env-changed=GEOMETA_GIT_HASH");

    let build_time = humantime::format_rfc3339_seconds(SystemTime::now()).to_string();
    println!("cargo:rustc-env=BUILD_TIME={build_time}");

    match git_hash() {
        Some(hash) => println!("cargo:rustc-env=GIT_HASH={hash}"),
        None => println!("cargo:warning=No git revision available, use 'UNKNOWN' instead"),
    }
}
