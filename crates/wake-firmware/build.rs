//! Generates `sleep_timings.rs` for the hosted demo program and passes the
//! linker script to the firmware binary.
//!
//! Timings come from an optional `.env` next to this file:
//!
//! ```text
//! WAKE_LIGHT_SLEEP_MS=2000
//! WAKE_DEEP_SLEEP_SECS=30
//! ```

use std::{
    env, fs,
    io::{self, Write},
    path::Path,
};

/// Variable name, generated constant name, default value
const TIMINGS: [(&str, &str, u64); 2] = [
    ("WAKE_LIGHT_SLEEP_MS", "LIGHT_SLEEP_MS", 2000),
    ("WAKE_DEEP_SLEEP_SECS", "DEEP_SLEEP_SECS", 30),
];

fn main() -> io::Result<()> {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").map_err(io::Error::other)?;
    let env_path = Path::new(&manifest_dir).join(".env");
    println!("cargo:rerun-if-changed={}", env_path.display());

    let vars: Vec<(String, String)> = match dotenvy::from_path_iter(&env_path) {
        Ok(iter) => iter.filter_map(Result::ok).collect(),
        Err(_) => {
            println!("cargo:warning=.env not found, using default sleep timings");
            Vec::new()
        }
    };

    let out_dir = env::var("OUT_DIR").map_err(io::Error::other)?;
    let mut f = fs::File::create(Path::new(&out_dir).join("sleep_timings.rs"))?;

    for (var, name, default) in TIMINGS {
        let value = match vars.iter().find(|(k, _)| k == var) {
            Some((_, raw)) => raw.parse::<u64>().map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidData, format!("{var}={raw:?}: {e}"))
            })?,
            None => default,
        };
        writeln!(f, "pub const {name}: u64 = {value};")?;
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
    Ok(())
}
