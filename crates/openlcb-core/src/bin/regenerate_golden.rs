//! Rewrites `expected.json` next to every `input.json` wire fixture.
//!
//! Usage: `regenerate_golden [FIXTURE_ROOT]`, default `tests/golden`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use openlcb_core::{Decoded, WireMessage};

fn main() -> ExitCode {
    let root = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new("tests").join("golden"));
    match regenerate_all(&root) {
        Ok(count) => {
            println!("rewrote {count} fixture(s) under {}", root.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn regenerate_all(root: &Path) -> Result<usize, String> {
    let mut cases: Vec<PathBuf> = fs::read_dir(root)
        .map_err(|err| format!("cannot list fixture root {}: {err}", root.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|case| case.join("input.json").is_file())
        .collect();
    cases.sort();

    for case in &cases {
        let decoded = decode_case(&case.join("input.json"))?;
        let json = serde_json::to_string_pretty(&decoded)
            .map_err(|err| format!("cannot encode outcomes for {}: {err}", case.display()))?;
        let output = case.join("expected.json");
        fs::write(&output, json + "\n")
            .map_err(|err| format!("cannot write {}: {err}", output.display()))?;
    }
    Ok(cases.len())
}

/// Decode every wire message of one fixture, keeping failures as outcomes.
fn decode_case(input: &Path) -> Result<Vec<Decoded>, String> {
    let text = fs::read_to_string(input)
        .map_err(|err| format!("cannot read {}: {err}", input.display()))?;
    let wires: Vec<WireMessage> = serde_json::from_str(&text)
        .map_err(|err| format!("{} is not a list of wire messages: {err}", input.display()))?;
    Ok(wires.iter().map(Decoded::from_wire).collect())
}
