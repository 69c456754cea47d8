use std::env;
use std::path::Path;
use std::process::{Command, ExitCode};

const FMT: &[&str] = &["fmt", "--all", "--", "--check"];
const LINT: &[&str] = &[
    "clippy",
    "--workspace",
    "--all-targets",
    "--",
    "-D",
    "warnings",
];
const TEST: &[&str] = &["test", "--workspace"];

fn cargo(root: &Path, args: &[&str]) -> Result<(), String> {
    let shown = args.join(" ");
    let status = Command::new(env::var("CARGO").unwrap_or_else(|_| "cargo".to_string()))
        .args(args)
        .current_dir(root)
        .status()
        .map_err(|e| format!("failed to run `cargo {shown}`: {e}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("command failed: cargo {shown}"))
    }
}

fn main() -> ExitCode {
    let arg = env::args().nth(1).unwrap_or_else(|| "help".to_string());
    let Some(root) = Path::new(env!("CARGO_MANIFEST_DIR")).parent() else {
        eprintln!("xtask must live one level below the workspace root");
        return ExitCode::FAILURE;
    };

    let result = match arg.as_str() {
        "fmt" => cargo(root, FMT),
        "lint" => cargo(root, LINT),
        "test" => cargo(root, TEST),
        "ci" => [FMT, LINT, TEST].iter().try_for_each(|args| cargo(root, args)),
        "help" | "--help" | "-h" => {
            eprintln!("xtask commands:");
            eprintln!("  fmt    check formatting");
            eprintln!("  lint   clippy with warnings denied");
            eprintln!("  test   workspace tests");
            eprintln!("  ci     fmt, lint and test in order");
            Ok(())
        }
        _ => Err(format!(
            "unknown xtask command: {arg} (try `cargo run -p xtask -- help`)"
        )),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
