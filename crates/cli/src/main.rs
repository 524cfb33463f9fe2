//! Entry point for the `corral` executable.
//!
//! All functionality lives in the `corral_cli` library crate; this file
//! only translates its outcome into a process exit code.

fn main() {
    std::process::exit(corral_cli::run());
}
