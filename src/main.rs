// Purpose: Binary entry for the type switch expander.
// Inputs/Outputs: Reads process args and exits with the code the CLI dispatcher returns.

fn main() {
    let code = tsgen::cli::run_cli(std::env::args().skip(1));
    std::process::exit(code);
}
