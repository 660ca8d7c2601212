//! Binary entry point for the Lume CLI.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = lume_cli::run() {
        eprintln!("lume: {err}");
        std::process::exit(1);
    }
}
