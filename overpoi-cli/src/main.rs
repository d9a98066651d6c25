//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    overpoi_cli::init_logging();
    if let Err(err) = overpoi_cli::run() {
        eprintln!("overpoi: {err}");
        std::process::exit(1);
    }
}
