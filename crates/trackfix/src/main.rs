#![forbid(unsafe_code)]

fn main() {
    if let Err(error) = trackfix::run_from_env() {
        eprintln!("trackfix: {error}");
        std::process::exit(error.exit_code());
    }
}
