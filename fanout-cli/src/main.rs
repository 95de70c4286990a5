//! `fanout` binary entry point.

fn main() {
    if let Err(error) = fanout_cli::run() {
        eprintln!("Error: {:#}", error);
        std::process::exit(2);
    }
}
