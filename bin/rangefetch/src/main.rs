#![allow(missing_docs)]

fn main() {
    if let Err(err) = rangefetch::cli::run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
