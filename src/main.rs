fn main() {
    if let Err(error) = log_sieve::run() {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}
