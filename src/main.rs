fn main() {
    if let Err(err) = progress_forest::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
