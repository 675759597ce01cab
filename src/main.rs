fn main() {
    if let Err(err) = mednotify_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
