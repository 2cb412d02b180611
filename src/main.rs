fn main() {
    if let Err(err) = uml_canvas::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
