fn main() {
    if let Err(err) = sheet_tables::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
