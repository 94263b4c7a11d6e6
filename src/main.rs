fn main() {
    std::process::exit(cloe::cli::main());
}
