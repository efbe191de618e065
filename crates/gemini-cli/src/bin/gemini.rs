fn main() {
    std::process::exit(gemini_cli::run());
}
