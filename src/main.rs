fn main() -> Result<(), Box<dyn std::error::Error>> {
    docchat::cli::main()
}
