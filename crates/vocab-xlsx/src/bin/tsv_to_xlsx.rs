fn main() -> anyhow::Result<()> {
    vocab_xlsx::cli::run()
}
