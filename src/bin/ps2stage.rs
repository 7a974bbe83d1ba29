fn main() -> anyhow::Result<()> {
    ps2stage::cli::run_cli()
}
