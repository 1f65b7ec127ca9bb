mod cli;
mod logging;

fn main() -> anyhow::Result<()> {
    logging::init(std::env::args().any(|a| a == "--debug"));
    cli::run()
}
