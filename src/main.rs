use clap::Parser;
use nodewatch::cli::Cli;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    nodewatch::commands::run(cli)
}
