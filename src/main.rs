// src/main.rs

use scenepipe::{cli, logging, run_cli};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("scenepipe error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run_cli(args).await
}
