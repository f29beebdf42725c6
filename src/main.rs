// src/main.rs

use std::process::ExitCode;

use targetdag::{cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    match run_main().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("targetdag error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_main() -> anyhow::Result<ExitCode> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let ok = run(args).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
