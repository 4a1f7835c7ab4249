use anyhow::Result;
use clap::Parser;
use housing_inference::cli::{commands, Cli, Command};
use tracing_subscriber::EnvFilter;

fn init_tracing(json_logs: bool, quiet: bool) {
    let default_level = if quiet { "warn" } else { "housing_inference=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let quiet = cli.quiet;
    init_tracing(cli.json_logs, quiet);

    match cli.command {
        Command::Serve(args) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(commands::serve::run(args))
        }
        Command::Predict(args) => commands::predict::execute(&args, quiet),
    }
}
