mod cmd;
mod util;

use argp::FromArgs;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

#[derive(FromArgs, PartialEq, Debug)]
/// Grade student lab repositories from their CI results.
struct TopLevel {
    #[argp(subcommand)]
    command: SubCommand,
    #[argp(option, short = 'L')]
    /// log filter, e.g. debug or lab_grader_engine=trace (overrides RUST_LOG)
    log_level: Option<String>,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    Labs(cmd::labs::Args),
    Log(cmd::log::Args),
}

#[tokio::main]
async fn main() {
    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    let env_filter = match &args.log_level {
        Some(directives) => EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse_lossy(directives),
        // Default to info level
        None => EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy(),
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let result = match args.command {
        SubCommand::Labs(c_args) => cmd::labs::run(c_args).await,
        SubCommand::Log(c_args) => cmd::log::run(c_args),
    };
    if let Err(e) = result {
        tracing::error!("{:?}", e);
        std::process::exit(1);
    }
}
