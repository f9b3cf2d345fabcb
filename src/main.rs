use clap::Parser as _;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = hunt_thread::CliArgs::parse();
    if let Err(e) = hunt_thread::run(args).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
