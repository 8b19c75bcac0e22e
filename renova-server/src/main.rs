use clap::Parser;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = renova_server::Cli::parse();
    if let Err(err) = renova_server::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
