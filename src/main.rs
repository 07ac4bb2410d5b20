use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = bellhop::cli::Cli::parse();
    if let Err(e) = bellhop::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
