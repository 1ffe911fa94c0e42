use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = slowrelay::cli::Cli::parse();
    if let Err(e) = slowrelay::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
