//! mitm CLI binary entry point.

use mitm::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = mitm::cli::commands::run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
