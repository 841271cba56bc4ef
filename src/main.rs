use modekeeper::cli;

#[tokio::main]
async fn main() {
    std::process::exit(cli::run_cli().await);
}
