//! Sensorwatch CLI entry point

#[tokio::main]
async fn main() {
    if let Err(e) = sensorwatch_cli::run().await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
