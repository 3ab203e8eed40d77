#[tokio::main]
async fn main() {
    if let Err(e) = roomstage_lib::run().await {
        tracing::error!(error = %e, "Staging service stopped");
        std::process::exit(1);
    }
}
