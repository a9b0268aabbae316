#[tokio::main]
async fn main() {
    if let Err(e) = server::run().await {
        eprintln!("server error: {e:#}");
        std::process::exit(1);
    }
}
