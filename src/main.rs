//! Portfolio Site - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = portfolio_site::run().await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
