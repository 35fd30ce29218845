mod commands;
mod sync_state;

#[tokio::main]
async fn main() {
    if let Err(err) = commands::run().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
