use tracing_subscriber::EnvFilter;

#[cfg(not(target_arch = "wasm32"))]
fn load_dotenv() {
    // A missing .env is fine; the environment may already be set.
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("failed to read .env: {}", err);
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn load_dotenv() {}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gateway_console=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    load_dotenv();
    init_tracing();
    tracing::info!("Starting gateway console");
    dioxus::launch(gateway_console::ui::App);
}
