use bluegreen_runtime::BlueGreenRuntime;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bluegreen=debug")),
        )
        .init();

    if let Err(err) = BlueGreenRuntime::with_args().run().await {
        error!("fatal: {err}");
        std::process::exit(1);
    }
}
