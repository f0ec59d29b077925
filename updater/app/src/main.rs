use std::io;

use tracing_subscriber::{EnvFilter, fmt, Layer};
use tracing_subscriber::layer::SubscriberExt;

use updater_config::CONFIG;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();
    updater_app::run().await
}

fn init_logger() {
    let file_appender = tracing_appender::rolling::never("./logs", "updater.log");

    let log_output = fmt::Layer::new()
        .with_writer(io::stdout)
        .with_file(true)
        .with_line_number(true)
        .and_then(
            fmt::Layer::new().with_writer(file_appender)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true));

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new(CONFIG.logging.levels()))
        .with(log_output);

    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default subscriber failed");
}
