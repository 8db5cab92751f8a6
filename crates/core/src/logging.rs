use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides `level`. Output is pretty printed unless
/// `ILP_STREAM_LOG_FORMAT=json`, and goes to stderr when `ILP_STREAM_LOG_TO_STDERR` is
/// set. `ILP_STREAM_DISABLE_LOGS` turns logging off entirely.
pub fn init_tracer(level: Option<LevelFilter>) -> anyhow::Result<()> {
    if std::env::var("ILP_STREAM_DISABLE_LOGS").is_ok() {
        return Ok(());
    }

    let default_filter = if cfg!(any(test, debug_assertions)) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter_layer = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.unwrap_or(default_filter).into())
        .from_env_lossy();

    let use_json = std::env::var("ILP_STREAM_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let to_stderr = std::env::var("ILP_STREAM_LOG_TO_STDERR").is_ok();
    let with_location = cfg!(any(test, debug_assertions));

    let fmt_layer = match (use_json, to_stderr) {
        (true, true) => tracing_subscriber::fmt::layer()
            .json()
            .with_file(with_location)
            .with_line_number(with_location)
            .with_writer(std::io::stderr)
            .boxed(),
        (true, false) => tracing_subscriber::fmt::layer()
            .json()
            .with_file(with_location)
            .with_line_number(with_location)
            .boxed(),
        (false, true) => tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(with_location)
            .with_line_number(with_location)
            .with_writer(std::io::stderr)
            .boxed(),
        (false, false) => tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(with_location)
            .with_line_number(with_location)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter_layer))
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))?;
    Ok(())
}
