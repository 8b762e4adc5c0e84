//! Ambient logging setup (SPEC_FULL §3.1), built from `tracing-subscriber`
//! layers the way `danieleschmidt-mcp-wasm-edge-gateway`'s `src/main.rs`
//! wires up `tracing_subscriber::fmt`, generalised to cover the file/console
//! and text/json axes the engine's settings expose.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::settings::{LogFormat, LogSettings};

/// Initializes the global tracing subscriber. Must be called once, at
/// process start, before any other module logs.
///
/// Returns a guard that must be kept alive for the lifetime of the process
/// when file logging is enabled (dropping it flushes the non-blocking
/// writer).
pub fn init(settings: &LogSettings) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_new(&settings.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if settings.to_file {
        let rotation = if settings.rotate_daily {
            tracing_appender::rolling::Rotation::DAILY
        } else {
            tracing_appender::rolling::Rotation::NEVER
        };
        let appender = tracing_appender::rolling::Builder::new()
            .rotation(rotation)
            .filename_prefix("knowledge-engine")
            .filename_suffix("log")
            .max_log_files(settings.backup_count as usize)
            .build(&settings.dir)
            .unwrap_or_else(|_| tracing_appender::rolling::never(&settings.dir, "knowledge-engine.log"));
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        let file_layer = build_fmt_layer(settings.format, non_blocking, false);
        if settings.to_console {
            let console_layer = build_fmt_layer(settings.format, std::io::stdout, true);
            registry.with(file_layer).with(console_layer).init();
        } else {
            registry.with(file_layer).init();
        }
        Some(guard)
    } else {
        let console_layer = build_fmt_layer(settings.format, std::io::stdout, true);
        registry.with(console_layer).init();
        None
    }
}

fn build_fmt_layer<W>(
    format: LogFormat,
    writer: W,
    ansi: bool,
) -> Box<dyn tracing_subscriber::Layer<tracing_subscriber::Registry> + Send + Sync + 'static>
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => Box::new(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false),
        ),
        LogFormat::Text => Box::new(fmt::layer().with_writer(writer).with_ansi(ansi)),
    }
}
