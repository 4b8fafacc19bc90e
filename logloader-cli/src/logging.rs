//! 실행 로그 초기화
//!
//! `[logging]` 설정에 따라 `tracing-subscriber`를 구성합니다.
//! `RUST_LOG`가 설정되어 있으면 설정 파일의 레벨보다 우선합니다.
//!
//! - `destination = "stderr"`: 표준 에러로 출력
//! - 파일 경로: `tracing-appender` non-blocking writer로 파일에 추가 기록하고,
//!   ERROR 이상은 표준 에러에도 함께 출력

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use logloader_core::config::{LoggingConfig, STDERR_DESTINATION};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// 전역 tracing subscriber를 초기화합니다.
///
/// 프로세스당 한 번만 호출해야 합니다. 파일 출력인 경우 반환된 guard가
/// 살아 있는 동안만 로그가 기록되므로 실행이 끝날 때까지 보관하세요.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level = config.level()?;
    let destination = config.destination()?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    let guard = if destination == STDERR_DESTINATION {
        layers.push(
            fmt_layer(&config.format, std::io::stderr, true)?
                .with_filter(env_filter)
                .boxed(),
        );
        None
    } else {
        let (writer, guard) = file_writer(Path::new(destination))?;
        layers.push(fmt_layer(&config.format, writer, false)?.with_filter(env_filter).boxed());
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(LevelFilter::ERROR)
                .boxed(),
        );
        Some(guard)
    };

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))?;

    Ok(guard)
}

fn fmt_layer<W>(format: &str, writer: W, ansi: bool) -> Result<BoxedLayer>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);
    match format {
        "json" => Ok(layer.json().boxed()),
        "pretty" => Ok(layer.pretty().boxed()),
        other => Err(anyhow::anyhow!(
            "unknown log format '{}', expected 'json' or 'pretty'",
            other
        )),
    }
}

fn file_writer(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("log destination '{}' has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
