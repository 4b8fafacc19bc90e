//! 한 번의 실행: 설정 로드 → 로깅/메트릭 초기화 → 수집 → 요약 출력

use std::path::Path;

use tracing::Instrument;
use uuid::Uuid;

use logloader_core::config::LoaderConfig;
use logloader_core::pipeline::RecordMapper;
use logloader_ingest::{
    ControllerOptions, IngestError, MemorySink, PostgresSink, RunController, RunReport,
    build_mapper,
};

use crate::cli::Cli;
use crate::error::CliError;
use crate::output::{ConfigCheck, OutputWriter, RunSummary};
use crate::{logging, textfile};

/// CLI 요청을 실행합니다.
pub async fn execute(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli).await?;
    let output = OutputWriter::new(cli.output);

    if cli.check_config {
        return output.render(&ConfigCheck::from_config(&config)?);
    }

    let _guard =
        logging::init_tracing(&config.logging).map_err(|e| CliError::Config(format!("{e:#}")))?;
    let handle =
        textfile::install_recorder().map_err(|e| CliError::Command(format!("{e:#}")))?;

    let run_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("run", run_id = %run_id);

    let result = tokio::select! {
        result = ingest(&config, cli.dry_run).instrument(span) => result,
        signal = shutdown_signal() => {
            tracing::warn!(run_id = %run_id, signal, "interrupted, state snapshot left unchanged");
            Err(CliError::Interrupted(signal))
        }
    };

    if !matches!(result, Err(CliError::Interrupted(_))) {
        if let Some(path) = &config.metrics.textfile_path {
            if let Err(e) = textfile::write_textfile(&handle, Path::new(path)) {
                tracing::warn!(error = %format!("{e:#}"), "failed to export metrics");
            }
        }
    }

    let report = result?;
    output.render(&RunSummary {
        run_id,
        dry_run: cli.dry_run,
        report: &report,
    })
}

/// 파일 → 환경변수 → `--log-level` 순으로 덮어쓴 뒤 검증합니다.
async fn load_config(cli: &Cli) -> Result<LoaderConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => LoaderConfig::from_file(path).await?,
        None => LoaderConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(level) = &cli.log_level {
        config.logging.level = Some(level.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn ingest(config: &LoaderConfig, dry_run: bool) -> Result<RunReport, CliError> {
    let options =
        ControllerOptions::from_config(config).map_err(|e| CliError::Config(e.to_string()))?;
    let format = config
        .source
        .format()
        .map_err(|e| CliError::Config(e.to_string()))?;
    let mapper = build_mapper(format).map_err(|e| CliError::Config(e.to_string()))?;

    tracing::info!(
        pattern = %options.pattern,
        format,
        state = %options.state_path.display(),
        dry_run,
        "run starting"
    );

    if dry_run {
        let mut controller = RunController::new(options, mapper, MemorySink::new());
        return Ok(controller.preview().await?);
    }

    let sink = PostgresSink::connect(&config.sink, mapper.columns())
        .await
        .map_err(IngestError::from)?;
    let mut controller = RunController::new(options, mapper, sink);
    let result = controller.execute().await;
    controller.sink().close().await;
    Ok(result?)
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "failed to install signal handlers");
                return std::future::pending().await;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    "ctrl-c"
}
