//! 실행 요약 출력 (text / JSON)
//!
//! 모든 출력은 [`OutputWriter`]를 거치므로 형식 분기는 이 모듈에만 있습니다.

use std::io::Write;

use serde::Serialize;

use logloader_core::config::LoaderConfig;
use logloader_ingest::RunReport;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// 형식에 맞게 stdout으로 출력합니다.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// payload를 stdout으로 출력합니다.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(payload, &mut handle)
    }

    fn render_to<T: Render + Serialize>(
        &self,
        payload: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// 사람이 읽는 텍스트 출력
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

/// 한 번의 실행 요약
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub run_id: String,
    pub dry_run: bool,
    #[serde(flatten)]
    pub report: &'a RunReport,
}

impl Render for RunSummary<'_> {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let r = self.report;
        let title = if self.dry_run { "Run summary (dry run)" } else { "Run summary" };
        writeln!(w, "{title} [{}]", self.run_id)?;
        writeln!(w, "  files scanned:  {}", r.files_scanned)?;
        writeln!(w, "  lines read:     {}", r.lines_read)?;
        writeln!(w, "  lines written:  {} ({} new, {} duplicate)", r.lines_written, r.inserted, r.duplicates)?;
        writeln!(w, "  lines dropped:  {}", r.lines_dropped)?;
        writeln!(w, "  blank lines:    {}", r.lines_blank)?;
        writeln!(w, "  bytes read:     {}", r.bytes_read)?;
        writeln!(w, "  rotations:      {}", r.rotations)?;
        writeln!(w, "  truncations:    {}", r.truncations)?;

        if !r.targets.is_empty() {
            writeln!(w)?;
            writeln!(
                w,
                "{:<40} {:<18} {:>4} {:>12} {:>8} {:>8}",
                "LOG", "DECISION", "GEN", "OFFSET", "READ", "DROPPED"
            )?;
            for t in &r.targets {
                writeln!(
                    w,
                    "{:<40} {:<18} {:>4} {:>12} {:>8} {:>8}",
                    t.log_name, t.decision, t.generation, t.offset, t.lines_read, t.lines_dropped
                )?;
                if let Some(tail) = &t.tail {
                    writeln!(w, "  partial line deferred: {} bytes at offset {}", tail.len, tail.offset)?;
                }
            }
        }

        if !r.skipped.is_empty() {
            writeln!(w)?;
            writeln!(w, "Skipped ({}):", r.skipped.len())?;
            for s in &r.skipped {
                writeln!(w, "  {}: {}", s.log_name, s.reason)?;
            }
        }
        Ok(())
    }
}

/// `--check-config` 결과
#[derive(Debug, Serialize)]
pub struct ConfigCheck {
    pub valid: bool,
    pub pattern: String,
    pub format: String,
    pub state_path: String,
    pub table: String,
}

impl ConfigCheck {
    /// 검증된 설정에서 요약을 만듭니다.
    pub fn from_config(config: &LoaderConfig) -> Result<Self, CliError> {
        let to_cli = |e: logloader_core::error::ConfigError| CliError::Config(e.to_string());
        Ok(Self {
            valid: true,
            pattern: config.source.pattern().map_err(to_cli)?.to_owned(),
            format: config.source.format().map_err(to_cli)?.to_owned(),
            state_path: config.state.path().map_err(to_cli)?.display().to_string(),
            table: config.sink.table.clone(),
        })
    }
}

impl Render for ConfigCheck {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Configuration OK")?;
        writeln!(w, "  pattern: {}", self.pattern)?;
        writeln!(w, "  format:  {}", self.format)?;
        writeln!(w, "  state:   {}", self.state_path)?;
        writeln!(w, "  table:   {}", self.table)?;
        Ok(())
    }
}
