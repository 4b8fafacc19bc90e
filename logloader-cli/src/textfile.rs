//! Prometheus 메트릭 레코더와 textfile 내보내기
//!
//! 한 번 실행하고 종료하는 프로세스이므로 HTTP 리스너 대신
//! node_exporter textfile collector가 읽을 파일로 내보냅니다.
//!
//! ```ignore
//! let handle = install_recorder()?;
//! // ... 실행 ...
//! write_textfile(&handle, Path::new("/var/lib/node_exporter/logloader.prom"))?;
//! ```

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// 전역 메트릭 레코더를 설치하고 렌더링 핸들을 반환합니다.
///
/// 프로세스당 한 번만 호출할 수 있습니다.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    logloader_core::metrics::describe_all();
    Ok(handle)
}

/// 현재 메트릭을 textfile로 원자적으로 기록합니다.
///
/// collector가 쓰는 도중의 파일을 읽지 않도록 같은 디렉토리의
/// 임시 파일에 쓴 뒤 rename 합니다.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    write_atomic(path, handle.render().as_bytes())
        .with_context(|| format!("failed to write metrics textfile {}", path.display()))?;
    tracing::debug!(path = %path.display(), "metrics textfile written");
    Ok(())
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .context("metrics textfile path has no file name")?
        .to_string_lossy();
    // node_exporter는 *.prom만 읽으므로 임시 파일은 무시됨
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let result = (|| -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)?;
        file.write_all(content)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logloader.prom");

        write_atomic(&path, b"first 1\n").unwrap();
        write_atomic(&path, b"second 2\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second 2\n");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn write_atomic_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/logloader.prom");
        assert!(write_atomic(&path, b"x 1\n").is_err());
    }

    #[test]
    fn rendered_handle_contains_recorded_metrics() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(logloader_core::metrics::LINES_READ_TOTAL).increment(7);
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logloader.prom");
        write_textfile(&handle, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("logloader_lines_read_total 7"));
    }
}
