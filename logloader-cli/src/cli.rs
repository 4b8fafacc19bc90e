//! CLI 인자 정의 (clap derive)
//!
//! 부수 효과 없는 선언만 둡니다.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// logloader -- 로테이션되는 로그 파일을 증분 수집하여 PostgreSQL에 저장합니다.
///
/// 한 번 실행하면 새로 추가된 바이트만 읽고 종료합니다. cron/systemd timer로 주기 실행하세요.
#[derive(Parser, Debug)]
#[command(name = "logloader", version, about, long_about = None)]
pub struct Cli {
    /// 설정 파일 경로 (생략 시 LOGLOADER_* 환경변수만 사용)
    #[arg(short, long, env = "LOGLOADER_CONFIG")]
    pub config: Option<PathBuf>,

    /// 로그 레벨 오버라이드 (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// 요약 출력 형식
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,

    /// 설정만 검증하고 종료
    #[arg(long)]
    pub check_config: bool,

    /// 인메모리 싱크로 실행하고 상태를 저장하지 않음
    #[arg(long, conflicts_with = "check_config")]
    pub dry_run: bool,
}

/// 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// 사람이 읽는 텍스트
    Text,
    /// JSON
    Json,
}
