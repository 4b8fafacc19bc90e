//! logloader -- 로테이션되는 로그 파일 증분 수집기
//!
//! 한 번 실행할 때마다 새로 추가된 완전한 라인만 읽어 PostgreSQL에 저장하고,
//! 저장이 성공한 경우에만 상태 스냅샷의 커서를 전진시킵니다.

mod cli;
mod error;
mod logging;
mod output;
mod run;
mod textfile;

use std::process::ExitCode;

use clap::Parser;

use cli::Cli;
use error::CliError;

fn main() -> ExitCode {
    // .env는 선택 사항
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let err = CliError::Io(e);
            eprintln!("logloader: {err}");
            return ExitCode::from(err.exit_code());
        }
    };

    match runtime.block_on(run::execute(&cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("logloader: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
