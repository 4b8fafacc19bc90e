//! 실행 잠금
//!
//! 같은 상태 파일에 대해 동시에 하나의 실행만 허용합니다.
//! Unix에서는 잠금 파일에 `flock(LOCK_EX | LOCK_NB)`을 걸고 보유자 PID를 기록합니다.
//! 잠금은 [`RunLock`]이 drop되거나 프로세스가 종료되면 커널이 해제하므로
//! 비정상 종료 후에도 잠금 파일이 남아 다음 실행을 막지 않습니다.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use logloader_core::error::LockError;

/// 획득한 실행 잠금
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    // 파일이 닫히면 flock이 해제됨
    #[allow(dead_code)]
    file: File,
}

impl RunLock {
    /// 잠금을 획득합니다. 다른 실행이 보유 중이면 즉시 [`LockError::Held`]를 반환합니다.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref();
        let io_error = |source: std::io::Error| LockError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_error)?;
            }
        }

        let file = open_and_lock(path)?;
        write_holder(&file).map_err(io_error)?;

        tracing::debug!(path = %path.display(), pid = std::process::id(), "run lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// 잠금 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn open_and_lock(path: &Path) -> Result<File, LockError> {
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;

    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o600)
        .open(path)
        .map_err(|source| LockError::Io {
            path: path.display().to_string(),
            source,
        })?;

    // SAFETY: fd는 위에서 연 파일의 유효한 디스크립터이며 file이 살아있는 동안 유지됩니다.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::WouldBlock {
            return Err(LockError::Held {
                path: path.display().to_string(),
                holder: read_holder(path),
            });
        }
        return Err(LockError::Io {
            path: path.display().to_string(),
            source: err,
        });
    }
    Ok(file)
}

#[cfg(not(unix))]
fn open_and_lock(path: &Path) -> Result<File, LockError> {
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(LockError::Held {
            path: path.display().to_string(),
            holder: read_holder(path),
        }),
        Err(source) => Err(LockError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn write_holder(mut file: &File) -> std::io::Result<()> {
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    file.sync_all()
}

fn read_holder(path: &Path) -> String {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_owned())
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_owned())
}

#[cfg(not(unix))]
impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}
