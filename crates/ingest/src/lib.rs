//! logloader 수집 엔진
//!
//! append 전용이며 주기적으로 로테이션되는 텍스트 로그 파일을 증분 수집합니다.
//! 실행마다 어떤 파일의 어떤 바이트가 새로운지 결정하고, 그 범위만 읽어
//! 구조화 레코드로 변환한 뒤 싱크에 저장하고, 성공한 경우에만 커서를 전진시킵니다.
//!
//! # 모듈 구성
//!
//! - [`identity`]: 파일 식별자(device + inode) 조회
//! - [`discovery`]: 패턴 매칭 대상 파일 탐색, 로테이션된 파일 찾기
//! - [`state`]: 상태 스냅샷 로드/원자적 저장
//! - [`lock`]: 동시 실행 방지 잠금
//! - [`reconcile`]: 커서와 파일 상태를 비교하여 읽기 계획 수립
//! - [`reader`]: 계획된 바이트 범위 읽기와 라인 분할
//! - [`mapper`]: 로그 형식별 레코드 매퍼
//! - [`sink`]: PostgreSQL / 인메모리 싱크
//! - [`controller`]: 한 번의 실행 조율
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! RunLock -> StateStore::load -> discover -> reconcile -> read_segment -> RecordMapper
//!                                                                              |
//!           StateStore::persist <- commit cursors <- SinkWriter::write <-------+
//! ```

pub mod controller;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod lock;
pub mod mapper;
pub mod reader;
pub mod reconcile;
pub mod sink;
pub mod state;

// --- 주요 타입 re-export ---

// 컨트롤러
pub use controller::{ControllerOptions, RunController, RunPhase, RunReport, SkippedTarget, TargetReport};

// 에러
pub use error::IngestError;

// 상태/잠금
pub use lock::RunLock;
pub use state::{StateSnapshot, StateStore};

// 조정/읽기
pub use reader::{PartialTail, Segment};
pub use reconcile::{Decision, ReadPlan, ReadSegment};

// 매퍼/싱크
pub use mapper::build_mapper;
pub use sink::{MemorySink, PostgresSink};
