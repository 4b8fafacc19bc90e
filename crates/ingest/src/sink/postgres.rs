//! PostgreSQL 싱크
//!
//! 레코드를 `id`(레코드 키 지문) 기본 키를 가진 테이블에 배치 삽입합니다.
//! 한 배치는 하나의 트랜잭션으로 처리되며 `sink.chunk_size` 단위로 나누어
//! 다중 행 `INSERT ... ON CONFLICT (id) DO NOTHING`을 실행합니다.
//! 같은 배치를 다시 보내도 새 행이 생기지 않습니다.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};

use logloader_core::config::SinkConfig;
use logloader_core::error::SinkError;
use logloader_core::pipeline::{SinkWriter, WriteOutcome};
use logloader_core::types::{Column, ColumnType, FieldValue, StructuredRecord};

/// 키 컬럼 (매퍼 컬럼 앞에 위치)
const KEY_COLUMNS: &[&str] = &["id", "log_name", "source_generation", "source_offset"];

/// PostgreSQL 싱크
pub struct PostgresSink {
    pool: PgPool,
    table: String,
    columns: Vec<Column>,
    chunk_size: usize,
}

impl PostgresSink {
    /// 연결 풀을 만들고 대상 테이블을 준비합니다.
    ///
    /// `columns`는 매퍼의 [`columns()`](logloader_core::pipeline::RecordMapper::columns)입니다.
    pub async fn connect(config: &SinkConfig, columns: &[Column]) -> Result<Self, SinkError> {
        let options = connect_options(config)?;
        let timeout = Duration::from_secs(config.connect_timeout_secs);

        let pool = tokio::time::timeout(
            timeout,
            PgPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(timeout)
                .connect_with(options),
        )
        .await
        .map_err(|_| SinkError::Timeout {
            secs: config.connect_timeout_secs,
        })?
        .map_err(|e| SinkError::Connection(e.to_string()))?;

        tracing::info!(table = %config.table, "database connection established");

        let sink = Self {
            pool,
            table: config.table.clone(),
            columns: columns.to_vec(),
            chunk_size: config.chunk_size.max(1),
        };
        sink.ensure_table().await?;
        Ok(sink)
    }

    /// 테이블이 없으면 생성합니다.
    pub async fn ensure_table(&self) -> Result<(), SinkError> {
        let ddl = create_table_sql(&self.table, &self.columns);
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| SinkError::Schema(e.to_string()))?;
        tracing::debug!(table = %self.table, "table ensured");
        Ok(())
    }

    /// 연결 풀을 닫습니다.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert_batch(&self, batch: &[StructuredRecord]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for chunk in batch.chunks(self.chunk_size) {
            let mut query = QueryBuilder::<Postgres>::new(insert_prefix(&self.table, &self.columns));
            query.push_values(chunk, |mut row, record| {
                row.push_bind(record.key.fingerprint())
                    .push_bind(record.key.log_name.clone())
                    .push_bind(to_i64(record.key.generation))
                    .push_bind(to_i64(record.key.offset));

                for (column, value) in self.columns.iter().zip(&record.values) {
                    match (column.kind, value) {
                        // check_int_range를 통과한 값만 도달
                        (ColumnType::Int, FieldValue::Int(v)) => {
                            row.push_bind(v.and_then(|x| i32::try_from(x).ok()));
                        }
                        (_, FieldValue::Int(v)) => {
                            row.push_bind(*v);
                        }
                        (_, FieldValue::Text(v)) => {
                            row.push_bind(v.clone());
                        }
                        (_, FieldValue::Float(v)) => {
                            row.push_bind(*v);
                        }
                        (_, FieldValue::Timestamp(v)) => {
                            row.push_bind(*v);
                        }
                        (_, FieldValue::Json(v)) => {
                            row.push_bind(sqlx::types::Json(v.clone()));
                        }
                    }
                }
            });
            query.push(" ON CONFLICT (id) DO NOTHING");

            let result = query.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

impl SinkWriter for PostgresSink {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn write(&self, batch: &[StructuredRecord]) -> Result<WriteOutcome, SinkError> {
        if batch.is_empty() {
            return Ok(WriteOutcome::default());
        }

        check_int_range(&self.columns, batch)?;

        let inserted = self
            .insert_batch(batch)
            .await
            .map_err(|e| SinkError::Write(e.to_string()))?;

        let outcome = WriteOutcome {
            inserted,
            duplicates: (batch.len() as u64).saturating_sub(inserted),
        };
        tracing::debug!(
            table = %self.table,
            records = batch.len(),
            inserted = outcome.inserted,
            duplicates = outcome.duplicates,
            "batch written"
        );
        Ok(outcome)
    }
}

fn connect_options(config: &SinkConfig) -> Result<PgConnectOptions, SinkError> {
    if let Some(url) = config.database_url.as_deref().filter(|_| config.uses_url()) {
        return PgConnectOptions::from_str(url)
            .map_err(|e| SinkError::Connection(format!("invalid database_url: {e}")));
    }

    let missing = |field: &str| SinkError::Connection(format!("sink.{field} is not set"));
    let host = config.host.as_deref().ok_or_else(|| missing("host"))?;
    let dbname = config.dbname.as_deref().ok_or_else(|| missing("dbname"))?;
    let user = config.user.as_deref().ok_or_else(|| missing("user"))?;

    let mut options = PgConnectOptions::new()
        .host(host)
        .port(config.port)
        .database(dbname)
        .username(user);
    if let Some(password) = config.password.as_deref() {
        options = options.password(password);
    }
    Ok(options)
}

/// 테이블 생성 DDL
pub fn create_table_sql(table: &str, columns: &[Column]) -> String {
    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    \
         id TEXT PRIMARY KEY,\n    \
         log_name TEXT NOT NULL,\n    \
         source_generation BIGINT NOT NULL,\n    \
         source_offset BIGINT NOT NULL"
    );
    for column in columns {
        ddl.push_str(",\n    ");
        ddl.push_str(column.name);
        ddl.push(' ');
        ddl.push_str(sql_type(column.kind));
    }
    ddl.push_str("\n)");
    ddl
}

fn insert_prefix(table: &str, columns: &[Column]) -> String {
    let names: Vec<&str> = KEY_COLUMNS
        .iter()
        .copied()
        .chain(columns.iter().map(|c| c.name))
        .collect();
    format!("INSERT INTO {table} ({}) ", names.join(", "))
}

fn sql_type(kind: ColumnType) -> &'static str {
    match kind {
        ColumnType::Text => "TEXT",
        ColumnType::Int => "INTEGER",
        ColumnType::BigInt => "BIGINT",
        ColumnType::Float => "DOUBLE PRECISION",
        ColumnType::Timestamp => "TIMESTAMPTZ",
        ColumnType::Json => "JSONB",
    }
}

/// `INTEGER` 컬럼 값이 i32 범위인지 확인합니다.
///
/// 매퍼는 범위를 벗어난 값을 라인 단위로 거부해야 합니다. 여기까지 온 값은
/// NULL로 바꾸지 않고 배치 전체를 실패시킵니다.
fn check_int_range(columns: &[Column], batch: &[StructuredRecord]) -> Result<(), SinkError> {
    for record in batch {
        for (column, value) in columns.iter().zip(&record.values) {
            if let (ColumnType::Int, FieldValue::Int(Some(v))) = (column.kind, value) {
                if i32::try_from(*v).is_err() {
                    return Err(SinkError::Write(format!(
                        "value {v} out of range for INTEGER column {} (offset {} of {})",
                        column.name, record.key.offset, record.key.log_name
                    )));
                }
            }
        }
    }
    Ok(())
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
