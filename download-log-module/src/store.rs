// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Persistence backends for download records

use async_trait::async_trait;
use downloader_module_utils::pingora::{Error, ErrorType};
use log::info;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use crate::configuration::PostgresConf;
use crate::record::DownloadLogRecord;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const POSTGRES_INSERT: &str = "
    INSERT INTO download_log (
        client_ipv4, client_ipv6, client_ip_strange, client_port, remote_user, request_time,
        request_type, request, protocol, status, body_bytes_sent, http_referer, http_user_agent)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)";

const SQLITE_INSERT: &str = "
    INSERT INTO download_log (
        client_ipv4, client_ipv6, client_ip_strange, client_port, remote_user, request_time,
        request_type, request, protocol, status, body_bytes_sent, http_referer, http_user_agent)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const SQLITE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS download_log (
        download_id INTEGER PRIMARY KEY,
        remote_user text,
        request_time timestamp with time zone,
        request_type text,
        request text,
        protocol text,
        status integer,
        body_bytes_sent bigint,
        http_referer text,
        http_user_agent text,
        client_ipv4 text,
        client_ipv6 text,
        client_ip_strange text,
        client_port integer
    )";

// Both backends share the column order of the insert statements above.
macro_rules! bind_record {
    ($query:expr, $record:expr) => {{
        let record: &DownloadLogRecord = $record;
        $query
            .bind(record.client_address.ipv4())
            .bind(record.client_address.ipv6())
            .bind(record.client_address.strange())
            .bind(record.client_address.port().map(i32::from))
            .bind(None::<String>)
            .bind(record.request_time)
            .bind(record.method.as_str())
            .bind(record.path.as_str())
            .bind(record.protocol.as_str())
            .bind(i32::from(record.status))
            .bind(i64::try_from(record.bytes_sent).unwrap_or(i64::MAX))
            .bind(record.referer.as_deref())
            .bind(record.user_agent.as_str())
    }};
}

/// A store download records can be written to
#[async_trait]
pub trait LogStore: Debug + Send + Sync {
    /// Inserts a record, returning the number of rows affected.
    async fn insert(&self, record: &DownloadLogRecord) -> Result<u64, Box<Error>>;
}

/// The primary store: a PostgreSQL database with an existing `download_log` table
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects to the PostgreSQL server. This fails if no connection can be established.
    pub async fn connect(conf: &PostgresConf) -> Result<Self, Box<Error>> {
        let options = PgConnectOptions::new()
            .host(&conf.server)
            .port(conf.port)
            .username(&conf.username)
            .password(&conf.password)
            .database(&conf.database)
            .ssl_mode(if conf.ssl {
                PgSslMode::Require
            } else {
                PgSslMode::Disable
            });

        let pool = PgPoolOptions::new()
            .max_connections(conf.num_connections.max(1))
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|err| {
                Error::because(
                    ErrorType::ConnectError,
                    format!(
                        "failed connecting to PostgreSQL server {}:{}",
                        conf.server, conf.port
                    ),
                    err,
                )
            })?;
        info!(
            "Connected to PostgreSQL server {}:{}",
            conf.server, conf.port
        );

        Ok(Self { pool })
    }
}

#[async_trait]
impl LogStore for PostgresStore {
    async fn insert(&self, record: &DownloadLogRecord) -> Result<u64, Box<Error>> {
        let result = bind_record!(sqlx::query(POSTGRES_INSERT), record)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                Error::because(ErrorType::WriteError, "failed recording download", err)
            })?;
        Ok(result.rows_affected())
    }
}

/// The fallback store: a local SQLite database, the table is created if necessary
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens or creates the SQLite database and makes sure the `download_log` table exists.
    pub async fn open(path: &Path) -> Result<Self, Box<Error>> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|err| {
                Error::because(
                    ErrorType::ConnectError,
                    format!("failed opening SQLite database {}", path.display()),
                    err,
                )
            })?;

        sqlx::query(SQLITE_SCHEMA)
            .execute(&pool)
            .await
            .map_err(|err| {
                Error::because(
                    ErrorType::WriteError,
                    "failed creating the download_log table",
                    err,
                )
            })?;
        info!("Opened SQLite database {}", path.display());

        Ok(Self { pool })
    }
}

#[async_trait]
impl LogStore for SqliteStore {
    async fn insert(&self, record: &DownloadLogRecord) -> Result<u64, Box<Error>> {
        let result = bind_record!(sqlx::query(SQLITE_INSERT), record)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                Error::because(ErrorType::WriteError, "failed recording download", err)
            })?;
        Ok(result.rows_affected())
    }
}
