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

//! Selection of the log backend and writing records to it

use log::{debug, error, info, trace, warn};
use std::time::Instant;
use tokio::sync::OnceCell;

use crate::configuration::DownloadLogConf;
use crate::record::DownloadLogRecord;
use crate::store::{LogStore, PostgresStore, SqliteStore};

/// The log backend in use, determined once and kept for the lifetime of the sink
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum LogBackendState {
    /// Records go to the primary (PostgreSQL) store
    Primary,
    /// The primary store was unavailable, records go to the fallback (SQLite) store
    Fallback,
    /// Neither store was available, records are discarded
    Disabled,
}

#[derive(Debug)]
struct LogBackend {
    state: LogBackendState,
    store: Option<Box<dyn LogStore>>,
}

impl LogBackend {
    async fn select(conf: &DownloadLogConf) -> Self {
        if let Some(postgres) = &conf.postgres {
            match PostgresStore::connect(postgres).await {
                Ok(store) => {
                    info!("Recording downloads in PostgreSQL database");
                    return Self {
                        state: LogBackendState::Primary,
                        store: Some(Box::new(store)),
                    };
                }
                Err(err) => warn!("PostgreSQL unavailable, trying fallback: {err}"),
            }
        } else {
            info!("No PostgreSQL server configured");
        }

        if let Some(sqlite_file) = &conf.sqlite_file {
            match SqliteStore::open(sqlite_file).await {
                Ok(store) => {
                    info!("Recording downloads in SQLite database");
                    return Self {
                        state: LogBackendState::Fallback,
                        store: Some(Box::new(store)),
                    };
                }
                Err(err) => warn!("SQLite unavailable: {err}"),
            }
        }

        error!("No log backend available, downloads will not be recorded");
        Self {
            state: LogBackendState::Disabled,
            store: None,
        }
    }
}

/// Writes download records to the first backend found available
///
/// Creating the sink doesn’t connect to anything. The backend is selected on first use, database
/// connections are tied to the runtime this happens in.
#[derive(Debug)]
pub struct DownloadLogSink {
    conf: DownloadLogConf,
    backend: OnceCell<LogBackend>,
}

impl DownloadLogSink {
    /// Creates a sink for the configured stores: PostgreSQL first, SQLite if that fails. If
    /// neither store is available, logging is disabled. This never fails, serving downloads
    /// doesn’t depend on logging.
    pub fn new(conf: DownloadLogConf) -> Self {
        Self {
            conf,
            backend: OnceCell::new(),
        }
    }

    fn with_backend(state: LogBackendState, store: Option<Box<dyn LogStore>>) -> Self {
        Self {
            conf: DownloadLogConf::default(),
            backend: OnceCell::new_with(Some(LogBackend { state, store })),
        }
    }

    /// Creates a sink writing to the primary store.
    pub fn primary(store: impl LogStore + 'static) -> Self {
        Self::with_backend(LogBackendState::Primary, Some(Box::new(store)))
    }

    /// Creates a sink writing to the fallback store.
    pub fn fallback(store: impl LogStore + 'static) -> Self {
        Self::with_backend(LogBackendState::Fallback, Some(Box::new(store)))
    }

    /// Creates a sink discarding all records.
    pub fn disabled() -> Self {
        Self::with_backend(LogBackendState::Disabled, None)
    }

    async fn backend(&self) -> &LogBackend {
        self.backend
            .get_or_init(|| async {
                let start = Instant::now();
                let backend = LogBackend::select(&self.conf).await;
                debug!(
                    "Selected log backend {:?} in {:?}",
                    backend.state,
                    start.elapsed()
                );
                backend
            })
            .await
    }

    /// Writes a record to the selected backend. Errors are logged but never returned.
    pub async fn record(&self, record: &DownloadLogRecord) {
        let Some(store) = &self.backend().await.store else {
            trace!("Logging disabled, discarding record for {}", record.path);
            return;
        };

        let start = Instant::now();
        match store.insert(record).await {
            Ok(1) => trace!(
                "Recorded {} {} {} in {:?}",
                record.method,
                record.path,
                record.status,
                start.elapsed()
            ),
            Ok(rows) => error!(
                "Recording download of {} affected {rows} rows instead of one",
                record.path
            ),
            Err(err) => error!("Failed recording download of {}: {err}", record.path),
        }
    }
}
