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

//! # Download Log Module
//!
//! This crate records one row per request in a `download_log` database table, for usage
//! analytics. A configuration could look like this:
//!
//! ```yaml
//! postgres:
//!     server: db.example.com
//!     port: 5432
//!     database: downloads
//!     username: downloader
//!     password: secret
//!     ssl: true
//!     num_connections: 5
//! sqlite_file: /var/lib/downloader/downloads.sqlite
//! ```
//!
//! The `sqlite_file` field is also available as `--sqlite-file` command line option.
//!
//! [`DownloadLogSink`] determines the backend to be used when the first request is recorded:
//!
//! 1. If a PostgreSQL server is configured and a connection can be established, records go there.
//!    The `download_log` table has to exist already.
//! 2. Otherwise, if an SQLite database is configured, it is opened (created if necessary) along
//!    with the `download_log` table.
//! 3. Otherwise no records are written.
//!
//! The backend isn’t changed afterwards. Failing to record a download is logged but
//! never affects the response to the client.
//!
//! The stored client address is classified by the `client-address-module` crate: exactly one of
//! the `client_ipv4`, `client_ipv6` and `client_ip_strange` columns is set (or none if the address
//! is unknown).

mod configuration;
mod record;
mod sink;
mod store;

pub use configuration::{DownloadLogConf, DownloadLogOpt, PostgresConf};
pub use record::DownloadLogRecord;
pub use sink::DownloadLogSink;
pub use store::{LogStore, PostgresStore, SqliteStore};
