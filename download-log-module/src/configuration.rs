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

//! Structures handling command line options and YAML deserialization for the Download Log Module

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command line options of the download log module
#[derive(Debug, Default, Parser)]
pub struct DownloadLogOpt {
    /// SQLite database to record downloads in if PostgreSQL is unavailable
    #[clap(long)]
    pub sqlite_file: Option<PathBuf>,
}

/// Connection parameters of the PostgreSQL server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PostgresConf {
    /// Host name or IP address of the server
    pub server: String,
    /// Port of the server
    pub port: u16,
    /// Name of the database
    pub database: String,
    /// User name to authenticate with
    pub username: String,
    /// Password to authenticate with
    pub password: String,
    /// Whether to require an encrypted connection
    pub ssl: bool,
    /// Maximal number of connections in the pool
    pub num_connections: u32,
}

impl Default for PostgresConf {
    fn default() -> Self {
        Self {
            server: "localhost".to_owned(),
            port: 5432,
            database: String::new(),
            username: String::new(),
            password: String::new(),
            ssl: false,
            num_connections: 5,
        }
    }
}

/// Configuration file settings of the download log module
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DownloadLogConf {
    /// The primary log store. Without it, the fallback store is used.
    pub postgres: Option<PostgresConf>,

    /// The fallback log store, created if necessary. If neither store is available, downloads
    /// aren’t recorded.
    pub sqlite_file: Option<PathBuf>,
}

impl DownloadLogConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: DownloadLogOpt) {
        if opt.sqlite_file.is_some() {
            self.sqlite_file = opt.sqlite_file;
        }
    }
}
