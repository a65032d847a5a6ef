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

//! The catalog of downloadable artifacts

use chrono::{DateTime, SecondsFormat, Utc};
use downloader_module_utils::pingora::{Error, ErrorType};
use httpdate::fmt_http_date;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use crate::configuration::CatalogEntryConf;

// Characters left alone by query string escaping
const FILENAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A downloadable artifact along with its precomputed metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    key: String,
    display_name: String,
    last_modified: DateTime<Utc>,
    last_modified_http: String,
    content_disposition: String,
}

impl CatalogEntry {
    /// Creates a new entry for the given file name. The file name is also the URL path segment
    /// the artifact is served under.
    pub fn new(
        file: impl Into<String>,
        display_name: Option<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        let key = file.into();
        let display_name = display_name.unwrap_or_else(|| key.clone());
        let last_modified_http = fmt_http_date(SystemTime::from(last_modified));
        let content_disposition = format!(
            "attachment; filename=\"{}\"; modification-date=\"{}\";",
            utf8_percent_encode(&key, FILENAME),
            last_modified.to_rfc3339_opts(SecondsFormat::Secs, true)
        );

        Self {
            key,
            display_name,
            last_modified,
            last_modified_http,
            content_disposition,
        }
    }

    /// File name of the artifact, also its URL path segment
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Human-readable name of the artifact
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Modification time of the artifact
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Modification time formatted for the `Last-Modified` header
    pub fn last_modified_http(&self) -> &str {
        &self.last_modified_http
    }

    /// Value of the `Content-Disposition` header
    pub fn content_disposition(&self) -> &str {
        &self.content_disposition
    }
}

/// Paths the router answers itself, never looked up in the catalog
const RESERVED_NAMES: [&str; 2] = ["currentrelease", "favicon.ico"];

/// The fixed set of artifacts known to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

fn builtin_entry(file: &str, name: &str, timestamp: u64) -> CatalogEntry {
    let last_modified = SystemTime::UNIX_EPOCH + Duration::from_secs(timestamp);
    CatalogEntry::new(file, Some(name.to_owned()), last_modified.into())
}

impl Catalog {
    /// Creates a catalog from a list of entries. Entry keys have to be unique and usable as file
    /// names within the data directory. `currentrelease` and `favicon.ico` are reserved.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, Box<Error>> {
        let mut seen = HashSet::new();
        for entry in &entries {
            let key = entry.key();
            if key.is_empty()
                || key == "."
                || key == ".."
                || key.contains(['/', '\\'])
            {
                return Err(Error::explain(
                    ErrorType::InternalError,
                    format!("invalid artifact file name {key:?}"),
                ));
            }

            if RESERVED_NAMES.contains(&key) {
                return Err(Error::explain(
                    ErrorType::InternalError,
                    format!("artifact file name {key:?} is reserved"),
                ));
            }

            if !seen.insert(key) {
                return Err(Error::explain(
                    ErrorType::InternalError,
                    format!("duplicate artifact file name {key:?}"),
                ));
            }
        }

        Ok(Self { entries })
    }

    /// Creates a catalog from configuration. An empty list selects the built-in catalog.
    pub fn from_conf(conf: &[CatalogEntryConf]) -> Result<Self, Box<Error>> {
        if conf.is_empty() {
            return Ok(Self::builtin());
        }

        Self::new(
            conf.iter()
                .map(|entry| {
                    CatalogEntry::new(&entry.file, entry.name.clone(), entry.last_modified)
                })
                .collect(),
        )
    }

    /// The DB Browser for SQLite 3.10.1 release artifacts. The modification times are those of
    /// the files originally published.
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                builtin_entry(
                    "DB.Browser.for.SQLite-3.10.1-win32.exe",
                    "DB Browser for SQLite 3.10.1 for Windows (32-bit)",
                    1505919584,
                ),
                builtin_entry(
                    "DB.Browser.for.SQLite-3.10.1-win64.exe",
                    "DB Browser for SQLite 3.10.1 for Windows (64-bit)",
                    1505919599,
                ),
                builtin_entry(
                    "DB.Browser.for.SQLite-3.10.1.dmg",
                    "DB Browser for SQLite 3.10.1 for macOS",
                    1505921007,
                ),
                builtin_entry(
                    "SQLiteDatabaseBrowserPortable_3.10.1_English.paf.exe",
                    "DB Browser for SQLite 3.10.1 PortableApp",
                    1506627168,
                ),
            ],
        }
    }

    /// All entries in catalog order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up an entry by its key, returning its index and the entry.
    pub fn find(&self, key: &str) -> Option<(usize, &CatalogEntry)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.key == key)
    }
}
