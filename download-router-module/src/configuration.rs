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

//! Data structures required for `DownloadRouter` configuration

use serde::Deserialize;
use std::path::PathBuf;

/// The release advertised via `/currentrelease`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CurrentReleaseConf {
    /// Version number, e.g. `3.10.1`
    pub version: String,
    /// Address of the release notes
    pub notes_url: String,
}

impl Default for CurrentReleaseConf {
    fn default() -> Self {
        Self {
            version: "3.10.1".to_owned(),
            notes_url: "https://github.com/sqlitebrowser/sqlitebrowser/releases/tag/v3.10.1"
                .to_owned(),
        }
    }
}

/// Configuration file settings of the download router
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DownloadRouterConf {
    /// The current release.
    pub current_release: CurrentReleaseConf,

    /// Icon file served as `/favicon.ico`.
    pub favicon: Option<PathBuf>,

    /// Requests announcing a larger body are rejected.
    pub max_body_size: u64,
}

impl Default for DownloadRouterConf {
    fn default() -> Self {
        Self {
            current_release: Default::default(),
            favicon: None,
            max_body_size: 4096,
        }
    }
}
