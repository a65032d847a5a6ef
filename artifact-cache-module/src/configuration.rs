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

//! Data structures required for `ArtifactCache` configuration

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command line options of the artifact cache module
#[derive(Debug, Default, Parser)]
pub struct ArtifactCacheOpt {
    /// The directory containing the downloadable artifacts.
    #[clap(long)]
    pub data_dir: Option<PathBuf>,
}

/// A catalog entry as listed in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntryConf {
    /// File name within the data directory, also the URL path the artifact is served under.
    pub file: String,

    /// Modification time to be reported for the artifact, in RFC 3339 format.
    pub last_modified: DateTime<Utc>,

    /// Human-readable name of the artifact, defaults to the file name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Configuration file settings of the artifact cache module
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArtifactCacheConf {
    /// The directory containing the downloadable artifacts.
    pub data_dir: PathBuf,

    /// The downloadable artifacts. If empty, the built-in catalog is used.
    pub catalog: Vec<CatalogEntryConf>,
}

impl ArtifactCacheConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: ArtifactCacheOpt) {
        if let Some(data_dir) = opt.data_dir {
            self.data_dir = data_dir;
        }
    }
}

impl Default for ArtifactCacheConf {
    fn default() -> Self {
        Self {
            data_dir: ".".into(),
            catalog: Vec::new(),
        }
    }
}
