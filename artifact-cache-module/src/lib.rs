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

//! # Artifact Cache Module
//!
//! This crate keeps the downloadable artifacts in memory. The set of artifacts is fixed at
//! startup: a [`Catalog`] lists them along with the HTTP metadata to be sent with each one
//! (`Last-Modified` and `Content-Disposition` headers are precomputed).
//!
//! The [`ArtifactCache`] holds one slot per catalog entry. A slot is filled at most once, by
//! reading the file from a [`ContentProvider`]. Normally all slots are filled at startup via
//! [`ArtifactCache::populate_all`], a request for an artifact that isn’t loaded yet will retry
//! the read. Once loaded, the contents never change.
//!
//! An artifact that cannot be read (missing or empty file) is reported as not available, this
//! is a valid state rather than an error.
//!
//! ```rust
//! use artifact_cache_module::{ArtifactCache, ArtifactCacheConf};
//! use downloader_module_utils::FromYaml;
//!
//! let conf = ArtifactCacheConf::from_yaml(r#"
//!     data_dir: /srv/downloads
//!     catalog:
//!       - file: app-1.0.exe
//!         name: App 1.0 for Windows
//!         last_modified: 2024-03-01T12:00:00Z
//! "#).unwrap();
//! let cache = ArtifactCache::try_from(conf).unwrap();
//! assert!(cache.catalog().find("app-1.0.exe").is_some());
//! ```

mod cache;
mod catalog;
mod configuration;
mod provider;

pub use cache::{Artifact, ArtifactCache};
pub use catalog::{Catalog, CatalogEntry};
pub use configuration::{ArtifactCacheConf, ArtifactCacheOpt, CatalogEntryConf};
pub use provider::{ContentProvider, DirectoryProvider};
