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

//! In-memory artifact storage

use bytes::Bytes;
use downloader_module_utils::pingora::Error;
use log::{debug, info, warn};
use std::io;
use tokio::sync::OnceCell;

use crate::catalog::{Catalog, CatalogEntry};
use crate::configuration::ArtifactCacheConf;
use crate::provider::{ContentProvider, DirectoryProvider};

/// Result of an artifact lookup
#[derive(Debug, Clone)]
pub struct Artifact<'a> {
    /// The catalog entry of the artifact
    pub entry: &'a CatalogEntry,

    /// Contents of the artifact, `None` if it isn’t available
    pub content: Option<Bytes>,
}

/// Holds the contents of all catalog artifacts once loaded
#[derive(Debug)]
pub struct ArtifactCache {
    catalog: Catalog,
    slots: Vec<OnceCell<Bytes>>,
    provider: Box<dyn ContentProvider>,
}

impl TryFrom<ArtifactCacheConf> for ArtifactCache {
    type Error = Box<Error>;

    fn try_from(conf: ArtifactCacheConf) -> Result<Self, Self::Error> {
        let catalog = Catalog::from_conf(&conf.catalog)?;
        debug!(
            "Serving {} artifacts from {}",
            catalog.len(),
            conf.data_dir.display()
        );
        Ok(Self::new(catalog, DirectoryProvider::new(conf.data_dir)))
    }
}

impl ArtifactCache {
    /// Creates an empty cache for the given catalog. Nothing is read before the first fetch or
    /// [`ArtifactCache::populate_all`] call.
    pub fn new(catalog: Catalog, provider: impl ContentProvider + 'static) -> Self {
        let slots = catalog.entries().iter().map(|_| OnceCell::new()).collect();
        Self {
            catalog,
            slots,
            provider: Box::new(provider),
        }
    }

    /// The catalog of this cache
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn load(&self, index: usize) -> Option<Bytes> {
        let entry = self.catalog.entries().get(index)?;
        let slot = self.slots.get(index)?;
        let result = slot
            .get_or_try_init(|| async {
                let content = self.provider.read(entry.key()).await?;
                if content.is_empty() {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "file is empty"));
                }
                info!("Loaded {} ({} bytes)", entry.key(), content.len());
                Ok(content)
            })
            .await;

        match result {
            Ok(content) => Some(content.clone()),
            Err(err) => {
                warn!("Artifact {} is not available: {err}", entry.key());
                None
            }
        }
    }

    /// Looks up an artifact by its key and loads its contents if necessary. Returns `None` for
    /// keys not in the catalog.
    pub async fn fetch(&self, key: &str) -> Option<Artifact<'_>> {
        let (index, entry) = self.catalog.find(key)?;
        let content = self.load(index).await;
        Some(Artifact { entry, content })
    }

    /// Returns `true` if the artifact has been loaded already.
    pub fn is_ready(&self, key: &str) -> bool {
        self.catalog
            .find(key)
            .and_then(|(index, _)| self.slots.get(index))
            .is_some_and(OnceCell::initialized)
    }

    /// Attempts to load all artifacts not loaded yet. Returns the number of artifacts available.
    pub async fn populate_all(&self) -> usize {
        let mut available = 0;
        for index in 0..self.slots.len() {
            if self.load(index).await.is_some() {
                available += 1;
            }
        }
        info!(
            "{available} of {} artifacts available",
            self.catalog.len()
        );
        available
    }
}
