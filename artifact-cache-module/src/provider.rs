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

//! Sources of artifact contents

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;
use std::io;
use std::path::PathBuf;

/// Reads the full contents of an artifact
#[async_trait]
pub trait ContentProvider: Debug + Send + Sync {
    /// Reads the artifact with the given file name.
    async fn read(&self, file: &str) -> io::Result<Bytes>;
}

/// Reads artifacts from a directory on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    /// Creates a provider reading files from the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContentProvider for DirectoryProvider {
    async fn read(&self, file: &str) -> io::Result<Bytes> {
        tokio::fs::read(self.root.join(file)).await.map(Bytes::from)
    }
}
