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


#![doc = include_str!("../README.md")]

mod configuration;

use async_trait::async_trait;
pub use configuration::{StartupConf, StartupOpt, TlsConf};
use downloader_module_utils::pingora::{Error, ErrorType, HttpPeer, ProxyHttp, Session};
use downloader_module_utils::RequestFilter;

/// A basic Pingora app implementation, to be passed to [`StartupConf::into_server`]
///
/// This app will only handle the `request_filter` and `logging` phases, both delegated to the
/// respective `RequestFilter` methods. The handler always sends a response during
/// `request_filter` phase, so Pingora never asks for an upstream peer.
#[derive(Debug)]
pub struct DefaultApp<H> {
    handler: H,
}

impl<H> DefaultApp<H> {
    /// Creates a new app from a [`RequestFilter`] instance.
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<H> ProxyHttp for DefaultApp<H>
where
    H: RequestFilter + Send + Sync,
    H::CTX: Send + Sync,
{
    type CTX = H::CTX;

    fn new_ctx(&self) -> Self::CTX {
        H::new_ctx()
    }

    async fn request_filter(
        &self,
        session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<bool, Box<Error>> {
        self.handler.request_filter(session, ctx).await?;
        Ok(true)
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>, Box<Error>> {
        Err(Error::explain(
            ErrorType::InternalError,
            "request_filter phase completed without a response",
        ))
    }

    async fn logging(&self, session: &mut Session, e: Option<&Error>, ctx: &mut Self::CTX) {
        self.handler.logging(session, e, ctx).await
    }
}
