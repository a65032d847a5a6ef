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

//! Handler for Pingora’s `request_filter` and `logging` phases

use artifact_cache_module::{ArtifactCache, CatalogEntry};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use download_log_module::{DownloadLogRecord, DownloadLogSink};
use downloader_module_utils::pingora::{Error, ResponseHeader, SessionWrapper};
use downloader_module_utils::standard_response::{error_response, response, text_response};
use downloader_module_utils::RequestFilter;
use http::{header, Method, StatusCode};
use log::{debug, warn};
use percent_encoding::percent_decode_str;

use crate::configuration::DownloadRouterConf;
use crate::index::render_index;

const CHUNK_SIZE: usize = 64 * 1024;

/// Status and number of body bytes of the response sent
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Outcome {
    status: u16,
    bytes_sent: u64,
}

impl Outcome {
    fn new(status: StatusCode, bytes_sent: usize) -> Self {
        Self {
            status: status.as_u16(),
            bytes_sent: bytes_sent as u64,
        }
    }
}

/// Per-request state of the download router
#[derive(Debug)]
pub struct RouterCtx {
    request_time: DateTime<Utc>,
    outcome: Option<Outcome>,
}

/// Handler for download server requests
#[derive(Debug)]
pub struct DownloadRouter {
    cache: ArtifactCache,
    sink: DownloadLogSink,
    release: Bytes,
    index_page: Bytes,
    favicon: Option<Bytes>,
    max_body_size: u64,
}

impl DownloadRouter {
    /// Creates a router serving the artifacts of the given cache and recording requests in the
    /// given sink. The index page is rendered and the favicon loaded here.
    pub fn new(
        conf: DownloadRouterConf,
        cache: ArtifactCache,
        sink: DownloadLogSink,
    ) -> Self {
        let release = format!(
            "{}\n{}\n",
            conf.current_release.version, conf.current_release.notes_url
        );
        let index_page = render_index(cache.catalog(), &conf.current_release);

        let favicon = conf.favicon.and_then(|path| match std::fs::read(&path) {
            Ok(data) => Some(Bytes::from(data)),
            Err(err) => {
                warn!("Failed reading favicon {}: {err}", path.display());
                None
            }
        });

        Self {
            cache,
            sink,
            release: release.into(),
            index_page: index_page.into(),
            favicon,
            max_body_size: conf.max_body_size,
        }
    }

    fn body_too_large(&self, session: &impl SessionWrapper) -> bool {
        session
            .get_header(&header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .is_some_and(|length| length > self.max_body_size)
    }

    async fn serve_artifact(
        &self,
        session: &mut impl SessionWrapper,
        entry: &CatalogEntry,
        content: Bytes,
        ctx: &mut RouterCtx,
    ) -> Result<(), Box<Error>> {
        // Anything going wrong from here on counts as a failed transfer
        ctx.outcome = Some(Outcome::new(StatusCode::BAD_REQUEST, 0));

        let mut header = ResponseHeader::build(StatusCode::OK, Some(4))?;
        header.append_header(header::LAST_MODIFIED, entry.last_modified_http())?;
        header.append_header(header::CONTENT_DISPOSITION, entry.content_disposition())?;
        header.append_header(header::CONTENT_TYPE, "application/octet-stream")?;
        header.append_header(header::CONTENT_LENGTH, content.len().to_string())?;

        let send_body = session.req_header().method != Method::HEAD;
        session
            .write_response_header(Box::new(header), !send_body)
            .await?;

        let mut sent = 0;
        if send_body {
            while sent < content.len() {
                let end = (sent + CHUNK_SIZE).min(content.len());
                let chunk = content.slice(sent..end);
                if let Err(err) = session
                    .write_response_body(Some(chunk), end == content.len())
                    .await
                {
                    warn!(
                        "Error serving {} after {sent} bytes: {err}",
                        entry.key()
                    );
                    ctx.outcome = Some(Outcome::new(StatusCode::BAD_REQUEST, sent));
                    return Err(err);
                }
                sent = end;
            }
        }

        ctx.outcome = Some(Outcome::new(StatusCode::OK, sent));
        Ok(())
    }

    async fn route(
        &self,
        session: &mut impl SessionWrapper,
        ctx: &mut RouterCtx,
    ) -> Result<(), Box<Error>> {
        let method = session.req_header().method.clone();
        if method != Method::GET && method != Method::HEAD {
            debug!("Rejecting {method} request");
            let sent = error_response(session, StatusCode::METHOD_NOT_ALLOWED).await?;
            ctx.outcome = Some(Outcome::new(StatusCode::METHOD_NOT_ALLOWED, sent));
            return Ok(());
        }

        if self.body_too_large(session) {
            debug!(
                "Rejecting request with a body exceeding {} bytes",
                self.max_body_size
            );
            let sent = error_response(session, StatusCode::PAYLOAD_TOO_LARGE).await?;
            ctx.outcome = Some(Outcome::new(StatusCode::PAYLOAD_TOO_LARGE, sent));
            return Ok(());
        }

        let path = session.req_header().uri.path();
        let path = percent_decode_str(path).decode_utf8_lossy().into_owned();

        let (status, sent) = match path.as_str() {
            "/" | "" => {
                let sent = response(
                    session,
                    StatusCode::OK,
                    "text/html; charset=utf-8",
                    self.index_page.clone(),
                )
                .await?;
                (StatusCode::OK, sent)
            }
            "/currentrelease" => {
                let sent = response(
                    session,
                    StatusCode::OK,
                    "text/plain; charset=utf-8",
                    self.release.clone(),
                )
                .await?;
                (StatusCode::OK, sent)
            }
            "/favicon.ico" if self.favicon.is_some() => {
                let favicon = self.favicon.clone().unwrap_or_default();
                let sent = response(session, StatusCode::OK, "image/x-icon", favicon).await?;
                (StatusCode::OK, sent)
            }
            path => {
                // Only a single leading slash separates the artifact name
                let artifact = match path.strip_prefix('/') {
                    Some(key) => self.cache.fetch(key).await,
                    None => None,
                };
                match artifact {
                    Some(artifact) => match artifact.content {
                        Some(content) => {
                            return self
                                .serve_artifact(session, artifact.entry, content, ctx)
                                .await
                        }
                        None => {
                            let sent = text_response(
                                session,
                                StatusCode::NOT_FOUND,
                                "Not yet available",
                            )
                            .await?;
                            (StatusCode::NOT_FOUND, sent)
                        }
                    },
                    None => {
                        debug!("Unknown file requested: {path}");
                        let sent = text_response(
                            session,
                            StatusCode::NOT_FOUND,
                            "Unknown file requested",
                        )
                        .await?;
                        (StatusCode::NOT_FOUND, sent)
                    }
                }
            }
        };

        ctx.outcome = Some(Outcome::new(status, sent));
        Ok(())
    }
}

#[async_trait]
impl RequestFilter for DownloadRouter {
    type CTX = RouterCtx;

    fn new_ctx() -> Self::CTX {
        RouterCtx {
            request_time: Utc::now(),
            outcome: None,
        }
    }

    async fn request_filter(
        &self,
        session: &mut impl SessionWrapper,
        ctx: &mut Self::CTX,
    ) -> Result<(), Box<Error>> {
        self.route(session, ctx).await
    }

    async fn logging(
        &self,
        session: &mut impl SessionWrapper,
        _e: Option<&Error>,
        ctx: &mut Self::CTX,
    ) {
        let outcome = ctx.outcome.unwrap_or_else(|| Outcome {
            status: session
                .response_written()
                .map_or(500, |header| header.status.as_u16()),
            bytes_sent: session.body_bytes_sent() as u64,
        });

        let record = DownloadLogRecord::from_session(
            &*session,
            ctx.request_time,
            outcome.status,
            outcome.bytes_sent,
        );
        self.sink.record(&record).await;
    }
}
