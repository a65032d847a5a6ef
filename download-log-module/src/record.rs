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

use chrono::{DateTime, Utc};
use client_address_module::{classify, raw_client_address, ClientAddress};
use downloader_module_utils::pingora::SessionWrapper;
use http::header;

/// Everything recorded about a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLogRecord {
    /// Classified client address
    pub client_address: ClientAddress,
    /// Value of the `Referer` header if present
    pub referer: Option<String>,
    /// Time the request was received
    pub request_time: DateTime<Utc>,
    /// Request method, e.g. `GET`
    pub method: String,
    /// Request path including query string
    pub path: String,
    /// Protocol version, e.g. `HTTP/1.1`
    pub protocol: String,
    /// Response status code
    pub status: u16,
    /// Number of response body bytes actually sent
    pub bytes_sent: u64,
    /// Value of the `User-Agent` header, empty if missing
    pub user_agent: String,
}

impl DownloadLogRecord {
    /// Collects request data from the session. Status and byte count are passed in since these
    /// describe the outcome of the request as the handler saw it.
    pub fn from_session(
        session: &impl SessionWrapper,
        request_time: DateTime<Utc>,
        status: u16,
        bytes_sent: u64,
    ) -> Self {
        let header_str = |name| {
            session
                .get_header(&name)
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        };

        let req_header = session.req_header();
        Self {
            client_address: classify(&raw_client_address(session)),
            referer: header_str(header::REFERER).filter(|referer| !referer.is_empty()),
            request_time,
            method: req_header.method.as_str().to_owned(),
            path: req_header
                .uri
                .path_and_query()
                .map(|path| path.as_str())
                .unwrap_or("/")
                .to_owned(),
            protocol: format!("{:?}", req_header.version),
            status,
            bytes_sent,
            user_agent: header_str(header::USER_AGENT).unwrap_or_default(),
        }
    }
}
