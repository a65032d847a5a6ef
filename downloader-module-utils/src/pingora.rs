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

//! Exposes some types from the `pingora` crate, so that typical modules no longer need it as a
//! direct dependency.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::{HeaderName, HeaderValue};
pub use pingora::http::{RequestHeader, ResponseHeader};
pub use pingora::protocols::http::ServerSession;
pub use pingora::protocols::l4::socket::SocketAddr;
pub use pingora::proxy::{http_proxy_service, ProxyHttp, Session};
pub use pingora::server::configuration::{Opt as ServerOpt, ServerConf};
pub use pingora::server::Server;
pub use pingora::upstreams::peer::HttpPeer;
pub use pingora::{Error, ErrorType};
use std::borrow::Cow;

/// The part of a request session that handlers interact with
///
/// This is implemented for Pingora’s [`Session`] and for [`TestSession`], the latter allowing
/// handlers to be tested without a network connection.
#[async_trait]
pub trait SessionWrapper: Send {
    /// Returns the request header.
    fn req_header(&self) -> &RequestHeader;

    /// Returns the value of a request header if present.
    fn get_header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.req_header().headers.get(name)
    }

    /// Returns the client (peer) address of the connection.
    fn client_addr(&self) -> Option<&SocketAddr>;

    /// Returns the response header if one has been written already.
    fn response_written(&self) -> Option<&ResponseHeader>;

    /// Returns the number of response body bytes written so far.
    fn body_bytes_sent(&self) -> usize;

    /// Writes the response header. If `end_of_stream` is `true`, no response body will follow.
    async fn write_response_header(
        &mut self,
        resp: Box<ResponseHeader>,
        end_of_stream: bool,
    ) -> Result<(), Box<Error>>;

    /// Writes a chunk of the response body. `end_of_stream` marks the last chunk.
    async fn write_response_body(
        &mut self,
        data: Option<Bytes>,
        end_of_stream: bool,
    ) -> Result<(), Box<Error>>;
}

#[async_trait]
impl SessionWrapper for Session {
    fn req_header(&self) -> &RequestHeader {
        let downstream: &ServerSession = self;
        downstream.req_header()
    }

    fn client_addr(&self) -> Option<&SocketAddr> {
        let downstream: &ServerSession = self;
        downstream.client_addr()
    }

    fn response_written(&self) -> Option<&ResponseHeader> {
        let downstream: &ServerSession = self;
        downstream.response_written()
    }

    fn body_bytes_sent(&self) -> usize {
        let downstream: &ServerSession = self;
        downstream.body_bytes_sent()
    }

    async fn write_response_header(
        &mut self,
        resp: Box<ResponseHeader>,
        end_of_stream: bool,
    ) -> Result<(), Box<Error>> {
        Session::write_response_header(self, resp, end_of_stream).await
    }

    async fn write_response_body(
        &mut self,
        data: Option<Bytes>,
        end_of_stream: bool,
    ) -> Result<(), Box<Error>> {
        Session::write_response_body(self, data, end_of_stream).await
    }
}

/// A session keeping the response in memory, meant for tests
///
/// Optionally, writing the response body can be made to fail after a given number of bytes,
/// simulating a client aborting the download.
#[derive(Debug)]
pub struct TestSession {
    req_header: RequestHeader,
    client_addr: Option<SocketAddr>,
    response_header: Option<ResponseHeader>,
    body: BytesMut,
    write_limit: Option<usize>,
}

impl From<RequestHeader> for TestSession {
    fn from(req_header: RequestHeader) -> Self {
        Self {
            req_header,
            client_addr: None,
            response_header: None,
            body: BytesMut::new(),
            write_limit: None,
        }
    }
}

impl TestSession {
    /// Sets the client address of the connection.
    pub fn set_client_addr(&mut self, addr: SocketAddr) {
        self.client_addr = Some(addr);
    }

    /// Returns a mutable reference to the request header, e.g. to add headers.
    pub fn req_header_mut(&mut self) -> &mut RequestHeader {
        &mut self.req_header
    }

    /// Makes response body writes fail once more than `limit` bytes would have been written.
    pub fn fail_writes_after(&mut self, limit: usize) {
        self.write_limit = Some(limit);
    }

    /// Retrieves the response body written so far
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Retrieves the response body written so far as string
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[async_trait]
impl SessionWrapper for TestSession {
    fn req_header(&self) -> &RequestHeader {
        &self.req_header
    }

    fn client_addr(&self) -> Option<&SocketAddr> {
        self.client_addr.as_ref()
    }

    fn response_written(&self) -> Option<&ResponseHeader> {
        self.response_header.as_ref()
    }

    fn body_bytes_sent(&self) -> usize {
        self.body.len()
    }

    async fn write_response_header(
        &mut self,
        resp: Box<ResponseHeader>,
        _end_of_stream: bool,
    ) -> Result<(), Box<Error>> {
        if self.response_header.is_some() {
            return Err(Error::explain(
                ErrorType::InternalError,
                "response header already written",
            ));
        }
        self.response_header = Some(*resp);
        Ok(())
    }

    async fn write_response_body(
        &mut self,
        data: Option<Bytes>,
        _end_of_stream: bool,
    ) -> Result<(), Box<Error>> {
        if self.response_header.is_none() {
            return Err(Error::explain(
                ErrorType::InternalError,
                "response body written before response header",
            ));
        }

        if let Some(data) = data {
            if let Some(limit) = self.write_limit {
                if self.body.len() + data.len() > limit {
                    return Err(Error::explain(
                        ErrorType::WriteError,
                        "connection closed by peer",
                    ));
                }
            }
            self.body.extend_from_slice(&data);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test(tokio::test)]
    async fn test_session_write_limit() -> Result<(), Box<Error>> {
        let header = RequestHeader::build("GET", b"/", None)?;
        let mut session = TestSession::from(header);
        session.fail_writes_after(5);

        let response = ResponseHeader::build(200, None)?;
        session
            .write_response_header(Box::new(response), false)
            .await?;
        session
            .write_response_body(Some(Bytes::from_static(b"abc")), false)
            .await?;
        let err = session
            .write_response_body(Some(Bytes::from_static(b"def")), true)
            .await
            .unwrap_err();
        assert_eq!(err.etype, ErrorType::WriteError);
        assert_eq!(session.body_str(), "abc");
        assert_eq!(session.body_bytes_sent(), 3);
        assert_eq!(session.response_written().map(|h| h.status.as_u16()), Some(200));

        Ok(())
    }
}
