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

//! Standard responses for various conditions
//!
//! All functions here return the number of response body bytes sent, this is zero for `HEAD`
//! requests.

use bytes::Bytes;
use http::{header, method::Method, status::StatusCode};
use maud::{html, DOCTYPE};

use crate::pingora::{Error, ResponseHeader, SessionWrapper};

/// Produces the text of a standard response page for the given status code.
pub fn response_text(status: StatusCode) -> String {
    let status_str = status.as_str();
    let reason = status.canonical_reason().unwrap_or("");
    html! {
        (DOCTYPE)
        html {
            head {
                title {
                    (status_str) " " (reason)
                }
            }

            body {
                center {
                    h1 {
                        (status_str) " " (reason)
                    }
                }
            }
        }
    }
    .into()
}

/// Sends a complete response with the given content type and body.
pub async fn response(
    session: &mut impl SessionWrapper,
    status: StatusCode,
    content_type: &str,
    body: Bytes,
) -> Result<usize, Box<Error>> {
    let mut header = ResponseHeader::build(status, Some(4))?;
    header.append_header(header::CONTENT_LENGTH, body.len().to_string())?;
    header.append_header(header::CONTENT_TYPE, content_type)?;

    let send_body = session.req_header().method != Method::HEAD;
    session
        .write_response_header(Box::new(header), !send_body)
        .await?;

    if send_body {
        let len = body.len();
        session.write_response_body(Some(body), true).await?;
        Ok(len)
    } else {
        Ok(0)
    }
}

/// Responds with a standard error page for the given status code.
pub async fn error_response(
    session: &mut impl SessionWrapper,
    status: StatusCode,
) -> Result<usize, Box<Error>> {
    let text = response_text(status);
    response(session, status, "text/html; charset=utf-8", text.into()).await
}

/// Responds with a plain text message.
pub async fn text_response(
    session: &mut impl SessionWrapper,
    status: StatusCode,
    text: impl Into<String>,
) -> Result<usize, Box<Error>> {
    response(
        session,
        status,
        "text/plain; charset=utf-8",
        text.into().into(),
    )
    .await
}
