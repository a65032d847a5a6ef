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

//! # Download Router Module
//!
//! This crate contains the request handler of the download server. It responds to `GET` and
//! `HEAD` requests as follows:
//!
//! * `/`: an index page listing all artifacts, rendered once at startup
//! * `/currentrelease`: two lines of plain text, the version number of the current release and
//!   the address of its release notes
//! * `/favicon.ico`: the configured icon file
//! * `/<file>` for any artifact in the catalog: the artifact contents with `Last-Modified`,
//!   `Content-Disposition`, `Content-Type` and `Content-Length` headers. If the artifact
//!   couldn’t be loaded, a `404 Not Found` response with the text “Not yet available” is sent.
//! * Anything else: a `404 Not Found` response with the text “Unknown file requested”
//!
//! Other request methods result in `405 Method Not Allowed`, requests announcing a body larger
//! than `max_body_size` in `413 Payload Too Large`.
//!
//! Each request is recorded in the download log during Pingora’s `logging` phase, with the status
//! and number of body bytes the client actually received. If a download is interrupted, it is
//! recorded with status 400 and the number of bytes sent until then.
//!
//! A configuration could look like this:
//!
//! ```yaml
//! current_release:
//!     version: 3.10.1
//!     notes_url: https://github.com/sqlitebrowser/sqlitebrowser/releases/tag/v3.10.1
//! favicon: /srv/downloads/favicon.ico
//! max_body_size: 4096
//! ```

mod configuration;
mod handler;
mod index;
#[cfg(test)]
mod tests;

pub use configuration::{CurrentReleaseConf, DownloadRouterConf};
pub use handler::{DownloadRouter, RouterCtx};
