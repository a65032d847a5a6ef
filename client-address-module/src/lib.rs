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

//! # Client Address Module
//!
//! This crate turns the client address of a request into a record that can be stored in the
//! download log. The address is taken from the `X-Forwarded-For` header if present, otherwise the
//! peer address of the connection is used.
//!
//! Proxies are inconsistent in how they format addresses, and the header occasionally contains
//! values like `unknown` or multiple addresses. So the raw string is classified by its shape:
//!
//! * `[addr]:port` is an IPv6 address with a port.
//! * A string without colons is an IPv4 address without a port.
//! * A string with exactly one colon is an IPv4 address with a port.
//! * A string with multiple colons is an IPv6 address without a port.
//!
//! Anything failing validation ends up as [`ClientAddress::Strange`], keeping the original string
//! around for later investigation. Classification never fails.
//!
//! ```rust
//! use client_address_module::{classify, ClientAddress};
//!
//! let address = classify("203.0.113.5:54321");
//! assert_eq!(address.ipv4(), Some("203.0.113.5"));
//! assert_eq!(address.port(), Some(54321));
//!
//! let address = classify("unknown");
//! assert_eq!(address, ClientAddress::Strange("unknown".to_owned()));
//! ```

use downloader_module_utils::pingora::SessionWrapper;
use http::HeaderName;
use log::warn;
use std::net::IpAddr;

/// Classified client address of a request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClientAddress {
    /// No address could be determined
    #[default]
    Unknown,

    /// An IPv4 address (or a bare address without colons), optionally with a port
    V4 {
        /// The address as given
        addr: String,
        /// The port if it could be validated
        port: Option<u16>,
    },

    /// An IPv6 address, optionally with a port
    V6 {
        /// The address as given, without brackets
        addr: String,
        /// The port if it could be validated
        port: Option<u16>,
    },

    /// An address failing validation, stored verbatim
    Strange(String),
}

impl ClientAddress {
    /// Returns the IPv4 address if this is one.
    pub fn ipv4(&self) -> Option<&str> {
        match self {
            Self::V4 { addr, .. } => Some(addr),
            _ => None,
        }
    }

    /// Returns the IPv6 address if this is one.
    pub fn ipv6(&self) -> Option<&str> {
        match self {
            Self::V6 { addr, .. } => Some(addr),
            _ => None,
        }
    }

    /// Returns the original string if the address failed validation.
    pub fn strange(&self) -> Option<&str> {
        match self {
            Self::Strange(raw) => Some(raw),
            _ => None,
        }
    }

    /// Returns the port if one was present and valid.
    pub fn port(&self) -> Option<u16> {
        match self {
            Self::V4 { port, .. } | Self::V6 { port, .. } => *port,
            _ => None,
        }
    }
}

/// Determines the raw client address of a request: the `X-Forwarded-For` header if present and
/// non-empty, the peer address otherwise. Returns an empty string if neither is known.
pub fn raw_client_address(session: &impl SessionWrapper) -> String {
    let forwarded = session
        .get_header(&HeaderName::from_static("x-forwarded-for"))
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .filter(|value| !value.is_empty());
    match forwarded {
        Some(value) => value,
        None => session
            .client_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default(),
    }
}

fn is_ip(addr: &str) -> bool {
    addr.parse::<IpAddr>().is_ok()
}

fn is_canonical_ip(addr: &str) -> bool {
    addr.parse::<IpAddr>()
        .is_ok_and(|ip| ip.to_string() == addr)
}

fn parse_port(raw: &str, port: &str) -> Option<u16> {
    match port.parse::<u16>() {
        Ok(value) if value.to_string() == port => Some(value),
        Ok(value) => {
            warn!("Port {port:?} of address {raw:?} doesn't round-trip, got {value}");
            None
        }
        Err(err) => {
            warn!("Invalid port {port:?} in address {raw:?}: {err}");
            None
        }
    }
}

fn strange(raw: &str) -> ClientAddress {
    warn!("Strange address {raw:?}");
    ClientAddress::Strange(raw.to_owned())
}

fn classify_bracketed(raw: &str) -> ClientAddress {
    let Some((addr, port)) = raw.split_once("]:") else {
        warn!("Strange address {raw:?}, missing port separator");
        return ClientAddress::Strange(raw.trim_start_matches('[').to_owned());
    };
    let addr = addr.trim_start_matches('[');

    let port = if port.is_empty() {
        None
    } else {
        parse_port(raw, port)
    };

    if !is_canonical_ip(addr) {
        return strange(raw);
    }

    ClientAddress::V6 {
        addr: addr.to_owned(),
        port,
    }
}

/// Classifies a raw client address string.
pub fn classify(raw: &str) -> ClientAddress {
    if raw.is_empty() {
        warn!("Unknown client address");
        return ClientAddress::Unknown;
    }

    if raw.starts_with('[') {
        return classify_bracketed(raw);
    }

    match raw.matches(':').count() {
        0 => {
            if !is_ip(raw) {
                return strange(raw);
            }
            ClientAddress::V4 {
                addr: raw.to_owned(),
                port: None,
            }
        }
        1 => {
            let (addr, port) = raw.split_once(':').unwrap_or((raw, ""));
            if !is_ip(addr) {
                return strange(raw);
            }
            let port = if port.is_empty() {
                None
            } else {
                parse_port(raw, port)
            };
            ClientAddress::V4 {
                addr: addr.to_owned(),
                port,
            }
        }
        _ => {
            if !is_canonical_ip(raw) {
                return strange(raw);
            }
            ClientAddress::V6 {
                addr: raw.to_owned(),
                port: None,
            }
        }
    }
}
