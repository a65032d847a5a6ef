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

//! # Module helpers
//!
//! This crate contains the pieces shared by the download server and its modules: the
//! [`RequestFilter`] trait implemented by request handlers, the [`SessionWrapper`] abstraction
//! over a request session, loading configuration files via [`FromYaml`] and merging
//! configuration structures with [`merge_conf!`].
//!
//! [`SessionWrapper`]: crate::pingora::SessionWrapper

pub mod pingora;
pub mod standard_response;

use async_trait::async_trait;
use log::trace;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::pingora::{Error, ErrorType, SessionWrapper};

/// Trait to be implemented by request handlers.
#[async_trait]
pub trait RequestFilter: Sync + Sized {
    /// Per-request state of this handler, see [`ProxyHttp::CTX`](crate::pingora::ProxyHttp::CTX)
    type CTX: Send;

    /// Creates a new state object, see
    /// [`ProxyHttp::new_ctx`](crate::pingora::ProxyHttp::new_ctx)
    fn new_ctx() -> Self::CTX;

    /// Handler to run during Pingora’s `request_filter` phase, see
    /// [`ProxyHttp::request_filter`](crate::pingora::ProxyHttp::request_filter). The handler
    /// has to send a complete response unless it returns an error.
    async fn request_filter(
        &self,
        session: &mut impl SessionWrapper,
        ctx: &mut Self::CTX,
    ) -> Result<(), Box<Error>>;

    /// Handler to run during Pingora’s `logging` phase, see
    /// [`ProxyHttp::logging`](crate::pingora::ProxyHttp::logging). This phase runs for every request,
    /// after the response has been sent or sending it failed.
    async fn logging(
        &self,
        _session: &mut impl SessionWrapper,
        _e: Option<&Error>,
        _ctx: &mut Self::CTX,
    ) {
    }
}

/// Trait for configuration structures that can be loaded from YAML files. This trait has a blanket
/// implementation for any structure implementing [`serde::Deserialize`].
pub trait FromYaml {
    /// Loads configuration from a YAML string.
    fn from_yaml(yaml: impl AsRef<str>) -> Result<Self, Box<Error>>
    where
        Self: Sized;

    /// Loads configuration from a YAML file.
    fn load_from_yaml(path: impl AsRef<Path>) -> Result<Self, Box<Error>>
    where
        Self: Sized;
}

impl<D> FromYaml for D
where
    D: DeserializeOwned + Debug,
{
    fn from_yaml(yaml: impl AsRef<str>) -> Result<Self, Box<Error>> {
        let conf = serde_yaml::from_str(yaml.as_ref()).map_err(|err| {
            Error::because(ErrorType::ReadError, "failed parsing configuration", err)
        })?;
        trace!("Parsed configuration: {conf:#?}");

        Ok(conf)
    }

    fn load_from_yaml(path: impl AsRef<Path>) -> Result<Self, Box<Error>> {
        let file = File::open(path.as_ref()).map_err(|err| {
            Error::because(
                ErrorType::FileOpenError,
                format!(
                    "failed opening configuration file {}",
                    path.as_ref().display()
                ),
                err,
            )
        })?;
        let reader = BufReader::new(file);

        let conf = serde_yaml::from_reader(reader).map_err(|err| {
            Error::because(
                ErrorType::FileReadError,
                "failed reading configuration file",
                err,
            )
        })?;
        trace!("Loaded configuration file: {conf:#?}");

        Ok(conf)
    }
}

/// This macro merges multiple structures implementing [`serde::Deserialize`] and [`Default`] into
/// a structure containing all of them.
///
/// The structure of the expected configuration file is flattened, so that the configuration
/// settings from each component are still expected to be found on the top level.
///
/// ```rust
/// use downloader_module_utils::{merge_conf, FromYaml};
/// use serde::Deserialize;
///
/// #[derive(Debug, Default, Deserialize)]
/// #[serde(default)]
/// struct ListenConf {
///     listen: Vec<String>,
/// }
///
/// #[derive(Debug, Default, Deserialize)]
/// #[serde(default)]
/// struct DataConf {
///     data_dir: String,
/// }
///
/// merge_conf! {
///     struct Conf {
///         listen: ListenConf,
///         data: DataConf,
///     }
/// }
///
/// let conf = Conf::from_yaml("listen: ['127.0.0.1:8080']\ndata_dir: /srv").unwrap();
/// assert_eq!(conf.listen.listen, vec!["127.0.0.1:8080".to_owned()]);
/// assert_eq!(conf.data.data_dir, "/srv");
/// ```
#[macro_export]
macro_rules! merge_conf {
    (
        $(#[$struct_attr:meta])*
        $struct_vis:vis struct $struct_name:ident {
            $(
                $(#[$field_attr:meta])*
                $field_vis:vis $field_name:ident: $field_type:ty,
            )*
        }
    ) => {
        $(#[$struct_attr])*
        #[derive(::std::fmt::Debug, ::std::default::Default, ::serde::Deserialize)]
        #[serde(default)]
        $struct_vis struct $struct_name {
            $(
                #[serde(flatten)]
                $(#[$field_attr])*
                $field_vis $field_name: $field_type,
            )*
        }
    }
}
