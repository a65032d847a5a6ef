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

use clap::Parser;
use downloader_module_utils::pingora::{
    http_proxy_service, Error, ErrorType, ProxyHttp, Server, ServerConf, ServerOpt,
};
use log::info;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

const TLS_CONF_ERR: ErrorType = ErrorType::Custom("TLSConfError");

/// Run a download server
#[derive(Debug, Default, Parser)]
pub struct StartupOpt {
    /// Address and port to listen on, e.g. "127.0.0.1:8080". This command line flag can be
    /// specified multiple times.
    #[clap(short, long)]
    pub listen: Option<Vec<String>>,
    /// Use this flag to make the server run in the background.
    #[clap(short, long)]
    pub daemon: bool,
    /// Test the configuration and exit. This is useful to validate the configuration before
    /// restarting the process.
    #[clap(short, long)]
    pub test: bool,
    /// The path to the configuration file.
    #[clap(short, long)]
    pub conf: Option<String>,
}

/// TLS settings
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TlsConf {
    /// List of address/port combinations to accept TLS connections on, e.g. "0.0.0.0:443".
    pub listen: Vec<String>,
    /// Path to the certificate file (PEM format)
    pub cert_path: String,
    /// Path to the private key file (PEM format)
    pub key_path: String,
}

/// Configuration settings of the startup module
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartupConf {
    /// List of address/port combinations to listen on, e.g. "127.0.0.1:8080".
    pub listen: Vec<String>,
    /// TLS listening addresses along with the certificate to use
    pub tls: TlsConf,
    /// Pingora’s default server configuration options
    #[serde(flatten)]
    pub server: ServerConf,
}

fn check_address(addr: &str, etype: ErrorType) -> Result<(), Box<Error>> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|err| Error::because(etype, format!("invalid listening address {addr}"), err))
}

fn listen_addresses(
    configured: Vec<String>,
    opt: Option<Vec<String>>,
    tls: &TlsConf,
) -> Result<Vec<String>, Box<Error>> {
    let mut listen = opt.unwrap_or(configured);
    if listen.is_empty() && tls.listen.is_empty() {
        // Make certain we have a listening address
        listen.push("127.0.0.1:8080".to_owned());
        listen.push("[::1]:8080".to_owned());
    }

    for addr in &listen {
        check_address(addr, ErrorType::InternalError)?;
    }
    Ok(listen)
}

fn check_tls(tls: &TlsConf) -> Result<(), Box<Error>> {
    if tls.listen.is_empty() {
        return Ok(());
    }

    for addr in &tls.listen {
        check_address(addr, TLS_CONF_ERR)?;
    }

    for (setting, path) in [("tls.cert_path", &tls.cert_path), ("tls.key_path", &tls.key_path)] {
        if path.is_empty() {
            return Err(Error::explain(
                TLS_CONF_ERR,
                format!("{setting} setting has to be specified for TLS listening addresses"),
            ));
        }
        if !Path::new(path).is_file() {
            return Err(Error::explain(
                TLS_CONF_ERR,
                format!("{setting} setting points to {path} which isn’t a file"),
            ));
        }
    }
    Ok(())
}

impl StartupConf {
    /// Sets up a server with the given configuration and command line options
    pub fn into_server<SV>(self, app: SV, opt: Option<StartupOpt>) -> Result<Server, Box<Error>>
    where
        SV: ProxyHttp + Send + Sync + 'static,
        <SV as ProxyHttp>::CTX: Send + Sync,
    {
        let opt = opt.unwrap_or_default();
        let listen = listen_addresses(self.listen, opt.listen, &self.tls)?;
        check_tls(&self.tls)?;

        let mut server = Server::new_with_opt_and_conf(
            ServerOpt {
                daemon: opt.daemon,
                test: opt.test,
                upgrade: false,
                nocapture: false,
                conf: None,
            },
            self.server,
        );
        server.bootstrap();

        let mut proxy = http_proxy_service(&server.configuration, app);
        for addr in listen {
            info!("Listening on {addr}");
            proxy.add_tcp(&addr);
        }
        for addr in &self.tls.listen {
            info!("Listening on {addr} (TLS)");
            proxy.add_tls(addr, &self.tls.cert_path, &self.tls.key_path)?;
        }
        server.add_service(proxy);

        Ok(server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use downloader_module_utils::FromYaml;
    use test_log::test;

    #[test]
    fn default_listen() -> Result<(), Box<Error>> {
        assert_eq!(
            listen_addresses(Vec::new(), None, &TlsConf::default())?,
            vec!["127.0.0.1:8080".to_owned(), "[::1]:8080".to_owned()]
        );
        Ok(())
    }

    #[test]
    fn command_line_wins() -> Result<(), Box<Error>> {
        assert_eq!(
            listen_addresses(
                vec!["0.0.0.0:80".to_owned()],
                Some(vec!["127.0.0.1:3000".to_owned()]),
                &TlsConf::default()
            )?,
            vec!["127.0.0.1:3000".to_owned()]
        );
        assert_eq!(
            listen_addresses(vec!["0.0.0.0:80".to_owned()], None, &TlsConf::default())?,
            vec!["0.0.0.0:80".to_owned()]
        );
        Ok(())
    }

    #[test]
    fn invalid_address() {
        let tls = TlsConf::default();
        assert!(listen_addresses(vec!["localhost".to_owned()], None, &tls).is_err());
        assert!(listen_addresses(Vec::new(), Some(vec!["[::1]:http".to_owned()]), &tls).is_err());
    }

    #[test]
    fn parse_conf() -> Result<(), Box<Error>> {
        let conf = StartupConf::from_yaml(
            r#"
                listen:
                - "0.0.0.0:8080"
                - "[::]:8080"
                threads: 4
            "#,
        )?;
        assert_eq!(
            conf.listen,
            vec!["0.0.0.0:8080".to_owned(), "[::]:8080".to_owned()]
        );
        assert_eq!(conf.server.threads, 4);
        Ok(())
    }

    #[test]
    fn tls_only() -> Result<(), Box<Error>> {
        let tls = TlsConf {
            listen: vec!["0.0.0.0:443".to_owned()],
            ..Default::default()
        };
        assert!(listen_addresses(Vec::new(), None, &tls)?.is_empty());
        Ok(())
    }

    #[test]
    fn parse_tls_conf() -> Result<(), Box<Error>> {
        let conf = StartupConf::from_yaml(
            r#"
                tls:
                    listen:
                    - "0.0.0.0:443"
                    cert_path: /etc/downloader/cert.pem
                    key_path: /etc/downloader/key.pem
            "#,
        )?;
        assert!(conf.listen.is_empty());
        assert_eq!(
            conf.tls,
            TlsConf {
                listen: vec!["0.0.0.0:443".to_owned()],
                cert_path: "/etc/downloader/cert.pem".to_owned(),
                key_path: "/etc/downloader/key.pem".to_owned(),
            }
        );
        Ok(())
    }

    #[test]
    fn tls_checks() -> Result<(), Box<Error>> {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, "certificate").unwrap();
        std::fs::write(&key_path, "key").unwrap();

        let mut tls = TlsConf::default();
        check_tls(&tls)?;

        tls.listen = vec!["[::]:443".to_owned()];
        assert_eq!(check_tls(&tls).unwrap_err().etype, TLS_CONF_ERR);

        tls.cert_path = cert_path.to_string_lossy().into_owned();
        assert_eq!(check_tls(&tls).unwrap_err().etype, TLS_CONF_ERR);

        tls.key_path = dir.path().join("missing.pem").to_string_lossy().into_owned();
        assert_eq!(check_tls(&tls).unwrap_err().etype, TLS_CONF_ERR);

        tls.key_path = key_path.to_string_lossy().into_owned();
        check_tls(&tls)?;

        tls.listen.push("localhost:443".to_owned());
        assert_eq!(check_tls(&tls).unwrap_err().etype, TLS_CONF_ERR);
        Ok(())
    }
}
