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

use artifact_cache_module::{ArtifactCache, ArtifactCacheConf, ArtifactCacheOpt};
use clap::Parser;
use download_log_module::{DownloadLogConf, DownloadLogOpt, DownloadLogSink};
use download_router_module::{DownloadRouter, DownloadRouterConf};
use downloader_module_utils::pingora::{Error, ErrorType, Server};
use downloader_module_utils::{merge_conf, FromYaml};
use log::{error, info};
use startup_module::{DefaultApp, StartupConf, StartupOpt};
use tokio::runtime::Builder;

/// Run the download server
#[derive(Debug, Parser)]
struct Opt {
    #[clap(flatten)]
    startup: StartupOpt,
    #[clap(flatten)]
    cache: ArtifactCacheOpt,
    #[clap(flatten)]
    log: DownloadLogOpt,
}

merge_conf! {
    /// The configuration of the download server
    struct Conf {
        startup: StartupConf,
        cache: ArtifactCacheConf,
        log: DownloadLogConf,
        router: DownloadRouterConf,
    }
}

fn setup(opt: Opt) -> Result<Server, Box<Error>> {
    let mut conf = match &opt.startup.conf {
        Some(path) => Conf::load_from_yaml(path)?,
        None => Conf::default(),
    };
    conf.cache.merge_with_opt(opt.cache);
    conf.log.merge_with_opt(opt.log);

    let cache = ArtifactCache::try_from(conf.cache)?;

    // Nothing created here may depend on this runtime, it is gone before the server starts
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            Error::because(ErrorType::InternalError, "failed creating startup runtime", err)
        })?;
    let available = runtime.block_on(cache.populate_all());
    drop(runtime);
    if available < cache.catalog().len() {
        info!("Missing artifacts will be loaded when requested");
    }

    // Connects on first request, within the runtime of the running server
    let sink = DownloadLogSink::new(conf.log);

    let router = DownloadRouter::new(conf.router, cache, sink);
    conf.startup
        .into_server(DefaultApp::new(router), Some(opt.startup))
}

fn main() {
    env_logger::init();

    let opt = Opt::parse();
    let server = match setup(opt) {
        Ok(server) => server,
        Err(err) => {
            error!("{err}");
            return;
        }
    };

    server.run_forever();
}
