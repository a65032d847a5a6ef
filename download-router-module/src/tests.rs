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

use artifact_cache_module::{ArtifactCache, Catalog, CatalogEntry, ContentProvider};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use client_address_module::ClientAddress;
use download_log_module::{DownloadLogRecord, DownloadLogSink, LogStore};
use downloader_module_utils::pingora::{
    Error, RequestHeader, ResponseHeader, SessionWrapper, SocketAddr, TestSession,
};
use downloader_module_utils::RequestFilter;
use http::{header, StatusCode};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use test_log::test;

use crate::{DownloadRouter, DownloadRouterConf};

const BIG_SIZE: usize = 200 * 1024;

#[derive(Debug, Default)]
struct FakeProvider {
    files: HashMap<String, Bytes>,
}

#[async_trait]
impl ContentProvider for FakeProvider {
    async fn read(&self, file: &str) -> io::Result<Bytes> {
        self.files
            .get(file)
            .cloned()
            .ok_or_else(|| io::ErrorKind::NotFound.into())
    }
}

#[derive(Debug, Default, Clone)]
struct FakeStore {
    records: Arc<Mutex<Vec<DownloadLogRecord>>>,
}

impl FakeStore {
    fn take(&self) -> Vec<DownloadLogRecord> {
        std::mem::take(&mut *self.records.lock().unwrap())
    }
}

#[async_trait]
impl LogStore for FakeStore {
    async fn insert(&self, record: &DownloadLogRecord) -> Result<u64, Box<Error>> {
        self.records.lock().unwrap().push(record.clone());
        Ok(1)
    }
}

async fn make_router(conf: DownloadRouterConf) -> (DownloadRouter, FakeStore) {
    let time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let catalog = Catalog::new(vec![
        CatalogEntry::new("app.exe", Some("App for Windows".to_owned()), time),
        CatalogEntry::new("big file.zip", None, time),
        CatalogEntry::new("app.dmg", None, time),
    ])
    .unwrap();

    let mut provider = FakeProvider::default();
    provider
        .files
        .insert("app.exe".to_owned(), Bytes::from_static(b"windows build"));
    provider
        .files
        .insert("big file.zip".to_owned(), vec![b'x'; BIG_SIZE].into());

    let cache = ArtifactCache::new(catalog, provider);
    assert_eq!(cache.populate_all().await, 2);

    let store = FakeStore::default();
    let sink = DownloadLogSink::primary(store.clone());
    (DownloadRouter::new(conf, cache, sink), store)
}

fn make_session(method: &str, path: &str) -> TestSession {
    let header = RequestHeader::build(method, path.as_bytes(), None).unwrap();
    let mut session = TestSession::from(header);
    session.set_client_addr(SocketAddr::Inet("192.0.2.7:51000".parse().unwrap()));
    session
}

async fn run(
    router: &DownloadRouter,
    session: &mut TestSession,
) -> Result<(), Box<Error>> {
    let mut ctx = DownloadRouter::new_ctx();
    let result = router.request_filter(session, &mut ctx).await;
    router
        .logging(session, result.as_ref().err().map(|err| &**err), &mut ctx)
        .await;
    result
}

fn response_header(session: &TestSession) -> &ResponseHeader {
    session.response_written().unwrap()
}

fn header_str(header: &ResponseHeader, name: header::HeaderName) -> &str {
    header.headers.get(name).unwrap().to_str().unwrap()
}

#[test(tokio::test)]
async fn current_release() -> Result<(), Box<Error>> {
    let (router, store) = make_router(Default::default()).await;
    let mut session = make_session("GET", "/currentrelease");
    run(&router, &mut session).await?;

    assert_eq!(response_header(&session).status, StatusCode::OK);
    assert_eq!(
        session.body_str(),
        "3.10.1\nhttps://github.com/sqlitebrowser/sqlitebrowser/releases/tag/v3.10.1\n"
    );

    let records = store.take();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, "/currentrelease");
    assert_eq!(records[0].status, 200);
    assert_eq!(records[0].bytes_sent, session.body().len() as u64);
    Ok(())
}

#[test(tokio::test)]
async fn artifact_download() -> Result<(), Box<Error>> {
    let (router, store) = make_router(Default::default()).await;
    let mut session = make_session("GET", "/app.exe");
    session
        .req_header_mut()
        .insert_header(header::USER_AGENT, "curl/8.0")?;
    session
        .req_header_mut()
        .insert_header(header::REFERER, "https://example.com/")?;
    run(&router, &mut session).await?;

    let header = response_header(&session);
    assert_eq!(header.status, StatusCode::OK);
    assert_eq!(
        header_str(header, header::LAST_MODIFIED),
        "Fri, 01 Mar 2024 12:00:00 GMT"
    );
    assert_eq!(
        header_str(header, header::CONTENT_DISPOSITION),
        "attachment; filename=\"app.exe\"; modification-date=\"2024-03-01T12:00:00Z\";"
    );
    assert_eq!(
        header_str(header, header::CONTENT_TYPE),
        "application/octet-stream"
    );
    assert_eq!(header_str(header, header::CONTENT_LENGTH), "13");
    assert_eq!(session.body_str(), "windows build");

    let records = store.take();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(
        record.client_address,
        ClientAddress::V4 {
            addr: "192.0.2.7".to_owned(),
            port: Some(51000),
        }
    );
    assert_eq!(record.method, "GET");
    assert_eq!(record.path, "/app.exe");
    assert_eq!(record.protocol, "HTTP/1.1");
    assert_eq!(record.status, 200);
    assert_eq!(record.bytes_sent, 13);
    assert_eq!(record.user_agent, "curl/8.0");
    assert_eq!(record.referer.as_deref(), Some("https://example.com/"));
    Ok(())
}

#[test(tokio::test)]
async fn escaped_path() -> Result<(), Box<Error>> {
    let (router, store) = make_router(Default::default()).await;
    let mut session = make_session("GET", "/big%20file.zip");
    run(&router, &mut session).await?;

    let header = response_header(&session);
    assert_eq!(header.status, StatusCode::OK);
    assert_eq!(
        header_str(header, header::CONTENT_LENGTH),
        BIG_SIZE.to_string()
    );
    assert_eq!(session.body().len(), BIG_SIZE);

    let records = store.take();
    assert_eq!(records[0].path, "/big%20file.zip");
    assert_eq!(records[0].bytes_sent, BIG_SIZE as u64);
    Ok(())
}

#[test(tokio::test)]
async fn head_request() -> Result<(), Box<Error>> {
    let (router, store) = make_router(Default::default()).await;
    let mut session = make_session("HEAD", "/app.exe");
    run(&router, &mut session).await?;

    let header = response_header(&session);
    assert_eq!(header.status, StatusCode::OK);
    assert_eq!(header_str(header, header::CONTENT_LENGTH), "13");
    assert!(session.body().is_empty());

    let records = store.take();
    assert_eq!(records[0].method, "HEAD");
    assert_eq!(records[0].status, 200);
    assert_eq!(records[0].bytes_sent, 0);
    Ok(())
}

#[test(tokio::test)]
async fn not_yet_available() -> Result<(), Box<Error>> {
    let (router, store) = make_router(Default::default()).await;
    let mut session = make_session("GET", "/app.dmg");
    run(&router, &mut session).await?;

    assert_eq!(response_header(&session).status, StatusCode::NOT_FOUND);
    assert_eq!(session.body_str(), "Not yet available");

    let records = store.take();
    assert_eq!(records[0].status, 404);
    assert_eq!(records[0].bytes_sent, 17);
    Ok(())
}

#[test(tokio::test)]
async fn unknown_file() -> Result<(), Box<Error>> {
    let (router, store) = make_router(Default::default()).await;

    for path in [
        "/nothing.exe",
        "/app.exe/",
        "/../app.exe",
        "/index.html?x=1",
        "//app.exe",
        "///app.exe",
        "/%2Fapp.exe",
    ] {
        let mut session = make_session("GET", path);
        run(&router, &mut session).await?;

        assert_eq!(response_header(&session).status, StatusCode::NOT_FOUND);
        assert_eq!(session.body_str(), "Unknown file requested");

        let records = store.take();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, path);
        assert_eq!(records[0].status, 404);
    }
    Ok(())
}

#[test(tokio::test)]
async fn forwarded_address() -> Result<(), Box<Error>> {
    let (router, store) = make_router(Default::default()).await;

    let mut session = make_session("GET", "/currentrelease");
    session
        .req_header_mut()
        .insert_header("X-Forwarded-For", "203.0.113.9:4711")?;
    run(&router, &mut session).await?;
    assert_eq!(
        store.take()[0].client_address,
        ClientAddress::V4 {
            addr: "203.0.113.9".to_owned(),
            port: Some(4711),
        }
    );

    let mut session = make_session("GET", "/currentrelease");
    session
        .req_header_mut()
        .insert_header("X-Forwarded-For", "[2001:db8::1]:8080")?;
    run(&router, &mut session).await?;
    assert_eq!(
        store.take()[0].client_address,
        ClientAddress::V6 {
            addr: "2001:db8::1".to_owned(),
            port: Some(8080),
        }
    );

    let mut session = make_session("GET", "/currentrelease");
    session
        .req_header_mut()
        .insert_header("X-Forwarded-For", "unknown")?;
    run(&router, &mut session).await?;
    assert_eq!(
        store.take()[0].client_address,
        ClientAddress::Strange("unknown".to_owned())
    );
    Ok(())
}

#[test(tokio::test)]
async fn interrupted_download() -> Result<(), Box<Error>> {
    let (router, store) = make_router(Default::default()).await;
    let mut session = make_session("GET", "/big%20file.zip");
    session.fail_writes_after(100_000);
    assert!(run(&router, &mut session).await.is_err());

    assert_eq!(session.body().len(), 64 * 1024);

    let records = store.take();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, 400);
    assert_eq!(records[0].bytes_sent, 64 * 1024);
    Ok(())
}

#[test(tokio::test)]
async fn method_not_allowed() -> Result<(), Box<Error>> {
    let (router, store) = make_router(Default::default()).await;
    let mut session = make_session("POST", "/app.exe");
    run(&router, &mut session).await?;

    assert_eq!(
        response_header(&session).status,
        StatusCode::METHOD_NOT_ALLOWED
    );

    let records = store.take();
    assert_eq!(records[0].method, "POST");
    assert_eq!(records[0].status, 405);
    Ok(())
}

#[test(tokio::test)]
async fn body_too_large() -> Result<(), Box<Error>> {
    let (router, store) = make_router(Default::default()).await;

    let mut session = make_session("GET", "/app.exe");
    session
        .req_header_mut()
        .insert_header(header::CONTENT_LENGTH, "5000")?;
    run(&router, &mut session).await?;
    assert_eq!(
        response_header(&session).status,
        StatusCode::PAYLOAD_TOO_LARGE
    );
    assert_eq!(store.take()[0].status, 413);

    let mut session = make_session("GET", "/app.exe");
    session
        .req_header_mut()
        .insert_header(header::CONTENT_LENGTH, "4096")?;
    run(&router, &mut session).await?;
    assert_eq!(response_header(&session).status, StatusCode::OK);
    Ok(())
}

#[test(tokio::test)]
async fn index_page() -> Result<(), Box<Error>> {
    let (router, store) = make_router(Default::default()).await;
    let mut session = make_session("GET", "/");
    run(&router, &mut session).await?;

    let header = response_header(&session);
    assert_eq!(header.status, StatusCode::OK);
    assert_eq!(
        header_str(header, header::CONTENT_TYPE),
        "text/html; charset=utf-8"
    );

    let body = session.body_str();
    assert!(body.contains(r#"<a href="/app.exe">App for Windows</a> (2024-03-01)"#));
    assert!(body.contains(r#"<a href="/big%20file.zip">big file.zip</a>"#));
    assert!(body.contains(r#"<a href="/app.dmg">app.dmg</a>"#));

    assert_eq!(store.take()[0].status, 200);
    Ok(())
}

#[test(tokio::test)]
async fn favicon() -> Result<(), Box<Error>> {
    let (router, _) = make_router(Default::default()).await;
    let mut session = make_session("GET", "/favicon.ico");
    run(&router, &mut session).await?;
    assert_eq!(response_header(&session).status, StatusCode::NOT_FOUND);
    assert_eq!(session.body_str(), "Unknown file requested");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"icon data").unwrap();
    let conf = DownloadRouterConf {
        favicon: Some(file.path().to_owned()),
        ..Default::default()
    };
    let (router, _) = make_router(conf).await;
    let mut session = make_session("GET", "/favicon.ico");
    run(&router, &mut session).await?;

    let header = response_header(&session);
    assert_eq!(header.status, StatusCode::OK);
    assert_eq!(header_str(header, header::CONTENT_TYPE), "image/x-icon");
    assert_eq!(session.body_str(), "icon data");
    Ok(())
}
