// Fake appliance shared by the integration tests.
//
// wiremock serves from its own thread, so the blocking client can run on the
// test thread while the tokio runtime only drives mock setup and inspection.

#![allow(dead_code)]

use bigip::Config;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const UPLOAD_PREFIX: &str = "/mgmt/shared/file-transfer/bulk/uploads";
pub const DOWNLOAD_PREFIX: &str = "/mgmt/shared/file-transfer/bulk";

pub struct Appliance {
    pub server: MockServer,
    pub rt: Runtime,
}

impl Appliance {
    pub fn start() -> Self {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        Appliance { server, rt }
    }

    pub fn config(&self) -> Config {
        Config::new(&self.server.uri(), "admin", "admin")
    }

    pub fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.rt
            .block_on(self.server.received_requests())
            .unwrap_or_default()
    }

    pub fn requests_to(&self, verb: &str, prefix: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.method.as_str() == verb && r.url.path().starts_with(prefix))
            .collect()
    }

    pub fn verify(&self) {
        self.rt.block_on(self.server.verify());
    }

    /// Mount a login endpoint that always issues `token`
    pub fn mount_login(&self, token: &str) {
        self.mount(
            Mock::given(method("POST"))
                .and(path("/mgmt/shared/authn/login"))
                .respond_with(login_response(token)),
        );
    }

    /// Mount the file-transfer namespace backed by `store`
    pub fn mount_file_store(&self, store: &FileStore) {
        self.mount(
            Mock::given(method("POST"))
                .and(path_regex(format!("^{}/", UPLOAD_PREFIX)))
                .respond_with(UploadResponder(store.clone())),
        );
        self.mount(
            Mock::given(method("GET"))
                .and(path_regex(format!("^{}/", DOWNLOAD_PREFIX)))
                .respond_with(DownloadResponder(store.clone())),
        );
    }
}

pub fn login_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "username": "admin",
        "loginProviderName": "tmos",
        "token": {
            "token": token,
            "name": token,
            "userName": "admin",
            "timeout": 1200
        }
    }))
}

pub fn error_response(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "code": status,
        "message": message,
        "errorStack": [],
        "apiError": 3
    }))
}

pub fn random_bytes(size: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut data = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

pub fn sha256(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(data))
}

/// Issues `tok-1`, `tok-2`, ... and remembers the latest
#[derive(Clone, Default)]
pub struct TokenIssuer {
    pub issued: Arc<AtomicUsize>,
    pub latest: Arc<Mutex<String>>,
}

impl Respond for TokenIssuer {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("tok-{}", n);
        *self.latest.lock().unwrap() = token.clone();
        login_response(&token)
    }
}

/// Accepts only the most recently issued token and counts stale ones
#[derive(Clone)]
pub struct LatestTokenOnly {
    pub issuer: TokenIssuer,
    pub stale: Arc<AtomicUsize>,
}

impl Respond for LatestTokenOnly {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let presented = request
            .headers
            .get("x-f5-auth-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if presented == *self.issuer.latest.lock().unwrap() {
            ResponseTemplate::new(200).set_body_json(json!({"version": "17.1.0"}))
        } else {
            self.stale.fetch_add(1, Ordering::SeqCst);
            error_response(401, "Authorization failed: token is not valid")
        }
    }
}

/// In-memory file system behind the file-transfer namespace
#[derive(Clone, Default)]
pub struct FileStore {
    pub files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl FileStore {
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

pub struct UploadResponder(pub FileStore);

impl Respond for UploadResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let file_path = request.url.path()[UPLOAD_PREFIX.len()..].to_string();
        let range = match request
            .headers
            .get("content-range")
            .and_then(|v| v.to_str().ok())
        {
            Some(r) => r.to_string(),
            None => return error_response(400, "missing Content-Range"),
        };
        let (span, total) = range.split_once('/').unwrap();
        let total: usize = total.parse().unwrap();
        let start: usize = span.split_once('-').unwrap().0.parse().unwrap();

        let mut files = self.0.files.lock().unwrap();
        let file = files.entry(file_path.clone()).or_default();
        if start == 0 {
            file.clear();
        }
        if file.len() != start {
            return error_response(400, "chunk out of order");
        }
        file.extend_from_slice(&request.body);

        ResponseTemplate::new(200).set_body_json(json!({
            "remainingByteCount": total - file.len(),
            "usedChunks": {"0": file.len()},
            "totalByteCount": total,
            "localFilePath": file_path,
            "generation": 0,
            "lastUpdateMicros": 1597242491747497_i64
        }))
    }
}

pub struct DownloadResponder(pub FileStore);

impl Respond for DownloadResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let file_path = &request.url.path()[DOWNLOAD_PREFIX.len()..];
        let files = self.0.files.lock().unwrap();
        let file = match files.get(file_path) {
            Some(f) => f,
            None => {
                return error_response(
                    404,
                    &format!("01020036:3: The requested file ({}) was not found.", file_path),
                )
            }
        };

        if file.is_empty() {
            return ResponseTemplate::new(200).insert_header("Content-Range", "bytes */0");
        }

        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("bytes=0-")
            .trim_start_matches("bytes=")
            .to_string();
        let (start, end) = range.split_once('-').unwrap();
        let start: usize = start.parse().unwrap();
        let end: usize = end.parse().unwrap_or(file.len() - 1).min(file.len() - 1);

        ResponseTemplate::new(206)
            .insert_header("Content-Range", format!("bytes {}-{}/{}", start, end, file.len()).as_str())
            .set_body_bytes(file[start..=end].to_vec())
    }
}
