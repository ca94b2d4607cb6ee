//! The S3-compatible remote cache transport (spec §4.6, component C6).
//!
//! Signs every request with AWS Signature Version 4 and drives a
//! bounded-concurrency upload/download pipeline over zip archives of cache
//! entries. Per-object failures are accumulated rather than aborting the
//! batch (spec §7 "the batch never aborts on a single failure").

use std::io::Read;
use std::time::Instant;

use color_eyre::{Result, eyre::Context};
use futures::StreamExt;
use hmac::{Hmac, Mac};
use lazy_regex::regex_captures;
use jiff::Timestamp;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, trace, warn};

use crate::config::DebugOptions;
use crate::error::RugbyError;
use crate::path::AbsDirPath;
use crate::progress::{TransferBar, format_size, format_transfer_rate};

/// Default upload/download parallelism (spec §4.6 "default 15").
pub const DEFAULT_PARALLELISM: usize = crate::config::DEFAULT_PARALLELISM;

/// Archive suffix for objects in the remote store (spec §4.6 Addressing).
///
/// §4.6 allows `.zip` or `.7z`; this transport only ever produces and
/// expects `.zip` (zip level 1, "favouring speed") since `zip` is the only
/// archive crate in the dependency stack — see `DESIGN.md` for the drop.
pub const ARCHIVE_SUFFIX: &str = ".zip";

/// Files at or above this size are memory-mapped rather than read into a
/// `Vec` before upload (spec §4.6 Parallelism step 2).
const MMAP_THRESHOLD_BYTES: u64 = 50 * 1024 * 1024;

/// Credentials for the remote object store (spec §6.4 `S3_ACCESS_KEY`/`S3_SECRET_KEY`).
#[derive(Clone, derive_more::Debug)]
pub struct RemoteCredentials {
    pub access_key: String,
    #[debug(skip)]
    pub secret_key: String,
}

/// Overrides the heuristic virtual-hosted/path-style detection (spec §9 open
/// question: "implementers may accept explicit configuration to override").
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum RemoteAddressing {
    /// Detect from the endpoint hostname shape (spec §4.6 Addressing).
    #[default]
    Auto,
    /// `host = <bucket>.<endpoint-host>`, `path = /<key>`.
    VirtualHosted,
    /// `host = <endpoint-host>`, `path = /<bucket>/<key>`.
    PathStyle,
}

/// Where the remote cache lives and how to address it.
#[derive(Clone, Debug)]
pub struct RemoteEndpoint {
    /// Bare host, e.g. `s3.us-west-2.amazonaws.com`, no scheme or path.
    pub host: String,
    pub bucket: String,
    pub addressing: RemoteAddressing,
}

impl RemoteEndpoint {
    /// Resolves the `(host, path_prefix)` pair a request's URL is built
    /// from, and the region used for signing (spec §4.6 Addressing, Region).
    fn resolve(&self) -> (String, String) {
        let virtual_hosted = match self.addressing {
            RemoteAddressing::VirtualHosted => true,
            RemoteAddressing::PathStyle => false,
            RemoteAddressing::Auto => {
                // "If the configured endpoint already contains the bucket as
                // a host-prefix, treat as virtual-hosted with no synthesis."
                self.host.starts_with(&format!("{}.", self.bucket))
            }
        };

        if virtual_hosted {
            if self.host.starts_with(&format!("{}.", self.bucket)) {
                (self.host.clone(), String::new())
            } else {
                (format!("{}.{}", self.bucket, self.host), String::new())
            }
        } else {
            (self.host.clone(), format!("/{}", self.bucket))
        }
    }

    /// Region extracted from the endpoint hostname (spec §4.6 Region),
    /// defaulting to `us-east-1`.
    fn region(&self) -> String {
        if let Some((_, region)) = regex_captures!(r"^s3\.([a-z0-9-]+)\.amazonaws\.com$", &self.host) {
            return region.to_string();
        }
        if let Some((_, region)) = regex_captures!(r"^([a-z0-9-]+)\.s3\.amazonaws\.com$", &self.host) {
            return region.to_string();
        }
        "us-east-1".to_string()
    }
}

/// One object to transfer: its store-relative key and the local cache-entry
/// directory it corresponds to.
#[derive(Clone, Debug)]
pub struct TransferObject {
    /// Relative path from `bin/`, without the archive suffix, e.g.
    /// `MyPod/Debug-sim-arm64/abc123` (spec §4.6 Addressing).
    pub key: String,
    /// The local cache-entry directory: read from for uploads, written to
    /// for downloads.
    pub local_dir: AbsDirPath,
}

/// The outcome of transferring a single object.
#[derive(Clone, Debug)]
pub struct TransferOutcome {
    pub key: String,
    pub bytes: u64,
}

/// Per-object result of a batch transfer (spec §7: "the transport returns
/// per-object results").
pub struct ObjectResult {
    pub key: String,
    pub outcome: Result<TransferOutcome>,
}

/// Signs and executes requests against an S3-compatible object store.
pub struct RemoteTransport {
    http: reqwest::Client,
    endpoint: RemoteEndpoint,
    credentials: RemoteCredentials,
    parallelism: usize,
    debug: DebugOptions,
}

impl RemoteTransport {
    pub fn new(
        endpoint: RemoteEndpoint,
        credentials: RemoteCredentials,
        parallelism: usize,
        debug: DebugOptions,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(crate::config::DEFAULT_REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            endpoint,
            credentials,
            parallelism,
            debug,
        }
    }

    fn object_url(&self, key: &str) -> String {
        let (host, prefix) = self.endpoint.resolve();
        format!("https://{host}{prefix}/{key}{ARCHIVE_SUFFIX}")
    }

    /// `HEAD /` against the bucket root before a batch (spec §4.6 Preflight).
    #[instrument(skip(self))]
    pub async fn preflight(&self) -> Result<()> {
        let (host, prefix) = self.endpoint.resolve();
        let url = format!("https://{host}{prefix}/");
        let request = self.sign(reqwest::Method::HEAD, &url, &[])?;
        let response = self.http.execute(request).await.context("preflight request")?;
        match response.status() {
            StatusCode::FORBIDDEN => Err(RugbyError::RemoteAuthFailure.into()),
            status if status.is_success() || status == StatusCode::NOT_FOUND => Ok(()),
            status => Err(RugbyError::RemoteRequestRejected { status_code: status.as_u16() }.into()),
        }
    }

    /// `uploadAll(selection, ...)` (spec §4.6): compresses each object's
    /// local directory and PUTs it, `parallelism`-wide, returning per-object
    /// results without aborting the batch on a single failure.
    #[instrument(skip(self, objects))]
    pub async fn upload_all(&self, objects: Vec<TransferObject>) -> Vec<ObjectResult> {
        if objects.is_empty() {
            return Vec::new();
        }
        let bar = TransferBar::new(objects.len() as u64, "uploading cache entries");
        let start = Instant::now();
        let mut total_bytes = 0u64;

        let results = futures::stream::iter(objects.into_iter().map(|object| async move {
            let key = object.key.clone();
            let outcome = self.upload_one(&object).await;
            ObjectResult { key, outcome }
        }))
        .buffer_unordered(self.parallelism.max(1))
        .collect::<Vec<_>>()
        .await;

        for result in &results {
            bar.inc(1);
            if let Ok(outcome) = &result.outcome {
                total_bytes += outcome.bytes;
            }
        }
        debug!(
            transferred = %format_size(total_bytes),
            rate = %format_transfer_rate(total_bytes, start),
            "upload batch complete"
        );
        results
    }

    async fn upload_one(&self, object: &TransferObject) -> Result<TransferOutcome> {
        let tmp = tempfile::Builder::new().prefix("rugby-upload-").tempfile().context("create temp archive")?;
        let archive_path = tmp.path().to_path_buf();
        let source = object.local_dir.clone();
        let archive_path_for_blocking = archive_path.clone();
        tokio::task::spawn_blocking(move || compress_dir(&source, &archive_path_for_blocking))
            .await
            .context("join compress task")??;

        let archive_bytes = read_archive(&archive_path).context("read archive for upload")?;
        let len = archive_bytes.len() as u64;

        let url = self.object_url(&object.key);
        let content_sha256 = hash_sha256_hex(&archive_bytes);
        let request = self.sign_with_body(reqwest::Method::PUT, &url, archive_bytes, &content_sha256)?;
        let response = self.http.execute(request).await.context("upload request")?;

        // tmp dropped here regardless of outcome, deleting the temp archive
        // on both success and failure (spec §4.6 Parallelism step 3).
        drop(tmp);

        match response.status() {
            status if status.is_success() => {
                trace!(key = %object.key, bytes = len, "uploaded cache entry");
                Ok(TransferOutcome { key: object.key.clone(), bytes: len })
            }
            StatusCode::FORBIDDEN => Err(RugbyError::RemoteAuthFailure.into()),
            StatusCode::NOT_FOUND => Err(RugbyError::RemoteBucketNotFound.into()),
            status => Err(RugbyError::RemoteRequestRejected { status_code: status.as_u16() }.into()),
        }
    }

    /// `downloadAll(...)` (spec §4.6): GETs each object and extracts it into
    /// the corresponding local cache-entry directory.
    #[instrument(skip(self, objects))]
    pub async fn download_all(&self, objects: Vec<TransferObject>) -> Vec<ObjectResult> {
        if objects.is_empty() {
            return Vec::new();
        }
        let bar = TransferBar::new(objects.len() as u64, "downloading cache entries");

        let results = futures::stream::iter(objects.into_iter().map(|object| async move {
            let key = object.key.clone();
            let outcome = self.download_one(&object).await;
            ObjectResult { key, outcome }
        }))
        .buffer_unordered(self.parallelism.max(1))
        .collect::<Vec<_>>()
        .await;

        for _ in &results {
            bar.inc(1);
        }
        results
    }

    async fn download_one(&self, object: &TransferObject) -> Result<TransferOutcome> {
        let url = self.object_url(&object.key);
        let request = self.sign(reqwest::Method::GET, &url, &[])?;
        let response = self.http.execute(request).await.context("download request")?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::FORBIDDEN => return Err(RugbyError::RemoteAuthFailure.into()),
            StatusCode::NOT_FOUND => return Err(RugbyError::RemoteBucketNotFound.into()),
            status => return Err(RugbyError::RemoteRequestRejected { status_code: status.as_u16() }.into()),
        }

        let bytes = response.bytes().await.context("read download body")?;
        let len = bytes.len() as u64;
        let dest = object.local_dir.clone();
        tokio::task::spawn_blocking(move || extract_zip(&bytes, &dest))
            .await
            .context("join extract task")??;

        Ok(TransferOutcome { key: object.key.clone(), bytes: len })
    }

    /// Signs a request with no body (GET/HEAD), using the empty-payload hash.
    fn sign(&self, method: reqwest::Method, url: &str, _extra_headers: &[(&str, &str)]) -> Result<reqwest::Request> {
        self.sign_with_body(method, url, Vec::new(), &hash_sha256_hex(&[]))
    }

    fn sign_with_body(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Vec<u8>,
        content_sha256: &str,
    ) -> Result<reqwest::Request> {
        let parsed = url::Url::parse(url).context("parse request url")?;
        let host = parsed.host_str().context("request url has no host")?.to_string();
        let path = parsed.path().to_string();

        let now = Timestamp::now();
        let (amz_date, date8) = sigv4::format_timestamp(now);
        let region = self.endpoint.region();
        let service = "s3";

        let mut headers: Vec<(String, String)> = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
            ("x-amz-content-sha256".to_string(), content_sha256.to_string()),
        ];
        if method == reqwest::Method::PUT {
            headers.push(("content-type".to_string(), "application/zip".to_string()));
            headers.push(("content-length".to_string(), body.len().to_string()));
        }

        let (canonical_headers, signed_headers) = sigv4::canonical_headers(&headers);
        let canonical_request = sigv4::canonical_request(
            method.as_str(),
            &path,
            "",
            &canonical_headers,
            &signed_headers,
            content_sha256,
        );

        let scope = format!("{date8}/{region}/{service}/aws4_request");
        let string_to_sign = sigv4::string_to_sign(&amz_date, &scope, &canonical_request);
        let signing_key = sigv4::signing_key(&self.credentials.secret_key, &date8, &region, service);
        let signature = hex::encode(sigv4::hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.credentials.access_key,
        );

        if self.debug.trace_signing {
            debug!(%canonical_request, %string_to_sign, %authorization, "s3 request signed");
        }

        let mut builder = self.http.request(method, url);
        for (name, value) in &headers {
            if name == "host" || name == "content-length" {
                // `host` comes from the URL; `content-length` is set by
                // reqwest from the body below. Both are still part of
                // `signed_headers` via the canonical-headers computation
                // above, so the signature still covers them.
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = builder.header("authorization", authorization);
        if !body.is_empty() {
            builder = builder.body(body);
        }
        builder.build().context("build signed request")
    }
}

fn hash_sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn read_archive(path: &std::path::Path) -> Result<Vec<u8>> {
    let metadata = std::fs::metadata(path).context("stat archive")?;
    if metadata.len() >= MMAP_THRESHOLD_BYTES {
        let file = std::fs::File::open(path).context("open archive for mmap")?;
        // SAFETY: the archive is a freshly-written temp file this process
        // owns exclusively and does not mutate concurrently with this read.
        let mmap = unsafe { memmap2::Mmap::map(&file) }.context("mmap archive")?;
        Ok(mmap.to_vec())
    } else {
        std::fs::read(path).context("read archive")
    }
}

/// Compresses `source`'s contents into a zip archive at `dest_path` (spec
/// §4.6 Parallelism step 1, "zip level 1 ... favouring speed").
fn compress_dir(source: &AbsDirPath, dest_path: &std::path::Path) -> Result<()> {
    let file = std::fs::File::create(dest_path).context("create archive file")?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(1));

    for entry in walkdir::WalkDir::new(source.as_std_path()).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(source.as_std_path())
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        writer.start_file(rel, options).context("start zip entry")?;
        let mut file = std::fs::File::open(entry.path()).context("open file to archive")?;
        std::io::copy(&mut file, &mut writer).context("write zip entry")?;
    }
    writer.finish().context("finalize archive")?;
    Ok(())
}

/// Extracts a zip archive's bytes into `dest` (spec P7: "stored bytes
/// decompress to the local cache-entry directory byte-for-byte").
fn extract_zip(bytes: &[u8], dest: &AbsDirPath) -> Result<()> {
    std::fs::create_dir_all(dest.as_std_path()).context("create destination directory")?;
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).context("open zip archive")?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("read zip entry")?;
        let Some(enclosed) = entry.enclosed_name() else {
            warn!(name = %entry.name(), "skipping zip entry with unsafe path");
            continue;
        };
        let out_path = dest.as_std_path().join(enclosed);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).context("create extracted file parent")?;
        }
        let mut out_file = std::fs::File::create(&out_path).context("create extracted file")?;
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).context("read zip entry contents")?;
        std::io::Write::write_all(&mut out_file, &buf).context("write extracted file")?;
    }
    Ok(())
}

/// AWS Signature Version 4 primitives (spec §4.6 Signing).
mod sigv4 {
    use super::*;

    /// Returns `(x-amz-date, date8)` for `now`, both in UTC.
    pub fn format_timestamp(now: Timestamp) -> (String, String) {
        let zoned = now.to_zoned(jiff::tz::TimeZone::UTC);
        let amz_date = format!(
            "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
            zoned.year(),
            zoned.month(),
            zoned.day(),
            zoned.hour(),
            zoned.minute(),
            zoned.second(),
        );
        let date8 = amz_date[..8].to_string();
        (amz_date, date8)
    }

    /// Percent-encodes a path component, preserving `/` and the unreserved
    /// character set (spec §4.6 Signing: "Path encoding preserves `/`;
    /// encodes other non-unreserved characters").
    pub fn encode_path(path: &str) -> String {
        path.split('/')
            .map(encode_segment)
            .collect::<Vec<_>>()
            .join("/")
    }

    fn encode_segment(segment: &str) -> String {
        let mut out = String::with_capacity(segment.len());
        for byte in segment.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    out.push(byte as char);
                }
                _ => {
                    out.push('%');
                    out.push_str(&format!("{byte:02X}"));
                }
            }
        }
        out
    }

    /// Lowercases, trims, sorts by name, and joins `name:value\n` pairs,
    /// terminated by a final newline (spec §4.6 Signing: "Headers in
    /// canonical form..."). Returns `(canonical_headers, signed_headers)`.
    pub fn canonical_headers(headers: &[(String, String)]) -> (String, String) {
        let mut sorted: Vec<(String, String)> = headers
            .iter()
            .map(|(name, value)| (name.to_lowercase(), value.trim().to_string()))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let canonical = sorted
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect::<String>();
        let signed = sorted.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>().join(";");
        (canonical, signed)
    }

    /// Builds the canonical request document (spec §4.6 Signing).
    pub fn canonical_request(
        method: &str,
        path: &str,
        canonical_query: &str,
        canonical_headers: &str,
        signed_headers: &str,
        payload_sha256: &str,
    ) -> String {
        format!(
            "{method}\n{}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{payload_sha256}",
            encode_path(path),
        )
    }

    /// Builds the string to sign (spec §4.6 Signing).
    pub fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
        let hashed = hash_sha256_hex(canonical_request.as_bytes());
        format!("AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{hashed}")
    }

    type HmacSha256 = Hmac<Sha256>;

    pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    /// Derives the signing key (spec §4.6 Signing: `HMAC(HMAC(HMAC(HMAC("AWS4"+secret,
    /// date), region), service), "aws4_request")`).
    pub fn signing_key(secret: &str, date8: &str, region: &str, service: &str) -> Vec<u8> {
        let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date8.as_bytes());
        let k_region = hmac_sha256(&k_date, region.as_bytes());
        let k_service = hmac_sha256(&k_region, service.as_bytes());
        hmac_sha256(&k_service, b"aws4_request")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn encode_path_preserves_slashes_and_unreserved_chars() {
            assert_eq!(encode_path("/MyPod/Debug-sim-arm64/abc123.zip"), "/MyPod/Debug-sim-arm64/abc123.zip");
        }

        #[test]
        fn encode_path_percent_encodes_reserved_chars() {
            assert_eq!(encode_path("/a b/c"), "/a%20b/c");
        }

        #[test]
        fn canonical_headers_sorts_and_lowercases() {
            let headers = vec![
                ("X-Amz-Date".to_string(), " 20250101T000000Z ".to_string()),
                ("Host".to_string(), "example.com".to_string()),
            ];
            let (canonical, signed) = canonical_headers(&headers);
            assert_eq!(canonical, "host:example.com\nx-amz-date:20250101T000000Z\n");
            assert_eq!(signed, "host;x-amz-date");
        }

        #[test]
        fn signing_key_is_deterministic() {
            let a = signing_key("secret", "20250101", "us-east-1", "s3");
            let b = signing_key("secret", "20250101", "us-east-1", "s3");
            assert_eq!(a, b);
        }

        #[test]
        fn signing_key_changes_with_date() {
            let a = signing_key("secret", "20250101", "us-east-1", "s3");
            let b = signing_key("secret", "20250102", "us-east-1", "s3");
            assert_ne!(a, b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_hosted_auto_detected_from_bucket_prefix() {
        let endpoint = RemoteEndpoint {
            host: "my-bucket.s3.us-west-2.amazonaws.com".to_string(),
            bucket: "my-bucket".to_string(),
            addressing: RemoteAddressing::Auto,
        };
        let (host, prefix) = endpoint.resolve();
        assert_eq!(host, "my-bucket.s3.us-west-2.amazonaws.com");
        assert_eq!(prefix, "");
    }

    #[test]
    fn path_style_auto_detected_when_bucket_not_host_prefix() {
        let endpoint = RemoteEndpoint {
            host: "s3.us-west-2.amazonaws.com".to_string(),
            bucket: "my-bucket".to_string(),
            addressing: RemoteAddressing::Auto,
        };
        let (host, prefix) = endpoint.resolve();
        assert_eq!(host, "my-bucket.s3.us-west-2.amazonaws.com");
        assert_eq!(prefix, "");
    }

    #[test]
    fn explicit_path_style_override_is_honored() {
        let endpoint = RemoteEndpoint {
            host: "minio.internal:9000".to_string(),
            bucket: "my-bucket".to_string(),
            addressing: RemoteAddressing::PathStyle,
        };
        let (host, prefix) = endpoint.resolve();
        assert_eq!(host, "minio.internal:9000");
        assert_eq!(prefix, "/my-bucket");
    }

    #[test]
    fn region_extracted_from_s3_dot_region_shape() {
        let endpoint = RemoteEndpoint {
            host: "s3.eu-central-1.amazonaws.com".to_string(),
            bucket: "b".to_string(),
            addressing: RemoteAddressing::Auto,
        };
        assert_eq!(endpoint.region(), "eu-central-1");
    }

    #[test]
    fn region_extracted_from_region_dot_s3_shape() {
        let endpoint = RemoteEndpoint {
            host: "eu-central-1.s3.amazonaws.com".to_string(),
            bucket: "b".to_string(),
            addressing: RemoteAddressing::Auto,
        };
        assert_eq!(endpoint.region(), "eu-central-1");
    }

    #[test]
    fn region_defaults_to_us_east_1_for_unrecognized_host() {
        let endpoint = RemoteEndpoint {
            host: "minio.internal:9000".to_string(),
            bucket: "b".to_string(),
            addressing: RemoteAddressing::Auto,
        };
        assert_eq!(endpoint.region(), "us-east-1");
    }

    #[tokio::test]
    async fn compress_then_extract_round_trips_p7() {
        let source = tempfile::TempDir::new().unwrap();
        std::fs::write(source.path().join("lib.a"), b"binary content").unwrap();
        std::fs::create_dir_all(source.path().join("Headers")).unwrap();
        std::fs::write(source.path().join("Headers").join("lib.h"), b"header content").unwrap();

        let archive = tempfile::NamedTempFile::new().unwrap();
        let source_dir = AbsDirPath::try_from(source.path().to_path_buf()).unwrap();
        compress_dir(&source_dir, archive.path()).unwrap();

        let bytes = std::fs::read(archive.path()).unwrap();
        let dest = tempfile::TempDir::new().unwrap();
        let dest_dir = AbsDirPath::try_from(dest.path().to_path_buf()).unwrap();
        extract_zip(&bytes, &dest_dir).unwrap();

        assert_eq!(std::fs::read(dest.path().join("lib.a")).unwrap(), b"binary content");
        assert_eq!(std::fs::read(dest.path().join("Headers").join("lib.h")).unwrap(), b"header content");
    }

    #[test]
    fn upload_object_key_matches_spec_shape() {
        let endpoint = RemoteEndpoint {
            host: "s3.us-east-1.amazonaws.com".to_string(),
            bucket: "cache-bucket".to_string(),
            addressing: RemoteAddressing::Auto,
        };
        let transport = RemoteTransport::new(
            endpoint,
            RemoteCredentials { access_key: "AKIDEXAMPLE".to_string(), secret_key: "secret".to_string() },
            DEFAULT_PARALLELISM,
            DebugOptions::default(),
        );
        let url = transport.object_url("MyPod/Debug-sim-arm64/fp2");
        assert_eq!(url, "https://cache-bucket.s3.us-east-1.amazonaws.com/MyPod/Debug-sim-arm64/fp2.zip");
    }
}
