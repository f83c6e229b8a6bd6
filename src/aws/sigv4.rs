//! AWS Signature Version 4 request signing

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use super::Credentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// The parts of an outgoing request that take part in the signature
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    /// Extra headers to sign (e.g. `content-type`); `host` and
    /// `x-amz-date` are always added by the signer
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a [u8],
}

/// Signs requests for one service in one region
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
    region: String,
    service: &'static str,
}

impl Signer {
    /// Create a signer for `service` (e.g. "bedrock", "polly") in `region`
    #[must_use]
    pub fn new(credentials: Credentials, region: impl Into<String>, service: &'static str) -> Self {
        Self {
            credentials,
            region: region.into(),
            service,
        }
    }

    /// Compute the headers that authenticate `request` at time `now`
    ///
    /// Returns `x-amz-date`, `authorization` and, for temporary
    /// credentials, `x-amz-security-token`. The caller adds them verbatim.
    #[must_use]
    pub fn sign(&self, request: &SignableRequest<'_>, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let token = self.credentials.session_token();

        let mut headers: Vec<(String, String)> = request
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), canonical_header_value(value)))
            .collect();
        headers.push(("host".to_string(), host_header(request.url)));
        headers.push(("x-amz-date".to_string(), amz_date.clone()));
        if let Some(token) = token {
            headers.push(("x-amz-security-token".to_string(), token.to_string()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method,
            canonical_uri(request.url),
            canonical_query(request.url),
            canonical_headers,
            signed_headers,
            hex::encode(Sha256::digest(request.body)),
        );

        let scope = format!("{date_stamp}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = signing_key(
            self.credentials.secret_access_key(),
            &date_stamp,
            &self.region,
            self.service,
        );
        let signature = hex::encode(hmac(&signing_key, string_to_sign.as_bytes()));

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.credentials.access_key_id()
        );

        let mut out = vec![("x-amz-date", amz_date), ("authorization", authorization)];
        if let Some(token) = token {
            out.push(("x-amz-security-token", token.to_string()));
        }
        out
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the per-day signing key
fn signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// Host header as the HTTP client will send it (port only when non-default)
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Path segments are encoded a second time for every service except S3
fn canonical_uri(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (urlencoding::encode(&k).into_owned(), urlencoding::encode(&v).into_owned()))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Trim and collapse internal whitespace runs
fn canonical_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
