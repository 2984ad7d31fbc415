//! Query-string request signing (AWS Signature V4 layout)
//!
//! Used by the memory backend to issue and check pre-signed URLs offline.
//! PUT URLs sign `x-amz-acl` and `content-type` as headers, so the eventual
//! request has to carry exactly the values the URL was issued for.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use stowkey_core::types::{PresignRequest, SignedUrl};
use stowkey_core::{Error, Result};
use tracing::debug;
use url::Url;

const X_AMZ_ALGORITHM: &str = "X-Amz-Algorithm";
const X_AMZ_CREDENTIAL: &str = "X-Amz-Credential";
const X_AMZ_DATE: &str = "X-Amz-Date";
const X_AMZ_EXPIRES: &str = "X-Amz-Expires";
const X_AMZ_SIGNED_HEADERS: &str = "X-Amz-SignedHeaders";
const X_AMZ_SIGNATURE: &str = "X-Amz-Signature";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// RFC 3986 unreserved characters stay as they are
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const URI_PATH: &AsciiSet = &URI_COMPONENT.remove(b'/');

/// Signing identity of a store
#[derive(Debug, Clone)]
pub(crate) struct SigningKey {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Produce a pre-signed URL below `bucket_url` (`http://host/bucket`)
pub(crate) fn presign(
    request: &PresignRequest,
    bucket_url: &str,
    signing: &SigningKey,
    now: DateTime<Utc>,
) -> Result<SignedUrl> {
    let base = Url::parse(bucket_url)
        .map_err(|e| Error::InvalidConfig(format!("Invalid endpoint {}: {}", bucket_url, e)))?;
    let host = host_header(&base)?;

    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();
    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, signing.region);
    let expires_in = request.expires_in.as_secs();

    let canonical_uri = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        utf8_percent_encode(request.key.to_backend_key(), URI_PATH)
    );

    // Headers the caller must replay
    let mut bound: Vec<(String, String)> = Vec::new();
    if let Some(acl) = request.acl {
        bound.push(("x-amz-acl".to_string(), acl.as_str().to_string()));
    }
    if let Some(content_type) = &request.content_type {
        bound.push(("content-type".to_string(), content_type.clone()));
    }

    let mut headers: BTreeMap<String, String> = bound.iter().cloned().collect();
    headers.insert("host".to_string(), host);
    let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");

    let mut query: BTreeMap<String, String> = BTreeMap::new();
    query.insert(X_AMZ_ALGORITHM.to_string(), ALGORITHM.to_string());
    query.insert(
        X_AMZ_CREDENTIAL.to_string(),
        format!("{}/{}", signing.access_key, credential_scope),
    );
    query.insert(X_AMZ_DATE.to_string(), amz_date.clone());
    query.insert(X_AMZ_EXPIRES.to_string(), expires_in.to_string());
    query.insert(X_AMZ_SIGNED_HEADERS.to_string(), signed_headers.clone());

    let canonical_query = canonical_query_string(&query);
    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.operation.method(),
        canonical_uri,
        canonical_query,
        canonical_headers(&headers),
        signed_headers,
        UNSIGNED_PAYLOAD
    );
    debug!("Canonical request for presigning:\n{}", canonical_request);

    let signature = sign(signing, &date_stamp, &amz_date, &canonical_request);

    let mut url = base.clone();
    url.set_path(&canonical_uri);
    url.set_query(Some(&format!(
        "{}&{}={}",
        canonical_query, X_AMZ_SIGNATURE, signature
    )));

    Ok(SignedUrl {
        url: url.to_string(),
        method: request.operation.method().to_string(),
        expires_at: now + Duration::seconds(expires_in as i64),
        headers: bound,
    })
}

/// Check a request made against a pre-signed URL.
///
/// `headers` are the headers the client actually sent. Returns the object
/// path of the URL (below the bucket) on success.
pub(crate) fn verify(
    method: &str,
    url: &str,
    headers: &[(&str, &str)],
    signing: &SigningKey,
    now: DateTime<Utc>,
) -> Result<String> {
    let url = Url::parse(url).map_err(|e| Error::InvalidArgument(format!("Invalid URL: {}", e)))?;

    let mut params: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
    let provided = params
        .remove(X_AMZ_SIGNATURE)
        .ok_or_else(|| Error::InvalidArgument("Missing X-Amz-Signature".into()))?;

    let param = |name: &str| {
        params
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidArgument(format!("Missing {}", name)))
    };
    let algorithm = param(X_AMZ_ALGORITHM)?;
    let credential = param(X_AMZ_CREDENTIAL)?;
    let amz_date = param(X_AMZ_DATE)?;
    let expires = param(X_AMZ_EXPIRES)?;
    let signed_headers = param(X_AMZ_SIGNED_HEADERS)?;

    if algorithm != ALGORITHM {
        return Err(Error::InvalidArgument("Unsupported algorithm".into()));
    }

    let issued_at = chrono::NaiveDateTime::parse_from_str(&amz_date, "%Y%m%dT%H%M%SZ")
        .map(|dt| dt.and_utc())
        .map_err(|_| Error::InvalidArgument("Invalid X-Amz-Date format".into()))?;
    let expires: i64 = expires
        .parse()
        .map_err(|_| Error::InvalidArgument("Invalid expires value".into()))?;
    if now > issued_at + Duration::seconds(expires) {
        return Err(Error::ExpiredPresignedRequest);
    }

    let cred_parts: Vec<&str> = credential.split('/').collect();
    if cred_parts.len() != 5 || cred_parts[0] != signing.access_key {
        return Err(Error::SignatureDoesNotMatch);
    }
    let date_stamp = cred_parts[1];

    let sent: BTreeMap<String, String> = headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let mut canonical = BTreeMap::new();
    for name in signed_headers.split(';') {
        let value = if name == "host" {
            host_header(&url)?
        } else {
            sent.get(name).cloned().ok_or(Error::SignatureDoesNotMatch)?
        };
        canonical.insert(name.to_string(), value);
    }

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method.to_ascii_uppercase(),
        url.path(),
        canonical_query_string(&params),
        canonical_headers(&canonical),
        signed_headers,
        UNSIGNED_PAYLOAD
    );
    debug!("Canonical request for verification:\n{}", canonical_request);

    let expected = sign(signing, date_stamp, &amz_date, &canonical_request);
    if expected != provided {
        return Err(Error::SignatureDoesNotMatch);
    }

    Ok(url.path().to_string())
}

fn sign(signing: &SigningKey, date_stamp: &str, amz_date: &str, canonical_request: &str) -> String {
    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, signing.region);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        credential_scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let k_date = hmac_sha256(
        format!("AWS4{}", signing.secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, signing.region.as_bytes());
    let k_service = hmac_sha256(&k_region, b"s3");
    let k_signing = hmac_sha256(&k_service, b"aws4_request");
    hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()))
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn canonical_query_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, URI_COMPONENT),
                utf8_percent_encode(v, URI_COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn canonical_headers(headers: &BTreeMap<String, String>) -> String {
    headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
        .collect()
}

fn host_header(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidArgument(format!("No host in URL: {}", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
