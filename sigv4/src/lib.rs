//! AWS Signature Version 4 request signing.
//!
//! Every function in this crate is a pure function of its inputs: there is no
//! cached key material and no clock access. Callers pass the timestamp they
//! will send in the `X-Amz-Date` header and get back the value of the
//! `Authorization` header.

mod canonical;
mod key;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use std::fmt;

pub use canonical::{
    canonical_headers, canonical_query_string, canonical_request, signed_headers, trim_all,
    uri_encode,
};
pub use key::{hmac_sha256, sha256_hex, signing_key};

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const AMZ_DATE_HEADER: &str = "x-amz-date";
const SCOPE_TERMINATOR: &str = "aws4_request";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub service: String,
}

impl Credentials {
    pub fn new<A, S, R, V>(access_key: A, secret_key: S, region: R, service: V) -> Self
    where
        A: Into<String>,
        S: Into<String>,
        R: Into<String>,
        V: Into<String>,
    {
        Credentials {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
            service: service.into(),
        }
    }
}

// The secret key never ends up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("service", &self.service)
            .finish()
    }
}

/// The parts of an HTTP request covered by the signature.
///
/// `authority` is the `host[:port]` the request is sent to. It always
/// overrides any `host` entry in `headers`.
#[derive(Debug, Clone, Copy)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub authority: &'a str,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Value for the `Authorization` header.
    pub authorization: String,
    /// Lower-case hex signature.
    pub signature: String,
    pub signed_headers: String,
    pub amz_date: String,
}

/// `yyyyMMdd` in UTC.
pub fn date_stamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d").to_string()
}

/// `yyyyMMddTHHmmssZ` in UTC, the format of the `X-Amz-Date` header.
pub fn amz_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn credential_scope(date_stamp: &str, region: &str, service: &str) -> String {
    format!("{date_stamp}/{region}/{service}/{SCOPE_TERMINATOR}")
}

pub fn string_to_sign(amz_date: &str, credential_scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    )
}

/// Signs `request` and returns the authorization header value.
pub fn sign(
    request: &SignableRequest<'_>,
    credentials: &Credentials,
    timestamp: DateTime<Utc>,
) -> Signature {
    let date_stamp = date_stamp(timestamp);
    let amz_date = amz_date(timestamp);

    let headers = canonical_headers(request.headers, request.authority);
    let signed_headers = signed_headers(&headers);
    let canonical_request = canonical_request(
        request.method,
        request.path,
        &canonical_query_string(request.query),
        &headers,
        request.body,
    );

    let scope = credential_scope(&date_stamp, &credentials.region, &credentials.service);
    let string_to_sign = string_to_sign(&amz_date, &scope, &canonical_request);

    let key = signing_key(
        &credentials.secret_key,
        &date_stamp,
        &credentials.region,
        &credentials.service,
    );
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key
    );

    Signature {
        authorization,
        signature,
        signed_headers,
        amz_date,
    }
}
