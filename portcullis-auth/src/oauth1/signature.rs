//! RFC 5849 HMAC-SHA1 request signing.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::Url;

type HmacSha1 = Hmac<Sha1>;

pub(super) const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub(super) const VERSION: &str = "1.0";

/// RFC 3986 percent-encoding, leaving only unreserved characters as they are.
pub(super) fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// `METHOD&encoded(base URI)&encoded(normalized parameters)`
///
/// `params` are the protocol parameters plus any form body parameters; query
/// parameters are taken from `url`.
pub(super) fn base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let base_uri = match url.port() {
        Some(port) => format!(
            "{}://{}:{}{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            port,
            url.path()
        ),
        None => format!(
            "{}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            url.path()
        ),
    };

    let mut encoded: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| (percent_encode(&name), percent_encode(&value)))
        .chain(
            params
                .iter()
                .map(|(name, value)| (percent_encode(name), percent_encode(value))),
        )
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(&base_uri),
        percent_encode(&normalized)
    )
}

/// Base64 HMAC-SHA1 of the base string, keyed with `consumer_secret&token_secret`.
pub(super) fn sign(base_string: &str, consumer_secret: &str, token_secret: Option<&str>) -> String {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret.unwrap_or_default())
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any size"));
    mac.update(base_string.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// `OAuth name="value", ...` over the protocol parameters and the signature.
pub(super) fn authorization_header(oauth_params: &[(String, String)]) -> String {
    let fields = oauth_params
        .iter()
        .map(|(name, value)| format!("{}=\"{}\"", percent_encode(name), percent_encode(value)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {}", fields)
}
