use std::sync::Arc;
use std::time::Duration;

use hyper::client::HttpConnector;
use hyper::{Body, Client, Uri};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use webpki_roots::TLS_SERVER_ROOTS;

use crate::traits::{AdapterError, AdapterResult};

pub(crate) type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Pooled HTTPS client trusting the bundled web PKI roots. Plain `http`
/// stays allowed so local gateways work.
pub(crate) fn https_client(pool_idle: Duration) -> HyperClient {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let tls = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut connector = HttpConnector::new();
    connector.enforce_http(false);
    connector.set_nodelay(true);

    Client::builder()
        .pool_idle_timeout(pool_idle)
        .build::<_, Body>(HttpsConnector::from((connector, Arc::new(tls))))
}

/// Joins `path` onto a base URL that already ends in `/`.
pub(crate) fn endpoint(base_url: &str, path: &str) -> AdapterResult<Uri> {
    let uri = format!("{base_url}{}", path.trim_start_matches('/'))
        .parse::<Uri>()
        .map_err(|err| AdapterError::configuration(format!("invalid endpoint: {err}")))?;
    match uri.scheme_str() {
        Some("http" | "https") => Ok(uri),
        _ => Err(AdapterError::configuration(format!(
            "endpoint `{uri}` must use http or https"
        ))),
    }
}
