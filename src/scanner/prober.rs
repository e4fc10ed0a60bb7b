//! The single-request HTTP(S) probe.
use log::debug;
use reqwest::header::{HeaderMap, CONNECTION, HOST};
use reqwest::Client;
use std::collections::BTreeMap;
use std::error::Error;
use std::future::Future;
use std::time::Duration;

use super::outcome::ProbeOutcome;
use crate::target::Target;

/// Sent with every probe.
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

/// Turns one target into one outcome.
///
/// Implementations must not panic and must report every failure through
/// [`ProbeOutcome::error`] so a bad target never stops the pool.
pub trait Probe: Send + Sync + 'static {
    /// Probes `target` once. Errors are part of the returned outcome.
    fn probe(&self, target: Target) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Probes targets with a shared `reqwest` client.
///
/// Certificates are not verified, responses are not decompressed and idle
/// connections are never kept, so every probe opens its own connection.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    /// Builds the client. `timeout` covers the whole exchange, body included.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(true)
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .pool_max_idle_per_host(0)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Sends the GET for `target` to `url` and collects what comes back.
    pub(crate) async fn fetch(&self, target: &Target, url: &str) -> ProbeOutcome {
        let mut outcome = ProbeOutcome::for_target(target);

        let response = match self
            .client
            .get(url)
            .header(HOST, target.virtual_host.as_str())
            .header(CONNECTION, "close")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Request to {target} failed: {e}");
                outcome.error = Some(error_chain(&e));
                return outcome;
            }
        };

        outcome.status = Some(response.status().as_u16());
        outcome.headers = canonical_headers(response.headers());

        match response.bytes().await {
            Ok(body) => outcome.body = String::from_utf8_lossy(&body).into_owned(),
            Err(e) => {
                debug!("Reading body from {target} failed: {e}");
                outcome.error = Some(error_chain(&e));
            }
        }

        outcome
    }
}

impl Probe for HttpProber {
    async fn probe(&self, target: Target) -> ProbeOutcome {
        match target.url() {
            Ok(url) => self.fetch(&target, &url).await,
            Err(e) => ProbeOutcome::failed(&target, e.to_string()),
        }
    }
}

/// The error followed by its sources, `reqwest` keeps the useful part
/// (refused, timed out, certificate) in the chain.
fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.ends_with(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

fn canonical_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        out.entry(canonical_name(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    out
}

/// `x-powered-by` -> `X-Powered-By`
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::{canonical_name, HttpProber, Probe, USER_AGENT};
    use crate::target::Target;
    use parameterized::parameterized;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_rustls::rustls::crypto::ring::default_provider;
    use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
    use tokio_rustls::rustls::ServerConfig;
    use tokio_rustls::TlsAcceptor;

    /// Reads up to the end of the request head.
    async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> String {
        let mut buf = vec![0u8; 4096];
        let mut read = 0;
        while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf[read..]).await.unwrap();
            if n == 0 {
                break;
            }
            read += n;
        }
        String::from_utf8_lossy(&buf[..read]).to_string()
    }

    /// Serves one connection: echoes the request head as the body.
    async fn echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let head = read_head(&mut stream).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nset-cookie: a=1\r\nset-cookie: b=2\r\nx-powered-by: test\r\nconnection: close\r\n\r\n{}",
                head.len(),
                head
            );
            stream.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Announces a 100 byte body, sends 5 bytes and hangs up.
    async fn short_body_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_head(&mut stream).await;
            stream
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\nserver: x\r\n\r\nhello")
                .await
                .unwrap();
            stream.shutdown().await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Serves one HTTPS response with a self-signed certificate issued for
    /// another name than the one connected to.
    async fn self_signed_server() -> String {
        let cert = rcgen::generate_simple_self_signed(vec!["wrong.example".to_owned()]).unwrap();
        let cert_der = CertificateDer::from(cert.serialize_der().unwrap());
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));
        let config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der)
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut stream = acceptor.accept(stream).await.unwrap();
            read_head(&mut stream).await;
            stream
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nserver: tls\r\nconnection: close\r\n\r\nok")
                .await
                .unwrap();
            stream.shutdown().await.unwrap();
        });
        format!("https://{addr}")
    }

    /// Accepts connections and never answers.
    async fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        format!("http://{addr}")
    }

    #[parameterized(name = {
        "content-type", "x-powered-by", "server", "www-authenticate", "x--odd",
    }, expected = {
        "Content-Type", "X-Powered-By", "Server", "Www-Authenticate", "X--Odd",
    })]
    fn canonical_header_names(name: &str, expected: &str) {
        assert_eq!(canonical_name(name), expected);
    }

    #[tokio::test]
    async fn sends_virtual_host_and_records_response() {
        let url = echo_server().await;
        let prober = HttpProber::new(Duration::from_secs(5)).unwrap();
        let target = Target::new("127.0.0.1", "80", "vhost.example");

        let outcome = prober.fetch(&target, &url).await;

        assert!(outcome.is_success(), "{:?}", outcome.error);
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.virtual_host, "vhost.example");
        let body = outcome.body.to_lowercase();
        assert!(body.contains("host: vhost.example"));
        assert!(body.contains("connection: close"));
        assert!(body.contains(&format!("user-agent: {}", USER_AGENT.to_lowercase())));
        assert!(!body.contains("accept-encoding: gzip"));
        assert_eq!(outcome.headers["Set-Cookie"], ["a=1", "b=2"]);
        assert_eq!(outcome.headers["X-Powered-By"], ["test"]);
    }

    #[tokio::test]
    async fn timeout_yields_error_and_no_body() {
        let url = silent_server().await;
        let prober = HttpProber::new(Duration::from_millis(50)).unwrap();
        let target = Target::new("127.0.0.1", "80", "127.0.0.1");

        let outcome = prober.fetch(&target, &url).await;

        assert!(!outcome.is_success());
        assert!(!outcome.error.unwrap().is_empty());
        assert!(outcome.body.is_empty());
        assert!(outcome.headers.is_empty());
    }

    #[tokio::test]
    async fn refused_connection_is_recorded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let prober = HttpProber::new(Duration::from_secs(2)).unwrap();
        let target = Target::new("127.0.0.1", "80", "127.0.0.1");

        let outcome = prober.fetch(&target, &format!("http://{addr}")).await;

        assert!(outcome.error.is_some());
        assert_eq!(outcome.status, None);
    }

    #[tokio::test]
    async fn invalid_certificate_is_accepted() {
        let url = self_signed_server().await;
        let prober = HttpProber::new(Duration::from_secs(5)).unwrap();
        let target = Target::new("127.0.0.1", "443", "127.0.0.1");

        let outcome = prober.fetch(&target, &url).await;

        assert!(outcome.error.is_none(), "{:?}", outcome.error);
        assert_eq!(outcome.body, "ok");
        assert_eq!(outcome.headers["Server"], ["tls"]);
        assert_eq!(outcome.headers["Content-Length"], ["2"]);
    }

    #[tokio::test]
    async fn truncated_body_keeps_headers_and_records_error() {
        let url = short_body_server().await;
        let prober = HttpProber::new(Duration::from_secs(5)).unwrap();
        let target = Target::new("127.0.0.1", "80", "127.0.0.1");

        let outcome = prober.fetch(&target, &url).await;

        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.headers["Server"], ["x"]);
        assert_eq!(outcome.headers["Content-Length"], ["100"]);
        assert!(outcome.error.is_some());
        assert!(outcome.body.is_empty());
    }

    #[tokio::test]
    async fn unsupported_port_is_not_requested() {
        let prober = HttpProber::new(Duration::from_secs(1)).unwrap();
        let target = Target::new("203.0.113.1", "8080", "203.0.113.1");

        let outcome = prober.probe(target).await;

        assert!(outcome.error.unwrap().contains("unsupported port"));
        assert_eq!(outcome.status, None);
        assert_eq!(outcome.port, "8080");
    }
}
