use std::io::Read;

use ureq::ResponseExt;

use crate::error::UpgradeError;

const USER_AGENT: &str = concat!("vu/", env!("CARGO_PKG_VERSION"));

/// The two HTTP operations an update run needs.
pub trait Transport {
    /// GETs `url`, following redirects, and returns the URL that finally answered.
    fn resolve(&self, url: &str) -> Result<String, UpgradeError>;

    /// GETs `url` and returns a reader over the response body.
    fn fetch(&self, url: &str) -> Result<Box<dyn Read>, UpgradeError>;
}

/// Blocking transport on a default ureq agent. No timeouts are configured.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_agent(ureq::Agent::new_with_defaults())
    }

    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn resolve(&self, url: &str) -> Result<String, UpgradeError> {
        let response = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|err| UpgradeError::network(url, err))?;
        let resolved = response.get_uri().to_string();
        tracing::debug!(url, %resolved, "resolved redirect");
        Ok(resolved)
    }

    fn fetch(&self, url: &str) -> Result<Box<dyn Read>, UpgradeError> {
        let response = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|err| UpgradeError::network(url, err))?;
        tracing::debug!(url, status = %response.status(), "fetching body");
        Ok(Box::new(response.into_body().into_reader()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::{Cursor, Write};
    use std::net::TcpListener;
    use std::thread;

    /// In-memory transport: fixed redirect targets and response bodies.
    #[derive(Default)]
    pub struct FakeTransport {
        pub redirects: HashMap<String, String>,
        pub bodies: HashMap<String, Vec<u8>>,
        pub requests: RefCell<Vec<String>>,
    }

    impl FakeTransport {
        pub fn redirect(mut self, from: &str, to: &str) -> Self {
            self.redirects.insert(from.to_string(), to.to_string());
            self
        }

        pub fn body(mut self, url: &str, body: Vec<u8>) -> Self {
            self.bodies.insert(url.to_string(), body);
            self
        }

        fn not_found(url: &str) -> UpgradeError {
            UpgradeError::network(url, ureq::Error::StatusCode(404))
        }
    }

    impl Transport for FakeTransport {
        fn resolve(&self, url: &str) -> Result<String, UpgradeError> {
            self.requests.borrow_mut().push(url.to_string());
            self.redirects
                .get(url)
                .cloned()
                .ok_or_else(|| Self::not_found(url))
        }

        fn fetch(&self, url: &str) -> Result<Box<dyn Read>, UpgradeError> {
            self.requests.borrow_mut().push(url.to_string());
            let body = self.bodies.get(url).ok_or_else(|| Self::not_found(url))?;
            Ok(Box::new(Cursor::new(body.clone())))
        }
    }

    /// Serves one canned response per accepted connection on a loopback port.
    fn serve(responses: impl FnOnce(u16) -> Vec<String> + Send + 'static) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            for response in responses(port) {
                let (mut stream, _) = listener.accept().unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        port
    }

    /// Loopback requests must not go through a proxy picked up from the environment.
    fn direct() -> UreqTransport {
        let config = ureq::Agent::config_builder().proxy(None).build();
        UreqTransport::with_agent(ureq::Agent::new_with_config(config))
    }

    fn ok_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    #[test]
    fn test_ureq_resolve_follows_redirect() {
        let port = serve(|port| {
            vec![
                format!(
                    "HTTP/1.1 302 Found\r\nLocation: http://127.0.0.1:{port}/releases/tag/v1.4.4.9\r\n\
                     Content-Length: 0\r\nConnection: close\r\n\r\n"
                ),
                ok_response("release page"),
            ]
        });
        let resolved = direct()
            .resolve(&format!("http://127.0.0.1:{port}/releases/latest"))
            .unwrap();
        assert_eq!(
            resolved,
            format!("http://127.0.0.1:{port}/releases/tag/v1.4.4.9")
        );
    }

    #[test]
    fn test_ureq_fetch_streams_body() {
        let port = serve(|_| vec![ok_response("zip bytes")]);
        let mut body = Vec::new();
        direct()
            .fetch(&format!("http://127.0.0.1:{port}/server.zip"))
            .unwrap()
            .read_to_end(&mut body)
            .unwrap();
        assert_eq!(body, b"zip bytes");
    }

    #[test]
    fn test_ureq_fetch_error_status() {
        let port = serve(|_| {
            vec!["HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()]
        });
        let Err(err) = direct().fetch(&format!("http://127.0.0.1:{port}/missing.zip")) else {
            panic!("404 must fail");
        };
        assert_eq!(err.kind(), crate::error::ErrorKind::Network);
    }
}
