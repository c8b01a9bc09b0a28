use std::fs::{self, File};
use std::path::Path;

use log::{debug, info};
use reqwest::StatusCode;

use super::archive::extract_zip;
use super::{DatasetId, DatasetSource};
use crate::config::Credentials;
use crate::error::{Error, Result};

/// Downloads dataset archives from the Kaggle API with basic auth.
pub struct KaggleSource {
    api_base: String,
    credentials: Credentials,
    client: reqwest::blocking::Client,
}

impl KaggleSource {
    pub fn new(api_base: &str, credentials: Credentials) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Acquisition(format!("building HTTP client: {e}")))?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    /// Credentials from the environment, see [`Credentials::discover`].
    pub fn from_env(api_base: &str) -> Result<Self> {
        Self::new(api_base, Credentials::discover()?)
    }

    pub fn download_url(&self, id: &DatasetId) -> String {
        format!("{}/datasets/download/{}/{}", self.api_base, id.owner, id.slug)
    }
}

impl DatasetSource for KaggleSource {
    fn fetch(&self, id: &DatasetId, dest: &Path) -> Result<()> {
        let url = self.download_url(id);
        info!("downloading {id} from {url}");

        let mut response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.key))
            .send()
            .map_err(|e| Error::Acquisition(format!("GET {url}: {e}")))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::Authentication(format!(
                    "{status} from {url} for user '{}'",
                    self.credentials.username
                )));
            }
            s if !s.is_success() => {
                return Err(Error::Acquisition(format!("{status} from {url}")));
            }
            _ => {}
        }

        fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
        let archive = dest.join(format!("{}.zip", id.slug));
        let mut file = File::create(&archive).map_err(|e| Error::io(&archive, e))?;
        let bytes = response
            .copy_to(&mut file)
            .map_err(|e| Error::Acquisition(format!("reading body of {url}: {e}")))?;
        drop(file);
        debug!("downloaded {bytes} bytes to {}", archive.display());

        extract_zip(&archive, dest)?;
        fs::remove_file(&archive).map_err(|e| Error::io(&archive, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;
    use crate::acquire::archive::tests::write_zip;

    fn source(base: &str) -> KaggleSource {
        let creds = Credentials {
            username: "user".into(),
            key: "key".into(),
        };
        KaggleSource::new(base, creds).unwrap()
    }

    #[test]
    fn download_url_follows_api_layout() {
        let id: DatasetId = "epa/fuel-economy".parse().unwrap();
        assert_eq!(
            source("https://www.kaggle.com/api/v1/").download_url(&id),
            "https://www.kaggle.com/api/v1/datasets/download/epa/fuel-economy"
        );
    }

    /// Answer a single HTTP request with `status` and `body`, returning the
    /// API base URL to point the source at.
    fn serve_once(status: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let mut request = Vec::new();
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(&body).unwrap();
        });
        format!("http://{addr}/api/v1")
    }

    #[test]
    fn rejected_credentials_are_an_authentication_error() {
        let dir = tempfile::tempdir().unwrap();
        let id: DatasetId = "epa/fuel-economy".parse().unwrap();
        let base = serve_once("401 Unauthorized", Vec::new());

        let err = source(&base).fetch(&id, dir.path()).unwrap_err();
        assert!(err.is_authentication(), "got {err}");
    }

    #[test]
    fn server_errors_are_acquisition_errors() {
        let dir = tempfile::tempdir().unwrap();
        let id: DatasetId = "epa/fuel-economy".parse().unwrap();
        let base = serve_once("404 Not Found", b"{}".to_vec());

        let err = source(&base).fetch(&id, dir.path()).unwrap_err();
        assert!(matches!(err, Error::Acquisition(_)), "got {err}");
    }

    #[test]
    fn downloads_and_extracts_archive() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("fixture.zip");
        write_zip(&zip_path, &[("database.csv", "Year,Make\n2017,Ford\n")]);
        let base = serve_once("200 OK", fs::read(&zip_path).unwrap());

        let dest = dir.path().join("gen");
        let id: DatasetId = "epa/fuel-economy".parse().unwrap();
        source(&base).fetch(&id, &dest).unwrap();

        assert_eq!(
            fs::read_to_string(dest.join("database.csv")).unwrap(),
            "Year,Make\n2017,Ford\n"
        );
        assert!(!dest.join("fuel-economy.zip").exists());
    }

    #[test]
    fn unreachable_host_is_an_acquisition_error() {
        let dir = tempfile::tempdir().unwrap();
        let id: DatasetId = "epa/fuel-economy".parse().unwrap();
        // Port 9 (discard) on localhost is not expected to speak HTTP.
        let err = source("http://127.0.0.1:9/api/v1").fetch(&id, dir.path()).unwrap_err();
        assert!(matches!(err, Error::Acquisition(_)), "got {err}");
    }
}
