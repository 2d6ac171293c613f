//! HTTP access to the vendor host.

use std::{fs, future::Future, time::Duration};

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::{Certificate, Client, StatusCode};
use tracing::debug;

use crate::{
    config::AppConfig,
    error::{CatalogError, CatalogResult},
};

/// Anything able to produce raw patch metadata for an identifier.
pub trait PatchSource: Send + Sync + 'static {
    /// Fetch the complete patch document for `code`.
    fn fetch(&self, code: &str) -> impl Future<Output = CatalogResult<Bytes>> + Send;
}

/// HTTPS client for the vendor's patch metadata host.
#[derive(Clone)]
pub struct PatchFetcher {
    client: Client,
    base_url: String,
}

impl PatchFetcher {
    /// Build a fetcher from application configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(concat!("titlepatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs));

        if let Some(path) = &config.extra_root_certificate {
            let pem = fs::read(path)
                .with_context(|| format!("failed to read certificate {}", path.display()))?;
            let cert = Certificate::from_pem(&pem)
                .with_context(|| format!("failed to parse certificate {}", path.display()))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build().context("failed to build HTTP client")?;
        Ok(Self::with_client(client, &config.vendor_base_url))
    }

    /// Use an existing client against `base_url`.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Location of the patch document for `code`.
    pub fn url_for(&self, code: &str) -> String {
        format!("{}/tpl/np/{code}/{code}-ver.xml", self.base_url)
    }
}

impl PatchSource for PatchFetcher {
    async fn fetch(&self, code: &str) -> CatalogResult<Bytes> {
        let url = self.url_for(code);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        debug!(%code, status = status.as_u16(), "vendor responded");

        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(code.to_string()));
        }
        if !status.is_success() {
            return Err(CatalogError::UnexpectedStatus {
                code: code.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(CatalogError::EmptyContent(code.to_string()));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode as HttpStatus, routing::get, Router};
    use tokio::net::TcpListener;

    async fn vendor(Path((code, _file)): Path<(String, String)>) -> (HttpStatus, String) {
        match code.as_str() {
            "NPUB31419" => (
                HttpStatus::OK,
                r#"<titlepatch titleid="NPUB31419"><tag><package><paramsfo><TITLE>Minecraft</TITLE></paramsfo></package></tag></titlepatch>"#.to_string(),
            ),
            "NPUB00001" => {
                let packages = "<package version=\"01.00\"/>".repeat(20_000);
                (
                    HttpStatus::OK,
                    format!("<titlepatch><tag>{packages}<package><paramsfo><TITLE>Big</TITLE></paramsfo></package></tag></titlepatch>"),
                )
            }
            "NPUB00002" => (HttpStatus::OK, String::new()),
            "NPUB00003" => (HttpStatus::SERVICE_UNAVAILABLE, "busy".to_string()),
            _ => (HttpStatus::NOT_FOUND, String::new()),
        }
    }

    async fn spawn_vendor() -> Result<PatchFetcher> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let router = Router::new().route("/tpl/np/{code}/{file}", get(vendor));
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(PatchFetcher::with_client(
            Client::new(),
            &format!("http://{addr}/"),
        ))
    }

    #[test]
    fn url_embeds_identifier_twice() {
        let fetcher = PatchFetcher::with_client(Client::new(), "https://vendor.example/");
        assert_eq!(
            fetcher.url_for("NPUB31419"),
            "https://vendor.example/tpl/np/NPUB31419/NPUB31419-ver.xml"
        );
    }

    #[tokio::test]
    async fn fetches_full_document() -> Result<()> {
        let fetcher = spawn_vendor().await?;
        let body = fetcher.fetch("NPUB31419").await?;
        assert!(body.starts_with(b"<titlepatch"));

        let big = fetcher.fetch("NPUB00001").await?;
        assert!(big.len() > 400_000);
        assert!(big.ends_with(b"</titlepatch>"));
        Ok(())
    }

    #[tokio::test]
    async fn maps_vendor_failures() -> Result<()> {
        let fetcher = spawn_vendor().await?;
        assert!(matches!(
            fetcher.fetch("NPUB99999").await,
            Err(CatalogError::NotFound(code)) if code == "NPUB99999"
        ));
        assert!(matches!(
            fetcher.fetch("NPUB00002").await,
            Err(CatalogError::EmptyContent(_))
        ));
        assert!(matches!(
            fetcher.fetch("NPUB00003").await,
            Err(CatalogError::UnexpectedStatus { status: 503, .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn connection_failures_are_transport_errors() {
        let fetcher = PatchFetcher::with_client(Client::new(), "http://127.0.0.1:1");
        assert!(matches!(
            fetcher.fetch("NPUB31419").await,
            Err(CatalogError::Transport(_))
        ));
    }
}
