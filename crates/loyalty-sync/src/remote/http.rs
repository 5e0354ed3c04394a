//! HTTP implementation of [`RemoteStore`].
//!
//! ## Endpoints
//! ```text
//! GET  /health
//! GET  /customers/{id}
//! GET  /customers/email/{email}
//! GET  /customers/phone/{phone}
//! GET  /stores/{store_id}/products/{barcode}
//! POST /purchases           (Idempotency-Key: sale id)
//! POST /points/deltas       (Idempotency-Key: sale id)
//! ```
//!
//! Ids, emails, phones and barcodes are percent-encoded as single path
//! segments, so a `/` or `?` in a value never changes the route.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use loyalty_core::{Customer, CustomerKey, LedgerDelta, Product, Sale};

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::config::RemoteSettings;
use crate::error::{SyncError, SyncResult};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// JSON client for the loyalty backend.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl HttpRemote {
    pub fn new(settings: &RemoteSettings) -> SyncResult<Self> {
        let base_url = Url::parse(&settings.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidConfig(format!(
                "remote.base_url cannot carry a path: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(HttpRemote {
            client,
            base_url,
            api_key: settings.api_key.clone(),
            timeout_secs: settings.request_timeout_secs,
        })
    }

    /// Base URL with `segments` appended, each one percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidResponse(format!("bad base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout(self.timeout_secs)
        } else if err.is_decode() {
            RemoteError::InvalidResponse(err.to_string())
        } else {
            RemoteError::Unreachable(err.to_string())
        }
    }

    /// GET returning `None` on 404.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> RemoteResult<Option<T>> {
        let url = self.endpoint(segments)?;
        debug!(%url, "Remote GET");

        let response = self.send(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_status(response).await?;
        let body = response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        Ok(Some(body))
    }

    /// Idempotent POST keyed by sale id. A 409 means the backend already has it.
    async fn post_idempotent<B: serde::Serialize + ?Sized>(
        &self,
        segments: &[&str],
        sale_id: &str,
        body: &B,
    ) -> RemoteResult<()> {
        let url = self.endpoint(segments)?;
        debug!(%url, sale_id = %sale_id, "Remote POST");

        let request = self
            .client
            .post(url)
            .header(IDEMPOTENCY_HEADER, sale_id)
            .json(body);

        let response = self.send(request).await?;
        if response.status() == StatusCode::CONFLICT {
            debug!(sale_id = %sale_id, "Remote already has this sale");
            return Ok(());
        }

        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(RemoteError::Server {
            status: status.as_u16(),
            message,
        })
    } else {
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn customer_segments(key: &CustomerKey) -> Vec<&str> {
    match key {
        CustomerKey::Id(id) => vec!["customers", id.as_str()],
        CustomerKey::Email(email) => vec!["customers", "email", email.as_str()],
        CustomerKey::Phone(phone) => vec!["customers", "phone", phone.as_str()],
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn lookup_customer(&self, key: &CustomerKey) -> RemoteResult<Option<Customer>> {
        self.get_optional(&customer_segments(key)).await
    }

    async fn lookup_product_by_barcode(
        &self,
        code: &str,
        store_id: &str,
    ) -> RemoteResult<Option<Product>> {
        self.get_optional(&["stores", store_id, "products", code])
            .await
    }

    async fn commit_sale(&self, sale: &Sale) -> RemoteResult<()> {
        self.post_idempotent(&["purchases"], &sale.id, sale).await
    }

    async fn commit_ledger_delta(&self, delta: &LedgerDelta) -> RemoteResult<()> {
        self.post_idempotent(&["points", "deltas"], &delta.sale_id, delta)
            .await
    }

    async fn ping(&self) -> RemoteResult<()> {
        let url = self.endpoint(&["health"])?;
        let response = self.send(self.client.get(url)).await?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base_url: &str) -> RemoteSettings {
        RemoteSettings {
            base_url: base_url.to_string(),
            ..RemoteSettings::default()
        }
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        for base in [
            "https://api.example.com/loyalty/v1",
            "https://api.example.com/loyalty/v1/",
        ] {
            let remote = HttpRemote::new(&settings(base)).unwrap();
            assert_eq!(
                remote.endpoint(&["purchases"]).unwrap().as_str(),
                "https://api.example.com/loyalty/v1/purchases"
            );
        }

        let remote = HttpRemote::new(&settings("https://api.example.com")).unwrap();
        assert_eq!(
            remote.endpoint(&["points", "deltas"]).unwrap().as_str(),
            "https://api.example.com/points/deltas"
        );
    }

    #[test]
    fn test_customer_paths() {
        let remote = HttpRemote::new(&settings("https://api.example.com/v1")).unwrap();
        let url = |key: CustomerKey| {
            remote
                .endpoint(&customer_segments(&key))
                .unwrap()
                .as_str()
                .to_string()
        };

        assert_eq!(
            url(CustomerKey::Id("c-1".into())),
            "https://api.example.com/v1/customers/c-1"
        );
        assert_eq!(
            url(CustomerKey::Email("ana@example.com".into())),
            "https://api.example.com/v1/customers/email/ana@example.com"
        );
        assert_eq!(
            url(CustomerKey::Phone("841234567".into())),
            "https://api.example.com/v1/customers/phone/841234567"
        );
    }

    #[test]
    fn test_reserved_characters_stay_in_one_segment() {
        let remote = HttpRemote::new(&settings("https://api.example.com/v1")).unwrap();

        let url = remote
            .endpoint(&customer_segments(&CustomerKey::Email("a/b?x#y@example.com".into())))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/customers/email/a%2Fb%3Fx%23y@example.com"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let url = remote
            .endpoint(&["stores", "store 1", "products", "60/01"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/stores/store%201/products/60%2F01"
        );
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(matches!(
            HttpRemote::new(&settings("not a url")),
            Err(SyncError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpRemote::new(&settings("mailto:ops@example.com")),
            Err(SyncError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        // Port 9 (discard) on localhost is closed in test environments
        let remote = HttpRemote::new(&settings("http://127.0.0.1:9")).unwrap();
        let err = remote.ping().await.unwrap_err();
        assert!(err.is_transient());
    }
}
