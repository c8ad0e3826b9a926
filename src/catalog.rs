use std::sync::atomic::{AtomicBool, Ordering};

use crate::client::ScholarshipApi;
use crate::dataset;
use crate::error::{ApiError, ApiResult};
use crate::models::Scholarship;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    Remote,
    Fallback,
}

impl CatalogSource {
    pub fn label(self) -> &'static str {
        match self {
            CatalogSource::Remote => "live",
            CatalogSource::Fallback => "embedded",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    pub scholarships: Vec<Scholarship>,
    pub source: CatalogSource,
}

pub struct CatalogLoader<'a, A> {
    api: &'a A,
    loading: AtomicBool,
}

impl<'a, A: ScholarshipApi> CatalogLoader<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            loading: AtomicBool::new(false),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Fetch the catalog once, substituting the embedded dataset on any failure.
    pub async fn load(&self) -> Catalog {
        self.loading.store(true, Ordering::SeqCst);

        let catalog = match self.api.list_scholarships().await {
            Ok(scholarships) => {
                tracing::info!(count = scholarships.len(), "loaded scholarship catalog");
                Catalog {
                    scholarships,
                    source: CatalogSource::Remote,
                }
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "catalog endpoint unavailable, using embedded dataset"
                );
                Catalog {
                    scholarships: dataset::fallback_scholarships().to_vec(),
                    source: CatalogSource::Fallback,
                }
            }
        };

        self.loading.store(false, Ordering::SeqCst);
        catalog
    }

    /// Look up one scholarship for a detail view; the embedded dataset backs any failure.
    pub async fn find(&self, id: &str) -> ApiResult<Scholarship> {
        match self.api.get_scholarship(id).await {
            Ok(scholarship) => Ok(scholarship),
            Err(err) => {
                tracing::debug!(
                    id,
                    error = %err,
                    "detail lookup failed, checking embedded dataset"
                );
                dataset::find_fallback(id)
                    .cloned()
                    .ok_or_else(|| ApiError::NotFound(id.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::client::{ApiClientConfig, HttpBackend};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(ApiClientConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            max_retries: 0,
            retry_backoff_ms: 0,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn http_500_falls_back_to_embedded_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scholarships"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let api = backend(&server);
        let loader = CatalogLoader::new(&api);
        let catalog = loader.load().await;

        assert_eq!(catalog.source, CatalogSource::Fallback);
        assert_eq!(catalog.scholarships.len(), 25);
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn loading_flag_is_raised_while_the_request_is_in_flight() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scholarships"))
            .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_millis(300)))
            .expect(1)
            .mount(&server)
            .await;

        let api = backend(&server);
        let loader = CatalogLoader::new(&api);
        assert!(!loader.is_loading());

        let (catalog, mid_flight) = tokio::join!(loader.load(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            loader.is_loading()
        });

        assert!(mid_flight);
        assert!(!loader.is_loading());
        assert_eq!(catalog.source, CatalogSource::Fallback);
        assert_eq!(catalog.scholarships.len(), 25);
    }

    #[tokio::test]
    async fn remote_catalog_is_used_as_is() {
        let server = MockServer::start().await;
        let remote = vec![dataset::find_fallback("sch_002").unwrap().clone()];
        Mock::given(method("GET"))
            .and(path("/scholarships"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&remote))
            .mount(&server)
            .await;

        let api = backend(&server);
        let loader = CatalogLoader::new(&api);
        let catalog = loader.load().await;

        assert_eq!(catalog.source, CatalogSource::Remote);
        assert_eq!(catalog.scholarships, remote);
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn detail_lookup_uses_embedded_entry_when_backend_is_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scholarships/sch_003"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let api = backend(&server);
        let loader = CatalogLoader::new(&api);
        let found = loader.find("sch_003").await.unwrap();
        assert_eq!(found.name, "First Generation Access Award");
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scholarships/nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = backend(&server);
        let loader = CatalogLoader::new(&api);
        let err = loader.find("nope").await.unwrap_err();
        assert_eq!(err, ApiError::NotFound("nope".to_string()));
    }
}
