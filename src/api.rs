use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::models::{CityRow, ListResponse, LocationOption, ProvinceRow, Vacancy};

pub const DEFAULT_BASE_URL: &str = "https://maganghub.kemnaker.go.id/be/v1/api/list";

const PROVINCE_LIMIT: u32 = 40;
const CITY_LIMIT: u32 = 150;
const VACANCY_PAGE_LIMIT: u32 = 50;
/// Upstream pagination metadata is not trusted to converge.
const MAX_VACANCY_PAGES: u32 = 2000;

/// Client for the MagangHub listing API. Cheap to clone; fetch tasks get
/// their own copy.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new() -> Result<Self> {
        let base = std::env::var("MAGANG_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(base)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("magang/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    /// One request for the full province directory, sorted by name.
    pub async fn list_provinces(&self) -> Result<Vec<LocationOption>> {
        let url = format!("{}/provinces", self.base_url);
        let limit = PROVINCE_LIMIT.to_string();
        let resp: ListResponse<ProvinceRow> = self
            .client
            .get(&url)
            .query(&[
                ("order_by", "nama_propinsi"),
                ("order_direction", "ASC"),
                ("page", "1"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .context("Failed to fetch provinces")?
            .error_for_status()
            .context("Province request rejected")?
            .json()
            .await
            .context("Failed to parse province response")?;

        debug!(count = resp.data.len(), "loaded provinces");
        Ok(resp
            .data
            .into_iter()
            .map(|p| LocationOption {
                value: p.kode_propinsi,
                label: p.nama_propinsi,
            })
            .collect())
    }

    /// Cities of one province, sorted by name. The limit covers typical
    /// city counts per province in one request.
    pub async fn list_cities(&self, province_code: &str) -> Result<Vec<LocationOption>> {
        let url = format!("{}/cities", self.base_url);
        let limit = CITY_LIMIT.to_string();
        let resp: ListResponse<CityRow> = self
            .client
            .get(&url)
            .query(&[
                ("kode_propinsi", province_code),
                ("order_by", "nama_kabupaten"),
                ("order_direction", "ASC"),
                ("page", "1"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .context("Failed to fetch cities")?
            .error_for_status()
            .context("City request rejected")?
            .json()
            .await
            .context("Failed to parse city response")?;

        debug!(province = province_code, count = resp.data.len(), "loaded cities");
        Ok(resp
            .data
            .into_iter()
            .map(|c| LocationOption {
                value: c.nama_kabupaten.clone(),
                label: c.nama_kabupaten,
            })
            .collect())
    }

    /// Walks every server page for the given batch (and province, when
    /// selected) and accumulates the records. Search, city, and major are
    /// applied locally afterwards, so this only re-runs on province change.
    pub async fn fetch_all_vacancies(
        &self,
        batch: u32,
        province_code: Option<&str>,
    ) -> Result<Vec<Vacancy>> {
        let url = format!("{}/vacancies", self.base_url);
        let batch = batch.to_string();
        let limit = VACANCY_PAGE_LIMIT.to_string();
        let mut all = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_param = page.to_string();
            let mut req = self.client.get(&url).query(&[
                ("angkatan", batch.as_str()),
                ("page", page_param.as_str()),
                ("limit", limit.as_str()),
            ]);
            // The vacancy endpoint spells the province key differently from
            // the city endpoint.
            if let Some(code) = province_code {
                req = req.query(&[("kode_provinsi", code)]);
            }

            let resp: ListResponse<Vacancy> = req
                .send()
                .await
                .with_context(|| format!("Failed to fetch vacancy page {page}"))?
                .error_for_status()
                .with_context(|| format!("Vacancy page {page} rejected"))?
                .json()
                .await
                .with_context(|| format!("Failed to parse vacancy page {page}"))?;

            let got = resp.data.len();
            let last_page = resp.last_page();
            all.extend(resp.data);
            debug!(page, got, ?last_page, total = all.len(), "fetched vacancy page");

            if fetch_done(got, page, last_page) {
                break;
            }
            page += 1;
        }

        Ok(all)
    }
}

/// Whether the page walk stops after this page: an empty page, the reported
/// last page, or the hard ceiling all end it. Missing pagination metadata
/// reads as "no more pages".
fn fetch_done(got: usize, page: u32, last_page: Option<u32>) -> bool {
    got == 0 || page >= last_page.unwrap_or(page) || page >= MAX_VACANCY_PAGES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = ApiClient::with_base_url("http://localhost:9999/api/").unwrap();
        assert_eq!(client.base_url, "http://localhost:9999/api");
    }

    #[test]
    fn page_walk_stops_on_empty_page() {
        assert!(fetch_done(0, 1, Some(10)));
    }

    #[test]
    fn page_walk_stops_at_reported_last_page() {
        assert!(!fetch_done(50, 3, Some(10)));
        assert!(fetch_done(50, 10, Some(10)));
        // Upstream shrinking last_page mid-walk still ends it.
        assert!(fetch_done(50, 11, Some(10)));
    }

    #[test]
    fn page_walk_stops_when_metadata_is_missing() {
        assert!(fetch_done(50, 1, None));
    }

    #[test]
    fn page_walk_stops_at_the_page_ceiling() {
        assert!(!fetch_done(50, MAX_VACANCY_PAGES - 1, Some(u32::MAX)));
        assert!(fetch_done(50, MAX_VACANCY_PAGES, Some(u32::MAX)));
    }
}
