use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::error::{ApiError, Result};
use crate::models::{BusinessSummary, Hours, NewReview, SearchPage};
use crate::pipeline::BusinessSource;

const BASE_URL: &str = "https://api.yelp.com/v3";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    businesses: Vec<YelpBusiness>,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct YelpBusiness {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    location: Option<YelpLocation>,
}

#[derive(Debug, Deserialize)]
struct YelpLocation {
    #[serde(default)]
    display_address: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BusinessDetail {
    #[serde(default)]
    hours: Vec<HoursBlock>,
}

#[derive(Debug, Deserialize)]
struct HoursBlock {
    #[serde(default)]
    open: Vec<OpenSlot>,
}

#[derive(Debug, Deserialize)]
struct OpenSlot {
    day: usize,
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct ReviewsResponse {
    #[serde(default)]
    reviews: Vec<YelpReview>,
}

#[derive(Debug, Deserialize)]
struct YelpReview {
    #[serde(default)]
    text: String,
    rating: Option<f64>,
    time_created: Option<String>,
}

/// Client for the Yelp Fusion business endpoints.
///
/// Every call is a single attempt; retries belong to the caller.
pub struct YelpClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl YelpClient {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!(url, "yelp request");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, body));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
    }

    pub async fn search(&self, search: &SearchConfig, offset: u32) -> Result<SearchPage> {
        let url = search_url(&self.base_url, search, offset);

        match self.get_json::<SearchResponse>(&url).await {
            Ok(response) => {
                let page = SearchPage {
                    businesses: response
                        .businesses
                        .into_iter()
                        .filter(|b| !b.id.is_empty())
                        .map(|b| BusinessSummary {
                            id: b.id,
                            name: b.name,
                            address: b
                                .location
                                .map(|l| l.display_address.join(", "))
                                .unwrap_or_default(),
                        })
                        .collect(),
                    total: response.total,
                };
                tracing::debug!(
                    offset,
                    returned = page.businesses.len(),
                    total = page.total,
                    "yelp search page"
                );
                Ok(page)
            }
            // Yelp answers 400 once the offset runs past what it is willing to page through
            Err(ApiError::Status { status: 400, message }) => {
                tracing::debug!(offset, %message, "search offset rejected, treating as end of results");
                Ok(SearchPage::default())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn business_hours(&self, business_id: &str) -> Result<Hours> {
        let url = format!(
            "{}/businesses/{}",
            self.base_url,
            urlencoding::encode(business_id)
        );
        let detail = self.get_json::<BusinessDetail>(&url).await?;
        Ok(hours_from_detail(&detail))
    }

    pub async fn reviews(&self, business_id: &str, limit: u32) -> Result<Vec<NewReview>> {
        let url = format!(
            "{}/businesses/{}/reviews?limit={}&offset=0&sort_by=relevance",
            self.base_url,
            urlencoding::encode(business_id),
            limit
        );
        let response = self.get_json::<ReviewsResponse>(&url).await?;

        let reviews: Vec<NewReview> = response
            .reviews
            .into_iter()
            .filter(|r| !r.text.trim().is_empty())
            .map(|r| NewReview {
                text: r.text,
                rating: r.rating.filter(|v| (1.0..=5.0).contains(v)),
                date: r.time_created,
            })
            .collect();

        // Yelp truncates review text and there is no way around it
        if reviews.iter().any(|r| r.text.ends_with("...")) {
            tracing::debug!(business_id, "some reviews are truncated by the API");
        }

        Ok(reviews)
    }
}

#[async_trait]
impl BusinessSource for YelpClient {
    async fn search_page(&self, search: &SearchConfig, offset: u32) -> Result<SearchPage> {
        self.search(search, offset).await
    }

    async fn fetch_hours(&self, business_id: &str) -> Result<Hours> {
        self.business_hours(business_id).await
    }

    async fn fetch_reviews(&self, business_id: &str, limit: u32) -> Result<Vec<NewReview>> {
        self.reviews(business_id, limit).await
    }
}

fn search_url(base_url: &str, search: &SearchConfig, offset: u32) -> String {
    let mut url = format!(
        "{}/businesses/search?term={}&location={}&limit={}&offset={}",
        base_url,
        urlencoding::encode(&search.term),
        urlencoding::encode(&search.location),
        search.page_size,
        offset
    );
    if let Some(categories) = &search.categories {
        url.push_str("&categories=");
        url.push_str(&urlencoding::encode(categories));
    }
    url
}

/// Convert Yelp's `open` slots (day 0 = Monday, `HHMM` times) into an hours map.
/// Split shifts on the same day are joined with ", ".
fn hours_from_detail(detail: &BusinessDetail) -> Hours {
    let mut hours = Hours::closed();

    let Some(block) = detail.hours.first() else {
        return hours;
    };

    for slot in &block.open {
        let (Some(start), Some(end)) = (format_clock(&slot.start), format_clock(&slot.end)) else {
            continue;
        };
        let range = format!("{}-{}", start, end);
        if let Some(day) = hours.day_mut(slot.day) {
            *day = Some(match day.take() {
                Some(existing) => format!("{}, {}", existing, range),
                None => range,
            });
        }
    }

    hours
}

/// "1100" -> "11:00"
fn format_clock(raw: &str) -> Option<String> {
    if raw.len() != 4 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}:{}", &raw[..2], &raw[2..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub_server::StubServer;

    fn client(server: &StubServer) -> YelpClient {
        YelpClient::with_base_url("test-key".to_string(), &server.url).unwrap()
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock("1100").as_deref(), Some("11:00"));
        assert_eq!(format_clock("0030").as_deref(), Some("00:30"));
        assert_eq!(format_clock("930"), None);
        assert_eq!(format_clock("ab00"), None);
    }

    #[test]
    fn test_hours_from_detail() {
        let detail: BusinessDetail = serde_json::from_str(
            r#"{"hours":[{"open":[
                {"day":0,"start":"1100","end":"2200","is_overnight":false},
                {"day":4,"start":"1100","end":"1400"},
                {"day":4,"start":"1700","end":"0200"}
            ],"hours_type":"REGULAR","is_open_now":true}]}"#,
        )
        .unwrap();

        let hours = hours_from_detail(&detail);
        assert_eq!(hours.mon.as_deref(), Some("11:00-22:00"));
        assert_eq!(hours.fri.as_deref(), Some("11:00-14:00, 17:00-02:00"));
        assert!(hours.tue.is_none());
        assert!(hours.sun.is_none());
    }

    #[test]
    fn test_missing_hours_are_all_closed() {
        let detail: BusinessDetail = serde_json::from_str(r#"{"id":"abc","name":"X"}"#).unwrap();
        assert_eq!(hours_from_detail(&detail), Hours::closed());
    }

    #[test]
    fn test_search_url_encodes_params() {
        let search = SearchConfig::default();
        let url = search_url("https://api.yelp.com/v3", &search, 100);
        assert_eq!(
            url,
            "https://api.yelp.com/v3/businesses/search?term=taco&location=Austin%2C%20TX&limit=50&offset=100&categories=tacos"
        );
    }

    #[test]
    fn test_search_url_without_categories() {
        let search = SearchConfig {
            categories: None,
            page_size: 20,
            ..SearchConfig::default()
        };
        let url = search_url("http://localhost", &search, 0);
        assert!(url.ends_with("limit=20&offset=0"));
    }

    #[tokio::test]
    async fn test_search_page_from_server() {
        let server = StubServer::start(vec![(
            200,
            r#"{"businesses":[
                {"id":"tyson","name":"Tyson's Tacos","location":{"display_address":["4905 Airport Blvd","Austin, TX 78751"]}},
                {"id":"","name":"No id"}
            ],"total":1}"#,
        )])
        .await;

        let page = client(&server)
            .search(&SearchConfig::default(), 0)
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(
            page.businesses,
            vec![BusinessSummary {
                id: "tyson".to_string(),
                name: "Tyson's Tacos".to_string(),
                address: "4905 Airport Blvd, Austin, TX 78751".to_string(),
            }]
        );
        assert!(server.requests()[0].starts_with("GET /businesses/search?term=taco&"));
    }

    #[tokio::test]
    async fn test_search_bad_request_is_an_empty_page() {
        let server = StubServer::start(vec![(
            400,
            r#"{"error":{"code":"VALIDATION_ERROR","description":"Too many results requested"}}"#,
        )])
        .await;

        let page = client(&server)
            .search(&SearchConfig::default(), 1000)
            .await
            .unwrap();

        assert!(page.businesses.is_empty());
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_search_server_error_is_transient() {
        let server = StubServer::start(vec![(503, "unavailable")]).await;

        let err = client(&server)
            .search(&SearchConfig::default(), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Status { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_business_is_not_found() {
        let server = StubServer::start(vec![(
            404,
            r#"{"error":{"code":"BUSINESS_NOT_FOUND"}}"#,
        )])
        .await;

        let err = client(&server).business_hours("gone").await.unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(server.requests(), vec!["GET /businesses/gone HTTP/1.1"]);
    }

    #[tokio::test]
    async fn test_business_hours_from_server() {
        let server = StubServer::start(vec![(
            200,
            r#"{"id":"veracruz","hours":[{"open":[{"day":5,"start":"0800","end":"1500"}]}]}"#,
        )])
        .await;

        let hours = client(&server).business_hours("veracruz").await.unwrap();

        assert_eq!(hours.sat.as_deref(), Some("08:00-15:00"));
        assert!(hours.mon.is_none());
    }

    #[tokio::test]
    async fn test_malformed_detail_is_a_parse_error() {
        let server = StubServer::start(vec![(200, "<html>oops</html>")]).await;

        let err = client(&server).business_hours("x").await.unwrap_err();

        assert!(matches!(err, ApiError::Parse(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_reviews_drop_blank_text_and_bad_ratings() {
        let server = StubServer::start(vec![(
            200,
            r#"{"reviews":[
                {"text":"Get the migas taco...","rating":5,"time_created":"2024-04-01 09:12:00"},
                {"text":"   ","rating":4},
                {"text":"Fine","rating":9}
            ],"total":3}"#,
        )])
        .await;

        let reviews = client(&server).reviews("veracruz", 3).await.unwrap();

        assert_eq!(
            reviews,
            vec![
                NewReview::new(
                    "Get the migas taco...",
                    Some(5.0),
                    Some("2024-04-01 09:12:00".to_string())
                ),
                NewReview::new("Fine", None, None),
            ]
        );
        assert!(server.requests()[0]
            .starts_with("GET /businesses/veracruz/reviews?limit=3&offset=0&sort_by=relevance"));
    }
}
