// src/fetch/mod.rs

use crate::error::{PipelineError, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

pub const BASE_URL: &str = "https://data.bts.gov";
pub const DATASET_ID: &str = "keg4-3bc2";

/// One border-crossing row exactly as the service reports it. Every field
/// is optional on the wire; Socrata omits keys it has no value for.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    pub date: Option<String>,
    pub port_code: Option<String>,
    pub port_name: Option<String>,
    pub state: Option<String>,
    pub border: Option<String>,
    pub measure: Option<String>,
    pub value: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub point: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: String,
}

/// Filter pushed down to the service as a SoQL where-clause.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub border: String,
    pub since: String,
}

impl Default for Predicate {
    fn default() -> Self {
        Self {
            border: "US-Canada Border".to_string(),
            since: "2017-01-01".to_string(),
        }
    }
}

impl Predicate {
    pub fn to_where_clause(&self) -> String {
        format!("border = '{}' AND date >= '{}'", self.border, self.since)
    }
}

/// Thin Socrata (SODA) consumer for the border-crossing dataset.
pub struct SodaClient {
    http: Client,
    resource: Url,
    token: Option<String>,
}

impl SodaClient {
    pub fn new(http: Client, token: Option<String>) -> Result<Self> {
        Self::with_base_url(http, BASE_URL, token)
    }

    pub fn with_base_url(http: Client, base: &str, token: Option<String>) -> Result<Self> {
        let resource = Url::parse(base)?.join(&format!("resource/{DATASET_ID}.json"))?;
        Ok(Self {
            http,
            resource,
            token,
        })
    }

    /// Display-only access tier; ingestion never branches on this.
    pub fn auth_status(&self) -> &'static str {
        if self.token.is_some() {
            "authenticated"
        } else {
            "anonymous (no app token)"
        }
    }

    fn get(&self, params: &[(&str, &str)]) -> reqwest::RequestBuilder {
        let mut req = self.http.get(self.resource.clone()).query(params);
        if let Some(token) = &self.token {
            req = req.header("X-App-Token", token);
        }
        req
    }

    /// Exact number of rows matching `where_clause`.
    pub async fn count(&self, where_clause: &str) -> Result<u64> {
        let rows: Vec<CountRow> = self
            .get(&[("$select", "count(*)"), ("$where", where_clause)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| PipelineError::BadCount("empty count response".to_string()))?;
        row.count
            .parse()
            .map_err(|_| PipelineError::BadCount(row.count.clone()))
    }

    /// Rows matching `where_clause`, up to `limit`.
    pub async fn query(&self, where_clause: &str, limit: u64) -> Result<Vec<RawRecord>> {
        let rows = self
            .get(&[("$where", where_clause), ("$limit", &limit.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rows)
    }

    /// Count first, then pull exactly that many rows, so the full matching
    /// set comes back in one page without under- or over-fetching.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, predicate: &Predicate) -> Result<Vec<RawRecord>> {
        let where_clause = predicate.to_where_clause();
        let n = self.count(&where_clause).await?;
        debug!(rows = n, "count query answered");
        if n == 0 {
            info!("no rows match the predicate");
            return Ok(Vec::new());
        }
        let records = self.query(&where_clause, n).await?;
        info!(fetched = records.len(), expected = n, "retrieved matching set");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers one connection per canned body with `Connection: close`, so
    /// the client opens a fresh connection per request. Returns the request
    /// line of each request seen, in order.
    async fn serve_responses(listener: TcpListener, bodies: Vec<&'static str>) -> Vec<String> {
        let mut request_lines = Vec::new();
        for body in bodies {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = sock.read(&mut buf).await.unwrap();
            let head = String::from_utf8_lossy(&buf[..n]).to_string();
            request_lines.push(head.lines().next().unwrap_or_default().to_string());
            let resp = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
        }
        request_lines
    }

    #[test]
    fn default_predicate_renders_fixed_where_clause() {
        let p = Predicate::default();
        assert_eq!(
            p.to_where_clause(),
            "border = 'US-Canada Border' AND date >= '2017-01-01'"
        );
    }

    #[test]
    fn raw_record_tolerates_missing_geographic_fields() {
        let json = r#"{
            "date": "2019-03-05T00:00:00.000",
            "port_code": "0101",
            "port_name": "Calais",
            "state": "ME",
            "border": "US-Canada Border",
            "measure": "Pedestrians",
            "value": "100"
        }"#;
        let rec: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.port_code.as_deref(), Some("0101"));
        assert!(rec.latitude.is_none());
        assert!(rec.point.is_none());
    }

    #[test]
    fn raw_record_accepts_geographic_fields_and_nulls() {
        let json = r#"{
            "date": "2024-01-01T00:00:00.000",
            "port_code": "3315",
            "port_name": "Chief Mountain Mt Poe",
            "border": "US-Canada Border",
            "measure": "Pedestrians",
            "value": "7",
            "latitude": "48.9975",
            "longitude": "-113.6458",
            "point": {"type": "Point", "coordinates": [-113.6458, 48.9975]}
        }"#;
        let rec: RawRecord = serde_json::from_str(json).unwrap();
        assert!(rec.state.is_none());
        assert!(rec.point.is_some());
    }

    #[test]
    fn count_row_parses_socrata_shape() {
        let rows: Vec<CountRow> = serde_json::from_str(r#"[{"count": "9243"}]"#).unwrap();
        assert_eq!(rows[0].count.parse::<u64>().unwrap(), 9243);
    }

    #[test]
    fn auth_status_reflects_token_presence() {
        let with = SodaClient::new(Client::new(), Some("abc".to_string())).unwrap();
        let without = SodaClient::new(Client::new(), None).unwrap();
        assert_eq!(with.auth_status(), "authenticated");
        assert_eq!(without.auth_status(), "anonymous (no app token)");
    }

    #[tokio::test]
    async fn fetch_pulls_exactly_the_counted_rows() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_responses(
            listener,
            vec![
                r#"[{"count": "2"}]"#,
                r#"[
                    {"date": "2019-03-05T00:00:00.000", "port_code": "0101",
                     "border": "US-Canada Border", "measure": "Pedestrians", "value": "100"},
                    {"date": "2019-03-12T00:00:00.000", "port_code": "0101",
                     "border": "US-Canada Border", "measure": "Pedestrians", "value": "50"}
                ]"#,
            ],
        ));

        let client =
            SodaClient::with_base_url(Client::new(), &format!("http://{addr}/"), None).unwrap();
        let records = client.fetch(&Predicate::default()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].measure.as_deref(), Some("Pedestrians"));
        assert_eq!(records[1].value.as_deref(), Some("50"));

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].contains("%24select=count"), "{}", requests[0]);
        // the retrieval limit is exactly the counted row total
        assert!(requests[1].contains("%24limit=2"), "{}", requests[1]);
    }

    #[tokio::test]
    async fn fetch_of_empty_matching_set_is_ok() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // only a count response is canned: a zero count must skip the query
        let server = tokio::spawn(serve_responses(listener, vec![r#"[{"count": "0"}]"#]));

        let client =
            SodaClient::with_base_url(Client::new(), &format!("http://{addr}/"), None).unwrap();
        let records = client.fetch(&Predicate::default()).await.unwrap();
        assert!(records.is_empty());

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn fetch_propagates_network_failure() {
        // nothing listens on this port, so the connection is refused locally
        let client =
            SodaClient::with_base_url(Client::new(), "http://127.0.0.1:1/", None).unwrap();
        let err = client.fetch(&Predicate::default()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Network(_)));
    }
}
