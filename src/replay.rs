// 🔁 Transaction Replay Client
//
// Reads wallet ids from the store, synthesizes payment requests between
// random distinct pairs and posts each one to the payment service.
//
// Every request is independent: a network error, timeout or non-2xx status
// is logged and recorded, and the batch carries on.

use crate::config::ReplayConfig;
use crate::db;
use crate::entities::Currency;
use crate::error::{SeedError, SeedResult};
use crate::sampler::Sampler;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Characters of the response body kept per outcome
pub const BODY_EXCERPT_LEN: usize = 200;

// ============================================================================
// WIRE TYPES
// ============================================================================

/// Request envelope accepted by the payment service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub sender_id: String,
    pub receiver_id: String,
    pub currency: Currency,

    /// Major units, two decimals
    pub amount: f64,

    pub tx_date: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointResponse {
    pub status: u16,
    pub body: String,

    /// Set when the status arrived but the body could not be read
    pub body_error: Option<String>,
}

impl EndpointResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ============================================================================
// ENDPOINT
// ============================================================================

#[async_trait]
pub trait PaymentEndpoint: Send + Sync {
    /// Submit one request. Err means the service was not reached.
    async fn submit(&self, request: &PaymentRequest) -> SeedResult<EndpointResponse>;
}

/// JSON-over-HTTP payment service
pub struct HttpEndpoint {
    url: String,
    client: reqwest::Client,
}

impl HttpEndpoint {
    pub fn new(url: &str, timeout: Duration) -> SeedResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SeedError::Connection(format!("cannot build http client: {}", e)))?;

        Ok(HttpEndpoint {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl PaymentEndpoint for HttpEndpoint {
    async fn submit(&self, request: &PaymentRequest) -> SeedResult<EndpointResponse> {
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SeedError::Connection(format!("timed out: {}", self.url))
                } else {
                    SeedError::Connection(e.to_string())
                }
            })?;

        let status = resp.status().as_u16();
        let (body, body_error) = match resp.text().await {
            Ok(body) => (body, None),
            Err(e) if e.is_timeout() => (String::new(), Some(format!("timed out reading body: {}", self.url))),
            Err(e) => (String::new(), Some(format!("cannot read body: {}", e))),
        };
        Ok(EndpointResponse {
            status,
            body,
            body_error,
        })
    }
}

// ============================================================================
// BATCH
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub index: usize,
    pub idempotency_key: String,

    /// None when the service was not reached
    pub status: Option<u16>,

    pub error: Option<String>,
    pub body_excerpt: String,
}

impl ReplayOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && matches!(self.status, Some(s) if (200..300).contains(&s))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// One per request, in index order
    pub outcomes: Vec<ReplayOutcome>,
}

/// Wallet ids the replay will draw from
pub fn load_replay_accounts(conn: &Connection, config: &ReplayConfig) -> SeedResult<Vec<String>> {
    let ids = db::wallet_ids(conn, config.account_limit)?;
    if ids.len() < 2 {
        return Err(SeedError::config(format!(
            "replay needs at least 2 wallets in the store, found {}",
            ids.len()
        )));
    }
    Ok(ids)
}

/// Build `config.count` requests in index order
///
/// `clock` is read once per request; its value feeds both tx_date and the
/// idempotency key, so keys follow sequence order whatever the dispatch
/// order turns out to be.
pub fn build_requests<F>(
    account_ids: &[String],
    config: &ReplayConfig,
    sampler: &mut Sampler,
    mut clock: F,
) -> SeedResult<Vec<PaymentRequest>>
where
    F: FnMut() -> DateTime<Utc>,
{
    let mut requests = Vec::with_capacity(config.count);

    for i in 0..config.count {
        let (a, b) = sampler.choose_pair(account_ids.len()).ok_or_else(|| {
            SeedError::config("replay needs at least 2 distinct wallet ids")
        })?;
        let currency = *sampler
            .choose(&config.currencies)
            .ok_or_else(|| SeedError::config("replay currency set must not be empty"))?;
        let amount = (sampler.float_range(config.min_amount, config.max_amount) * 100.0).round() / 100.0;
        let now = clock();

        requests.push(PaymentRequest {
            sender_id: account_ids[a].clone(),
            receiver_id: account_ids[b].clone(),
            currency,
            amount,
            tx_date: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            idempotency_key: format!("bulk-{}-{}", now.timestamp_millis(), i),
        });
    }

    Ok(requests)
}

/// Submit every request with at most `concurrency` in flight
pub async fn replay<E>(endpoint: &E, requests: Vec<PaymentRequest>, concurrency: usize) -> ReplaySummary
where
    E: PaymentEndpoint + ?Sized,
{
    let outcomes: Vec<ReplayOutcome> = stream::iter(requests.into_iter().enumerate())
        .map(move |(index, request)| async move {
            let result = endpoint.submit(&request).await;
            to_outcome(index, request, result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
    let summary = ReplaySummary {
        submitted: outcomes.len(),
        succeeded,
        failed: outcomes.len() - succeeded,
        outcomes,
    };

    info!(
        submitted = summary.submitted,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "replay finished"
    );
    summary
}

fn to_outcome(index: usize, request: PaymentRequest, result: SeedResult<EndpointResponse>) -> ReplayOutcome {
    match result {
        Ok(resp) => {
            let body_excerpt: String = resp.body.chars().take(BODY_EXCERPT_LEN).collect();
            if let Some(err) = &resp.body_error {
                warn!(index, status = resp.status, key = %request.idempotency_key, error = %err, "payment response incomplete");
            } else if resp.is_success() {
                debug!(index, status = resp.status, key = %request.idempotency_key, "payment accepted");
            } else {
                warn!(index, status = resp.status, key = %request.idempotency_key, body = %body_excerpt, "payment rejected");
            }
            ReplayOutcome {
                index,
                idempotency_key: request.idempotency_key,
                status: Some(resp.status),
                error: resp.body_error,
                body_excerpt,
            }
        }
        Err(e) => {
            warn!(index, key = %request.idempotency_key, error = %e, "payment not delivered");
            ReplayOutcome {
                index,
                idempotency_key: request.idempotency_key,
                status: None,
                error: Some(e.to_string()),
                body_excerpt: String::new(),
            }
        }
    }
}

/// Build requests from `account_ids` and post them to the configured endpoint
pub async fn run_replay(account_ids: &[String], config: &ReplayConfig) -> SeedResult<ReplaySummary> {
    config.validate()?;

    let mut sampler = Sampler::new(config.seed);
    let requests = build_requests(account_ids, config, &mut sampler, Utc::now)?;
    let endpoint = HttpEndpoint::new(&config.endpoint, Duration::from_secs(config.timeout_secs))?;

    info!(
        endpoint = %config.endpoint,
        requests = requests.len(),
        concurrency = config.concurrency,
        "replay starting"
    );
    Ok(replay(&endpoint, requests, config.concurrency).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("ACC_{:06}", i)).collect()
    }

    fn fixed_clock() -> impl FnMut() -> DateTime<Utc> {
        let start = Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap();
        let mut tick = 0;
        move || {
            tick += 1;
            start + chrono::Duration::milliseconds(tick)
        }
    }

    /// Fails every third request at the transport, rejects every fifth
    struct FlakyEndpoint {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PaymentEndpoint for FlakyEndpoint {
        async fn submit(&self, request: &PaymentRequest) -> SeedResult<EndpointResponse> {
            self.seen.lock().unwrap().push(request.idempotency_key.clone());
            let index: usize = request.idempotency_key.rsplit('-').next().unwrap().parse().unwrap();

            if index % 3 == 2 {
                return Err(SeedError::Connection("connection reset".to_string()));
            }
            if index % 5 == 4 {
                return Ok(EndpointResponse {
                    status: 422,
                    body: "x".repeat(500),
                    ..Default::default()
                });
            }
            Ok(EndpointResponse {
                status: 201,
                body: "{\"status\":\"ok\"}".to_string(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_requests_are_well_formed() {
        let cfg = ReplayConfig {
            count: 50,
            ..Default::default()
        };
        let mut sampler = Sampler::new(42);
        let reqs = build_requests(&ids(10), &cfg, &mut sampler, fixed_clock()).unwrap();

        assert_eq!(reqs.len(), 50);
        for (i, r) in reqs.iter().enumerate() {
            assert_ne!(r.sender_id, r.receiver_id);
            assert!(r.amount >= 1.0 && r.amount <= 5_000_000.0);
            assert_eq!((r.amount * 100.0).round() / 100.0, r.amount);
            assert!(r.idempotency_key.starts_with("bulk-"));
            assert!(r.idempotency_key.ends_with(&format!("-{}", i)));
            assert!(r.tx_date.ends_with('Z'));
        }

        let keys: HashSet<_> = reqs.iter().map(|r| r.idempotency_key.clone()).collect();
        assert_eq!(keys.len(), 50);
    }

    #[test]
    fn test_request_envelope_fields() {
        let cfg = ReplayConfig {
            count: 1,
            ..Default::default()
        };
        let mut sampler = Sampler::new(1);
        let req = build_requests(&ids(2), &cfg, &mut sampler, fixed_clock()).unwrap().remove(0);

        let value = serde_json::to_value(&req).unwrap();
        let mut fields: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        fields.sort();
        assert_eq!(
            fields,
            vec!["amount", "currency", "idempotency_key", "receiver_id", "sender_id", "tx_date"]
        );
        assert_eq!(req.tx_date, "2026-10-18T10:00:00Z");
        assert_eq!(req.idempotency_key, format!("bulk-{}-0", Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap().timestamp_millis() + 1));
    }

    #[test]
    fn test_same_seed_same_batch() {
        let cfg = ReplayConfig::default();
        let a = build_requests(&ids(20), &cfg, &mut Sampler::new(9), fixed_clock()).unwrap();
        let b = build_requests(&ids(20), &cfg, &mut Sampler::new(9), fixed_clock()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_too_few_accounts() {
        let cfg = ReplayConfig::default();
        let err = build_requests(&ids(1), &cfg, &mut Sampler::new(1), fixed_clock()).unwrap_err();
        assert!(matches!(err, SeedError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_batch() {
        let cfg = ReplayConfig {
            count: 30,
            ..Default::default()
        };
        let reqs = build_requests(&ids(10), &cfg, &mut Sampler::new(42), fixed_clock()).unwrap();
        let endpoint = FlakyEndpoint {
            seen: Mutex::new(Vec::new()),
        };

        let summary = replay(&endpoint, reqs, 4).await;

        assert_eq!(summary.submitted, 30);
        assert_eq!(endpoint.seen.lock().unwrap().len(), 30);

        let transport_failures = (0..30).filter(|i| i % 3 == 2).count();
        let rejected = (0..30).filter(|i| i % 3 != 2 && i % 5 == 4).count();
        assert_eq!(summary.failed, transport_failures + rejected);
        assert_eq!(summary.succeeded, 30 - transport_failures - rejected);

        for (i, outcome) in summary.outcomes.iter().enumerate() {
            assert_eq!(outcome.index, i);
            assert!(outcome.idempotency_key.ends_with(&format!("-{}", i)));
            assert!(outcome.body_excerpt.chars().count() <= BODY_EXCERPT_LEN);
            if i % 3 == 2 {
                assert_eq!(outcome.status, None);
                assert!(outcome.error.is_some());
            }
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_is_per_item_failure() {
        let endpoint = HttpEndpoint::new("http://127.0.0.1:9/api/payments", Duration::from_secs(1)).unwrap();
        let cfg = ReplayConfig {
            count: 3,
            ..Default::default()
        };
        let reqs = build_requests(&ids(4), &cfg, &mut Sampler::new(42), fixed_clock()).unwrap();

        let summary = replay(&endpoint, reqs, 2).await;
        assert_eq!(summary.submitted, 3);
        assert_eq!(summary.failed, 3);
        assert!(summary.outcomes.iter().all(|o| o.status.is_none()));
    }

    /// Local server that accepts connections, optionally writes `reply`,
    /// then holds every socket open without finishing the response
    async fn stalled_server(reply: Option<&'static str>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                if let Some(reply) = reply {
                    let _ = socket.write_all(reply.as_bytes()).await;
                }
                held.push(socket);
            }
        });
        format!("http://{}/api/payments", addr)
    }

    #[tokio::test]
    async fn test_silent_service_times_out_per_item() {
        let url = stalled_server(None).await;
        let endpoint = HttpEndpoint::new(&url, Duration::from_secs(1)).unwrap();
        let cfg = ReplayConfig {
            count: 2,
            ..Default::default()
        };
        let reqs = build_requests(&ids(4), &cfg, &mut Sampler::new(42), fixed_clock()).unwrap();

        let started = std::time::Instant::now();
        let summary = replay(&endpoint, reqs, 2).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(summary.submitted, 2);
        assert_eq!(summary.failed, 2);
        for outcome in &summary.outcomes {
            assert_eq!(outcome.status, None);
            assert!(outcome.error.as_deref().unwrap().contains("timed out"));
        }
    }

    #[tokio::test]
    async fn test_truncated_body_is_recorded_as_error() {
        let url = stalled_server(Some("HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial")).await;
        let endpoint = HttpEndpoint::new(&url, Duration::from_secs(1)).unwrap();
        let cfg = ReplayConfig {
            count: 1,
            ..Default::default()
        };
        let reqs = build_requests(&ids(2), &cfg, &mut Sampler::new(7), fixed_clock()).unwrap();

        let summary = replay(&endpoint, reqs, 1).await;

        let outcome = &summary.outcomes[0];
        assert_eq!(outcome.status, Some(200));
        assert!(outcome.error.is_some());
        assert!(!outcome.succeeded());
        assert_eq!(summary.failed, 1);
    }
}
