//! Best-effort latency probe against a candidate endpoint.
//!
//! Informational only: the measured time never feeds back into the
//! throughput or budget logic.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Serialize;

/// Outcome of one latency measurement.
#[derive(Debug, Clone, Serialize)]
pub struct LatencyMeasurement {
    pub target: String,
    /// Elapsed wall-clock time to the response, in milliseconds.
    pub elapsed_ms: f64,
    /// True when the endpoint answered with a 2xx status.
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Probes request latency with a single short-timeout GET.
pub struct LatencyProbe {
    client: Client,
}

impl Default for LatencyProbe {
    fn default() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

impl LatencyProbe {
    /// Measure elapsed time to a response from `target`.
    ///
    /// Transport errors are folded into `success = false`; the elapsed time
    /// then covers the failed attempt.
    pub async fn measure(&self, target: &Url) -> LatencyMeasurement {
        let start = Instant::now();
        let result = self.client.get(target.clone()).send().await;
        let elapsed = start.elapsed();

        let success = matches!(&result, Ok(resp) if resp.status().is_success());

        LatencyMeasurement {
            target: target.to_string(),
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            success,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_probe_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let m = LatencyProbe::default().measure(&url).await;
        assert!(m.success);
        assert!(m.elapsed_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_probe_server_error_is_not_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let m = LatencyProbe::default().measure(&url).await;
        assert!(!m.success);
    }

    #[tokio::test]
    async fn test_probe_unreachable_is_not_success() {
        // Reserved TEST-NET-1 address; nothing listens there.
        let url = Url::parse("http://192.0.2.1:9/").unwrap();
        let m = LatencyProbe::default().measure(&url).await;
        assert!(!m.success);
    }
}
