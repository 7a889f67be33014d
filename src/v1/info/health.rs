#![forbid(unsafe_code)]

use poem::Request;
use poem_openapi::{ OpenApi, payload::Json, Object };
use poem::Error;

use crate::utils::info_utils;

// Liveness probes key off this value.
pub const STATUS_HEALTHY : &str = "healthy";

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct HealthApi;

#[derive(Object)]
struct RespHealth
{
    status: String,
    timestamp: String,
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl HealthApi {
    #[oai(path = "/health", method = "get")]
    async fn get_health(&self, http_req: &Request) -> Json<RespHealth> {
        // Conditional logging depending on log level.
        info_utils::debug_request(http_req);

        let resp = match RespHealth::process() {
            Ok(r) => r,
            Err(e) => {
                let msg = "ERROR: ".to_owned() + e.to_string().as_str();
                RespHealth::new(msg.as_str(), "")},
        };

        Json(resp)
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespHealth {
    fn new(status: &str, timestamp: &str) -> Self {
        Self {status: status.to_string(),
              timestamp: timestamp.to_string(),
        }
    }

    fn process() -> Result<RespHealth, Error> {
        // The timestamp is captured at request time.
        Ok(Self::new(STATUS_HEALTHY, info_utils::timestamp_str().as_str()))
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use poem::test::TestClient;
    use poem_openapi::OpenApiService;
    use crate::utils::info_utils::timestamp_str_to_datetime;

    #[tokio::test]
    async fn health_reports_healthy_with_fresh_timestamp() {
        let service = OpenApiService::new(HealthApi, "test", "0.1");
        let cli = TestClient::new(service);

        let resp = cli.get("/health").send().await;
        resp.assert_status_is_ok();

        let json = resp.json().await;
        let body = json.value().object();
        body.get("status").assert_string(STATUS_HEALTHY);

        // The timestamp must be valid rfc3339 and no older than a few seconds.
        let ts = timestamp_str_to_datetime(body.get("timestamp").string())
            .expect("timestamp is not rfc3339");
        let age = Utc::now().signed_duration_since(ts.with_timezone(&Utc));
        assert!(age.num_seconds() >= 0);
        assert!(age.num_seconds() < 5);
    }
}
