#![forbid(unsafe_code)]

use poem::Request;
use poem_openapi::{ OpenApi, payload::Json, Object };
use poem::Error;

use crate::utils::info_utils;

// Fixed response content.
pub const WELCOME_MESSAGE : &str = "Welcome to the info_server example!";
pub const WELCOME_DOCS    : &str = "Interactive API documentation is served at /docs";
pub const WELCOME_TIP     : &str = "Try GET /health for liveness and GET /env for runtime details";

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct WelcomeApi;

#[derive(Object)]
struct RespWelcome
{
    message: String,
    docs: String,
    tip: String,
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl WelcomeApi {
    #[oai(path = "/", method = "get")]
    async fn get_welcome(&self, http_req: &Request) -> Json<RespWelcome> {
        // Conditional logging depending on log level.
        info_utils::debug_request(http_req);

        let resp = match RespWelcome::process() {
            Ok(r) => r,
            Err(e) => {
                let msg = "ERROR: ".to_owned() + e.to_string().as_str();
                RespWelcome::new(msg.as_str(), "", "")},
        };

        Json(resp)
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespWelcome {
    fn new(message: &str, docs: &str, tip: &str) -> Self {
        Self {message: message.to_string(),
              docs: docs.to_string(),
              tip: tip.to_string(),
        }
    }

    fn process() -> Result<RespWelcome, Error> {
        Ok(Self::new(WELCOME_MESSAGE, WELCOME_DOCS, WELCOME_TIP))
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use poem::test::TestClient;
    use poem_openapi::OpenApiService;

    #[tokio::test]
    async fn welcome_body_is_fixed() {
        let service = OpenApiService::new(WelcomeApi, "test", "0.1");
        let cli = TestClient::new(service);

        let resp = cli.get("/").send().await;
        resp.assert_status_is_ok();
        resp.assert_json(serde_json::json!({
            "message": WELCOME_MESSAGE,
            "docs": WELCOME_DOCS,
            "tip": WELCOME_TIP,
        })).await;
    }
}
