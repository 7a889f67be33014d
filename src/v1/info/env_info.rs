#![forbid(unsafe_code)]

use poem::Request;
use poem_openapi::{ OpenApi, payload::Json, Object };
use poem::Error;

use crate::utils::info_utils;

// Captured by build.rs.
const RUSTC_VERSION: &str = env!("RUSTC_VERSION");

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
// The configured values are frozen into the endpoint at start up.
pub struct EnvInfoApi {
    run_env: String,
    http_port: u16,
}

#[derive(Object)]
struct RespEnvInfo
{
    runtime_version: String,
    environment: String,
    port: u16,
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl EnvInfoApi {
    #[oai(path = "/env", method = "get")]
    async fn get_env_info(&self, http_req: &Request) -> Json<RespEnvInfo> {
        // Conditional logging depending on log level.
        info_utils::debug_request(http_req);

        let resp = match RespEnvInfo::process(&self.run_env, self.http_port) {
            Ok(r) => r,
            Err(e) => {
                let msg = "ERROR: ".to_owned() + e.to_string().as_str();
                RespEnvInfo::new(msg.as_str(), "", 0)},
        };

        Json(resp)
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl EnvInfoApi {
    pub fn new(run_env: &str, http_port: u16) -> Self {
        Self {run_env: run_env.to_string(), http_port}
    }
}

impl RespEnvInfo {
    fn new(runtime_version: &str, environment: &str, port: u16) -> Self {
        Self {runtime_version: runtime_version.to_string(),
              environment: environment.to_string(),
              port,
        }
    }

    fn process(run_env: &str, port: u16) -> Result<RespEnvInfo, Error> {
        Ok(Self::new(RUSTC_VERSION, run_env, port))
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
    async fn env_echoes_configured_values() {
        let service = OpenApiService::new(EnvInfoApi::new("development", 3000), "test", "0.1");
        let cli = TestClient::new(service);

        let resp = cli.get("/env").send().await;
        resp.assert_status_is_ok();

        let json = resp.json().await;
        let body = json.value().object();
        body.get("environment").assert_string("development");
        body.get("port").assert_i64(3000);
        assert!(!body.get("runtime_version").string().is_empty());
    }

    #[tokio::test]
    async fn env_reflects_overridden_values() {
        let service = OpenApiService::new(EnvInfoApi::new("production", 8080), "test", "0.1");
        let cli = TestClient::new(service);

        let resp = cli.get("/env").send().await;
        resp.assert_status_is_ok();

        let json = resp.json().await;
        let body = json.value().object();
        body.get("environment").assert_string("production");
        body.get("port").assert_i64(8080);
    }
}
