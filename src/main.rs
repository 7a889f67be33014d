#![forbid(unsafe_code)]

use anyhow::Result;
use lazy_static::lazy_static;
use log::info;
use poem::{listener::TcpListener, Route};
use poem_openapi::OpenApiService;

// Server utilities.
use crate::v1::info::env_info::EnvInfoApi;
use crate::v1::info::health::HealthApi;
use crate::v1::info::welcome::WelcomeApi;
use crate::utils::config::{init_log, init_runtime_context, RuntimeCtx, INFO_ARGS, INFO_DIRS};
use crate::utils::errors::Errors;

// Modules
mod utils;
mod v1;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "InfoServer"; // for poem logging

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Lazily initialize the parameters variable so that is has a 'static lifetime.
// We exit if we can't read our parameters.
lazy_static! {
    static ref RUNTIME_CTX: RuntimeCtx = init_runtime_context();
}

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    // --------------- Initialize Server --------------
    // Announce ourselves.
    println!("Starting info_server!");

    // Initialize the server.
    server_init();

    // --------------- Main Loop Set Up ---------------
    // Assign base URL.
    let base_url = format!("{}:{}",
        RUNTIME_CTX.parms.config.http_addr,
        RUNTIME_CTX.parms.config.http_port);

    // Create the routes and run the server.
    let env_api = EnvInfoApi::new(
        &RUNTIME_CTX.parms.config.run_env,
        RUNTIME_CTX.parms.config.http_port);
    let app = build_app(env_api, &base_url);

    let addr = format!("{}{}", "0.0.0.0:", RUNTIME_CTX.parms.config.http_port);
    println!("Server running on {}", base_url);
    println!("API documentation: {}/docs", base_url);

    // ------------------ Main Loop -------------------
    poem::Server::new(TcpListener::bind(addr))
        .name(SERVER_NAME)
        .run(app)
        .await
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// build_app:
// ---------------------------------------------------------------------------
/** Assemble the route table: the three info endpoints at the root plus the
 * generated openapi specs and the swagger ui.
 */
fn build_app(env_api: EnvInfoApi, base_url: &str) -> Route {
    let endpoints = (WelcomeApi, HealthApi, env_api);
    let api_service =
        OpenApiService::new(endpoints, "Info Server", "0.1.0").server(base_url.to_string());

    // Allow the generated openapi specs to be retrieved from the server.
    let spec = api_service.spec_endpoint();
    let spec_yaml = api_service.spec_endpoint_yaml();
    let ui = api_service.swagger_ui();

    Route::new()
        .nest("/docs", ui)
        .at("/spec", spec)
        .at("/spec_yaml", spec_yaml)
        .nest("/", api_service)
}

// ---------------------------------------------------------------------------
// server_init:
// ---------------------------------------------------------------------------
/** Initializing all subsystems and data structures other than those needed
 * to configure the main loop processor.
 */
fn server_init() {
    // Configure our log.  This also forces creation of the data directories.
    init_log();

    // When only the directory skeleton was requested we're already done.
    if INFO_ARGS.create_dirs_only {
        println!("Created data directories under {}.", INFO_DIRS.root_dir);
        std::process::exit(0);
    }

    // Force the reading of input parameters and initialization of the
    // runtime context.
    info!("{}", Errors::InputParms(format!("{:#?}", *RUNTIME_CTX)));

    // Log build info.
    print_version_info();
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    // Log build info.
    info!("{}.", format!("\n*** Running info_server={}, RUSTC={}",
                        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
                        env!("RUSTC_VERSION")),
    );
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use poem::http::StatusCode;
    use poem::test::TestClient;

    fn test_app() -> Route {
        build_app(EnvInfoApi::new("development", 3000), "http://localhost:3000")
    }

    #[tokio::test]
    async fn defined_routes_resolve() {
        let cli = TestClient::new(test_app());
        cli.get("/").send().await.assert_status_is_ok();
        cli.get("/health").send().await.assert_status_is_ok();
        cli.get("/env").send().await.assert_status_is_ok();
        cli.get("/spec").send().await.assert_status_is_ok();
    }

    #[tokio::test]
    async fn unmatched_route_is_not_found() {
        let cli = TestClient::new(test_app());
        cli.get("/nonexistent").send().await.assert_status(StatusCode::NOT_FOUND);
    }
}
