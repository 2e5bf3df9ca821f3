#![deny(clippy::wildcard_imports)]

use actix_web::{web, App, HttpServer};
use baloot_server::routes;
use baloot_server::{cors_middleware, AppConfig, AppState};
use tokio_util::sync::CancellationToken;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    baloot_server::telemetry::init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    };
    let bind = config.bind_addr.clone();
    let cors_origins = config.cors_origins.clone();
    let app_state = AppState::build(config).await;

    // Background tasks: matchmaking and room housekeeping.
    let cancel = CancellationToken::new();
    tokio::spawn(app_state.matchmaker.clone().run(
        app_state.registry.clone(),
        app_state.session_hub.clone(),
        cancel.child_token(),
    ));
    tokio::spawn(app_state.registry.clone().run_reaper(cancel.child_token()));

    println!("🚀 Baloot server listening on http://{bind}");

    let server_state = app_state.clone();
    let result = HttpServer::new(move || {
        App::new()
            .wrap(cors_middleware(&cors_origins))
            .app_data(web::Data::new(server_state.clone()))
            .configure(routes::configure)
    })
    .bind(bind.as_str())?
    .run()
    .await;

    cancel.cancel();
    result
}
