use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use env_logger::Env;

use coderoom_server::config::Config;
use coderoom_server::handlers;
use coderoom_server::server::spawn_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    let server = spawn_server(config.server_options());

    log::info!("Listening on {}", config.bind);
    let bind = config.bind.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(config.cors())
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(server.clone()))
            .app_data(web::JsonConfig::default().limit(config.max_payload_bytes))
            .configure(handlers::root)
    })
    .bind(bind)?
    .run()
    .await
}
