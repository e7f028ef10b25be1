use actix_web::{web, HttpResponse};
use system::serde_json::json;
use system::CodeSnapshot;

use crate::error::ServerError;
use crate::server::ServerHandle;

pub fn configure_room_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/create-room").route(web::post().to(create_room)))
        .service(web::resource("/rooms").route(web::get().to(list_rooms)));
}

async fn create_room(
    server: web::Data<ServerHandle>,
    code: web::Json<CodeSnapshot>,
) -> Result<HttpResponse, ServerError> {
    let room_id = server.create_room(code.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "roomId": room_id })))
}

async fn list_rooms(server: web::Data<ServerHandle>) -> Result<HttpResponse, ServerError> {
    let rooms = server.list_rooms().await?;
    Ok(HttpResponse::Ok().json(rooms))
}
