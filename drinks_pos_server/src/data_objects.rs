use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};

/// The success envelope. Every successful JSON response is `{"data": ...}`; errors are `{"error": "..."}` (see
/// [`crate::errors::ServerError`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse<T> {
    pub data: T,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn ok(data: T) -> HttpResponse {
        HttpResponse::Ok().json(Self { data })
    }

    pub fn created(data: T) -> HttpResponse {
        HttpResponse::Created().json(Self { data })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkReaderRequest {
    pub name: String,
    pub pairing_code: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PurchaseQuery {
    pub limit: Option<u32>,
}
