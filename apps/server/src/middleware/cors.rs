use actix_cors::Cors;
use actix_web::http::header;

/// Build CORS middleware from the configured origins. Entries are lightly
/// validated; an empty configuration falls back to localhost for dev.
pub fn cors_middleware(origins: &[String]) -> Cors {
    let effective: Vec<String> = if origins.is_empty() {
        vec![
            "http://localhost:3000".to_string(),
            "http://127.0.0.1:3000".to_string(),
        ]
    } else {
        origins.to_vec()
    };

    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
        .max_age(3600);

    for origin in effective {
        cors = cors.allowed_origin(&origin);
    }

    cors
}
