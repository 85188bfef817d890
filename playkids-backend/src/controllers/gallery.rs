use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures_util::StreamExt;
use serde::Deserialize;

use crate::controllers::{db_error, not_found, optional_user, require_staff};
use crate::db::tables::NewGalleryItem;
use crate::models::{GalleryItemResponse, UpdateGalleryItemRequest};
use crate::uploads::{self, UploadError, MAX_UPLOAD_BYTES};
use crate::validation::{sanitize_optional, sanitize_text, Validator};
use crate::AppState;

const MAX_TITLE_LENGTH: usize = 100;
const MAX_ALBUM_LENGTH: usize = 50;
const MAX_DESCRIPTION_LENGTH: usize = 1000;
/// Text fields are tiny; anything beyond this is not a form value
const MAX_TEXT_FIELD_BYTES: usize = 8 * 1024;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/gallery")
            .route("", web::get().to(list_gallery))
            .route("", web::post().to(upload_photo))
            .route("/{id}", web::patch().to(update_photo))
            .route("/{id}", web::delete().to(delete_photo)),
    );
}

#[derive(Deserialize)]
struct ListQuery {
    album: Option<String>,
}

async fn list_gallery(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> impl Responder {
    let published_only = !optional_user(&state, &req).is_some_and(|u| u.role.is_staff());
    let album = query.album.as_deref().map(str::trim).filter(|a| !a.is_empty());
    match state.db.list_gallery_items(album, published_only) {
        Ok(items) => {
            let items: Vec<GalleryItemResponse> = items.into_iter().map(Into::into).collect();
            HttpResponse::Ok().json(items)
        }
        Err(e) => db_error("Failed to list gallery", e),
    }
}

fn upload_error_response(err: &UploadError) -> HttpResponse {
    let body = serde_json::json!({ "error": err.to_string() });
    match err {
        UploadError::MissingFile => HttpResponse::BadRequest().json(body),
        UploadError::TooLarge { .. } => HttpResponse::PayloadTooLarge().json(body),
        UploadError::UnsupportedType(_) | UploadError::ContentMismatch { .. } => {
            HttpResponse::UnsupportedMediaType().json(body)
        }
        UploadError::Io(e) => {
            log::error!("Failed to store upload: {}", e);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// Form fields collected from the multipart body
#[derive(Default)]
struct UploadForm {
    file: Vec<u8>,
    file_type: Option<String>,
    title: Option<String>,
    description: Option<String>,
    album: Option<String>,
    published: Option<bool>,
}

async fn read_form(payload: &mut Multipart) -> Result<UploadForm, HttpResponse> {
    let mut form = UploadForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| {
            HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Failed to process upload: {}", e)
            }))
        })?;
        let name = field.name().to_string();
        let is_file = name == "file";
        if is_file {
            form.file_type = field.content_type().map(|m| m.to_string());
        }
        let limit = if is_file { MAX_UPLOAD_BYTES } else { MAX_TEXT_FIELD_BYTES };

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| {
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": format!("Failed to read upload data: {}", e)
                }))
            })?;
            if data.len() + chunk.len() > limit {
                return Err(if is_file {
                    upload_error_response(&UploadError::TooLarge { limit })
                } else {
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": format!("Field '{}' is too long", name)
                    }))
                });
            }
            data.extend_from_slice(&chunk);
        }

        if is_file {
            form.file = data;
            continue;
        }
        let value = String::from_utf8_lossy(&data).into_owned();
        match name.as_str() {
            "title" => form.title = Some(value),
            "description" => form.description = Some(value),
            "album" => form.album = Some(value),
            "published" => form.published = Some(matches!(value.trim(), "true" | "1" | "on")),
            _ => {}
        }
    }
    Ok(form)
}

async fn upload_photo(
    state: web::Data<AppState>,
    req: HttpRequest,
    mut payload: Multipart,
) -> impl Responder {
    let user = match require_staff(&state, &req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let form = match read_form(&mut payload).await {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let title = form.title.unwrap_or_default();
    let mut v = Validator::new();
    v.required("title", &title)
        .length("title", &title, 1, MAX_TITLE_LENGTH)
        .optional_length("description", form.description.as_deref(), MAX_DESCRIPTION_LENGTH)
        .optional_length("album", form.album.as_deref(), MAX_ALBUM_LENGTH);
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let declared = form.file_type.unwrap_or_default();
    let stored = match uploads::store_image(&state.config.gallery_dir(), &form.file, &declared) {
        Ok(s) => s,
        Err(e) => return upload_error_response(&e),
    };

    let title = sanitize_text(&title);
    let description = sanitize_optional(form.description.as_deref());
    let album = sanitize_optional(form.album.as_deref());
    let item = NewGalleryItem {
        title: &title,
        description: description.as_deref(),
        album: album.as_deref(),
        filename: &stored.filename,
        content_type: stored.content_type,
        size_bytes: stored.size_bytes,
        published: form.published.unwrap_or(true),
        uploaded_by: user.id,
    };
    match state.db.create_gallery_item(&item) {
        Ok(created) => {
            log::info!("{} uploaded gallery photo {}", user.email, created.id);
            HttpResponse::Created().json(GalleryItemResponse::from(created))
        }
        Err(e) => {
            if let Err(io) = uploads::remove_image(&state.config.gallery_dir(), &stored.filename) {
                log::warn!("Failed to clean up {}: {}", stored.filename, io);
            }
            db_error("Failed to save gallery item", e)
        }
    }
}

async fn update_photo(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateGalleryItemRequest>,
) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    let mut v = Validator::new();
    if let Some(title) = &body.title {
        v.required("title", title).length("title", title, 1, MAX_TITLE_LENGTH);
    }
    v.optional_length("description", body.description.as_deref(), MAX_DESCRIPTION_LENGTH)
        .optional_length("album", body.album.as_deref(), MAX_ALBUM_LENGTH);
    if let Err(errors) = v.finish() {
        return errors.to_response();
    }

    let update = UpdateGalleryItemRequest {
        title: body.title.as_deref().map(sanitize_text),
        description: sanitize_optional(body.description.as_deref()),
        album: sanitize_optional(body.album.as_deref()),
        published: body.published,
    };
    match state.db.update_gallery_item(path.into_inner(), &update) {
        Ok(Some(item)) => HttpResponse::Ok().json(GalleryItemResponse::from(item)),
        Ok(None) => not_found("Gallery item"),
        Err(e) => db_error("Failed to update gallery item", e),
    }
}

async fn delete_photo(state: web::Data<AppState>, req: HttpRequest, path: web::Path<i64>) -> impl Responder {
    if let Err(resp) = require_staff(&state, &req) {
        return resp;
    }
    match state.db.delete_gallery_item(path.into_inner()) {
        Ok(Some(item)) => {
            if let Err(e) = uploads::remove_image(&state.config.gallery_dir(), &item.filename) {
                log::warn!("Gallery item {} deleted but file {} remains: {}", item.id, item.filename, e);
            }
            HttpResponse::Ok().json(serde_json::json!({ "success": true }))
        }
        Ok(None) => not_found("Gallery item"),
        Err(e) => db_error("Failed to delete gallery item", e),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::header;
    use actix_web::test;

    use crate::controllers::test_support::{bearer, seed_user, test_app, test_state};
    use crate::models::Role;
    use crate::uploads::tests::PNG_BYTES;

    const BOUNDARY: &str = "playkidsboundary";

    fn multipart_body(file: &[u8], file_type: &str, title: &str, published: &str) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in [("title", title), ("album", "Spring"), ("published", published)] {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"photo\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(token: &str, body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/gallery")
            .insert_header(bearer(token))
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn test_upload_checks_type_and_visibility() {
        let (_dir, state) = test_state();
        let (_, staff) = seed_user(&state, "t@example.com", Role::Teacher);
        let gallery_dir = state.config.gallery_dir();
        let app = test_app!(state);

        let req = upload_request(&staff, multipart_body(b"%PDF-1.7 not an image", "image/png", "Fake", "true")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 415);

        let req = upload_request(&staff, multipart_body(PNG_BYTES, "image/png", "Spring walk", "false")).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
        let created: serde_json::Value = test::read_body_json(resp).await;
        let url = created["url"].as_str().unwrap();
        assert!(url.starts_with("/uploads/gallery/") && url.ends_with(".png"));
        let filename = url.rsplit('/').next().unwrap().to_string();
        assert!(gallery_dir.join(&filename).exists());

        // Unpublished photos are hidden from the public
        let req = test::TestRequest::get().uri("/api/gallery").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body.as_array().unwrap().is_empty());
        let req = test::TestRequest::get()
            .uri("/api/gallery?album=Spring")
            .insert_header(bearer(&staff))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/gallery/{}", created["id"]))
            .insert_header(bearer(&staff))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
        assert!(!gallery_dir.join(&filename).exists());
    }
}
