//! Encrypted file blob routes (spec §9 supplemented feature: opaque
//! ciphertext blobs, server never sees plaintext or a usable decryption
//! key — only the per-recipient wrapped keys it stores alongside).

use crate::db::{self, Db};
use crate::error::{ApiError, ApiResult};
use crate::models::{EncryptedFileMeta, UploadEncryptedFileRequest, UploadEncryptedFileResponse};
use base64::Engine;
use rocket::serde::json::Json;
use rocket::{get, post, State};

use super::AuthUser;

#[post("/api/v1/files", format = "json", data = "<body>")]
pub fn upload_file(
    db: &State<Db>,
    user: AuthUser,
    body: Json<UploadEncryptedFileRequest>,
) -> ApiResult<Json<UploadEncryptedFileResponse>> {
    if body.scope != "dm" && body.scope != "group" {
        return Err(ApiError::BadInput("scope must be 'dm' or 'group'".into()));
    }
    let ciphertext = base64::engine::general_purpose::STANDARD
        .decode(&body.ciphertext)
        .map_err(|_| ApiError::BadInput("ciphertext is not valid base64".into()))?;
    let conn = db.conn();
    let meta = db::insert_blob(&conn, &user.0.username, &body, &ciphertext)?;
    Ok(Json(UploadEncryptedFileResponse { id: meta.id }))
}

#[get("/api/v1/files/<id>/meta")]
pub fn file_meta(db: &State<Db>, _user: AuthUser, id: &str) -> ApiResult<Json<EncryptedFileMeta>> {
    let conn = db.conn();
    db::find_blob_meta(&conn, id)?.map(Json).ok_or_else(|| ApiError::NotFound("file not found".into()))
}

#[get("/api/v1/files/<id>/blob")]
pub fn download_file(db: &State<Db>, user: AuthUser, id: &str) -> ApiResult<Vec<u8>> {
    let conn = db.conn();
    db::find_blob_bytes(&conn, id, &user.0.username)?.ok_or_else(|| ApiError::NotFound("file not found".into()))
}
