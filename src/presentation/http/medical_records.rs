use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::ports::audit_repository::record_quietly;
use crate::application::ports::medical_record_repository::MedicalRecordQuery;
use crate::application::use_cases::medical_records::records::{
    CreateRecord, DeleteRecord, GetRecord, ListRecords, RecordRequest,
};
use crate::application::use_cases::medical_records::upload_record::{
    DownloadRecord, UploadRecord,
};
use crate::bootstrap::app_context::AppContext;
use crate::domain::audit::{AuditAction, AuditEntry};
use crate::domain::medical_records::{MedicalRecord, RecordType};
use crate::presentation::http::client::ClientInfo;
use crate::presentation::http::error::{ApiError, ApiResult};
use crate::presentation::http::security::CurrentUser;

#[derive(Debug, Serialize, ToSchema)]
pub struct MedicalRecordResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub created_by: Uuid,
    pub record_type: RecordType,
    pub title: String,
    pub description: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub checksum: Option<String>,
    pub has_file: bool,
    #[schema(value_type = Option<Object>)]
    pub clinical_data: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub tags: Option<serde_json::Value>,
    pub record_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MedicalRecord> for MedicalRecordResponse {
    fn from(r: MedicalRecord) -> Self {
        Self {
            has_file: r.has_file(),
            id: r.id,
            tenant_id: r.tenant_id,
            patient_id: r.patient_id,
            created_by: r.created_by,
            record_type: r.record_type,
            title: r.title,
            description: r.description,
            file_name: r.file_name,
            file_size: r.file_size,
            mime_type: r.mime_type,
            checksum: r.checksum,
            clinical_data: r.clinical_data,
            tags: r.tags,
            record_date: r.record_date,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRecordRequest {
    pub patient_id: Uuid,
    pub record_type: RecordType,
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub clinical_data: Option<serde_json::Value>,
    #[schema(value_type = Option<Object>)]
    pub tags: Option<serde_json::Value>,
    pub record_date: Option<DateTime<Utc>>,
}

#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadRecordMultipart {
    #[schema(value_type = String, format = Binary)]
    file: String,
    #[schema(value_type = String, format = Uuid)]
    patient_id: String,
    record_type: RecordType,
    title: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListRecordsQuery {
    pub patient_id: Option<Uuid>,
    pub record_type: Option<RecordType>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/medical-records", get(list_records).post(create_record))
        .route("/medical-records/upload", post(upload_record))
        .route(
            "/medical-records/:id",
            get(get_record).delete(delete_record),
        )
        .route("/medical-records/:id/download", get(download_record))
        .with_state(ctx)
}

#[utoipa::path(get, path = "/api/v2/medical-records", tag = "Medical Records", params(ListRecordsQuery),
    responses((status = 200, body = [MedicalRecordResponse])))]
pub async fn list_records(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<ListRecordsQuery>,
) -> ApiResult<Json<Vec<MedicalRecordResponse>>> {
    let repo = ctx.medical_record_repo();
    let uc = ListRecords {
        records: repo.as_ref(),
    };
    let query = MedicalRecordQuery {
        patient_id: q.patient_id,
        record_type: q.record_type,
        page: Page::new(q.skip, q.limit),
    };
    let rows = uc.execute(&current.principal, &query).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[utoipa::path(post, path = "/api/v2/medical-records", tag = "Medical Records", request_body = CreateRecordRequest,
    responses((status = 201, body = MedicalRecordResponse)))]
pub async fn create_record(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<CreateRecordRequest>,
) -> ApiResult<(StatusCode, Json<MedicalRecordResponse>)> {
    let records = ctx.medical_record_repo();
    let patients = ctx.patient_repo();
    let uc = CreateRecord {
        records: records.as_ref(),
        patients: patients.as_ref(),
    };
    let request = RecordRequest {
        patient_id: req.patient_id,
        record_type: req.record_type,
        title: req.title,
        description: req.description,
        clinical_data: req.clinical_data,
        tags: req.tags,
        record_date: req.record_date,
    };
    let record = uc.execute(&current.principal, &request).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

fn bad_field(name: &str) -> ApiError {
    ApiError::bad_request(format!("Invalid or missing form field: {name}"))
}

/// Only a body over the size limit is a 413; truncated or malformed parts are the client's 400.
fn multipart_failure(status: StatusCode, reason: &str) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "File too large")
    } else {
        ApiError::bad_request(format!("Malformed multipart body: {reason}"))
    }
}

fn from_multipart(err: MultipartError) -> ApiError {
    multipart_failure(err.status(), &err.body_text())
}

/// POST /api/v2/medical-records/upload (multipart/form-data)
/// Fields: file, patient_id, record_type, title, description (optional).
#[utoipa::path(
    post,
    path = "/api/v2/medical-records/upload",
    tag = "Medical Records",
    request_body(content = UploadRecordMultipart, content_type = "multipart/form-data"),
    responses(
        (status = 201, body = MedicalRecordResponse),
        (status = 400, description = "Empty file or extension not allowed"),
        (status = 413, description = "File too large")
    )
)]
pub async fn upload_record(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    client: ClientInfo,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<MedicalRecordResponse>)> {
    let mut patient_id: Option<Uuid> = None;
    let mut record_type: Option<RecordType> = None;
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(from_multipart)?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(from_multipart)?;
                file = Some((file_name, data.to_vec()));
            }
            "patient_id" => {
                let text = field.text().await.map_err(|_| bad_field("patient_id"))?;
                patient_id = Some(Uuid::parse_str(text.trim()).map_err(|_| bad_field("patient_id"))?);
            }
            "record_type" => {
                let text = field.text().await.map_err(|_| bad_field("record_type"))?;
                record_type = Some(text.trim().parse().map_err(|_| bad_field("record_type"))?);
            }
            "title" => title = Some(field.text().await.map_err(|_| bad_field("title"))?),
            "description" => {
                let text = field.text().await.map_err(|_| bad_field("description"))?;
                description = Some(text).filter(|t| !t.trim().is_empty());
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| bad_field("file"))?;
    let request = RecordRequest {
        patient_id: patient_id.ok_or_else(|| bad_field("patient_id"))?,
        record_type: record_type.ok_or_else(|| bad_field("record_type"))?,
        title: title.ok_or_else(|| bad_field("title"))?,
        description,
        clinical_data: None,
        tags: None,
        record_date: None,
    };

    let records = ctx.medical_record_repo();
    let patients = ctx.patient_repo();
    let files = ctx.medical_files();
    let uc = UploadRecord {
        records: records.as_ref(),
        patients: patients.as_ref(),
        files: files.as_ref(),
        max_bytes: ctx.cfg.max_upload_bytes,
    };
    let record = uc
        .execute(&current.principal, &request, &file_name, &bytes)
        .await?;

    let audit = ctx.audit_repo();
    record_quietly(
        audit.as_ref(),
        current.principal.tenant_id,
        AuditEntry {
            user_id: current.principal.user_id,
            action: AuditAction::Created,
            entity_type: "medical_record",
            entity_id: record.id,
            details: Some(serde_json::json!({
                "file_name": file_name,
                "file_size": record.file_size,
            })),
            ip_address: client.ip_address(),
            user_agent: client.user_agent.clone(),
        },
    )
    .await;
    Ok((StatusCode::CREATED, Json(record.into())))
}

#[utoipa::path(get, path = "/api/v2/medical-records/{id}", tag = "Medical Records",
    params(("id" = Uuid, Path, description = "Medical record id")),
    responses((status = 200, body = MedicalRecordResponse), (status = 404)))]
pub async fn get_record(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MedicalRecordResponse>> {
    let records = ctx.medical_record_repo();
    let audit = ctx.audit_repo();
    let uc = GetRecord {
        records: records.as_ref(),
        audit: audit.as_ref(),
    };
    Ok(Json(uc.execute(&current.principal, id).await?.into()))
}

fn attachment_disposition(file_name: &str) -> HeaderValue {
    let safe: String = file_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[utoipa::path(get, path = "/api/v2/medical-records/{id}/download", tag = "Medical Records",
    params(("id" = Uuid, Path, description = "Medical record id")),
    responses(
        (status = 200, description = "Decrypted file", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 404, description = "Record or file missing")
    ))]
pub async fn download_record(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let records = ctx.medical_record_repo();
    let files = ctx.medical_files();
    let audit = ctx.audit_repo();
    let uc = DownloadRecord {
        records: records.as_ref(),
        files: files.as_ref(),
        audit: audit.as_ref(),
    };
    let download = uc.execute(&current.principal, id).await?;
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&download.mime_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        attachment_disposition(&download.file_name),
    );
    headers.insert(
        header::HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    Ok((headers, download.bytes).into_response())
}

#[utoipa::path(delete, path = "/api/v2/medical-records/{id}", tag = "Medical Records",
    params(("id" = Uuid, Path, description = "Medical record id")),
    responses((status = 204), (status = 404)))]
pub async fn delete_record(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let records = ctx.medical_record_repo();
    let files = ctx.medical_files();
    let audit = ctx.audit_repo();
    DeleteRecord {
        records: records.as_ref(),
        files: files.as_ref(),
        audit: audit.as_ref(),
    }
    .execute(&current.principal, id)
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_size_limit_maps_to_413() {
        let err = multipart_failure(StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded");
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.detail, "File too large");

        let err = multipart_failure(StatusCode::BAD_REQUEST, "incomplete field data");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.detail, "Malformed multipart body: incomplete field data");
    }

    #[test]
    fn disposition_quotes_file_name() {
        let v = attachment_disposition("x-ray 2024.png");
        assert_eq!(v.to_str().unwrap(), "attachment; filename=\"x-ray 2024.png\"");
    }

    #[test]
    fn disposition_strips_quotes_and_control_chars() {
        let v = attachment_disposition("evil\"\nname.pdf");
        assert_eq!(v.to_str().unwrap(), "attachment; filename=\"evil__name.pdf\"");
    }
}
