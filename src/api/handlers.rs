use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::document::UploadedFile;
use crate::error::PayslipError;
use crate::models::{AskResponse, CompareAnswer, ExtractedPayslip, SectionView, SimilarPayslip};

type ApiResult<T> = Result<Json<T>, ApiError>;

const DEFAULT_SIMILAR_LIMIT: usize = 3;

struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// All parts of a multipart request, read up front so handlers can pick
/// them by name in any order.
struct Form {
    parts: Vec<Part>,
}

impl Form {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut parts = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid multipart request: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(|e| {
                ApiError::BadRequest(format!("Failed to read part '{}': {}", name, e))
            })?;
            parts.push(Part {
                name,
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        }
        Ok(Self { parts })
    }

    fn take(&mut self, name: &str) -> Result<Part, ApiError> {
        let index = self
            .parts
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| ApiError::BadRequest(format!("Missing required part '{}'", name)))?;
        Ok(self.parts.swap_remove(index))
    }

    fn file(&mut self, name: &str) -> Result<UploadedFile, ApiError> {
        let part = self.take(name)?;
        let file_name = part.file_name.unwrap_or_else(|| name.to_string());
        Ok(UploadedFile::new(file_name, part.content_type, part.bytes))
    }

    fn text(&mut self, name: &str) -> Result<String, ApiError> {
        let part = self.take(name)?;
        String::from_utf8(part.bytes)
            .map_err(|_| ApiError::BadRequest(format!("Part '{}' must be UTF-8 text", name)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarQuery {
    national_id: Option<String>,
    employee_name: Option<String>,
    limit: Option<usize>,
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn extract_payslip(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<ExtractedPayslip> {
    let mut form = Form::read(multipart).await?;
    let file = form.file("file")?;
    log::info!("Extracting payslip from upload '{}'", file.file_name);

    Ok(Json(state.extractor.extract_and_index(&file).await?))
}

pub async fn ask_payslip(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<AskResponse> {
    let mut form = Form::read(multipart).await?;
    let file = form.file("file")?;
    let question = form.text("question")?;

    Ok(Json(state.ask.ask(&file, &question).await?))
}

pub async fn compare_payslips(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<CompareAnswer> {
    let mut form = Form::read(multipart).await?;
    let previous = form.file("previous")?;
    let current = form.file("current")?;
    let question = form.text("question")?;

    Ok(Json(
        state
            .compare
            .compare_and_explain(&previous, &current, &question)
            .await?,
    ))
}

pub async fn get_section(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> ApiResult<SectionView> {
    let section = state
        .sections
        .get_by_doc_id(&doc_id)
        .await
        .map_err(PayslipError::from)?
        .ok_or_else(|| PayslipError::NotFound(format!("No section found with docId: {}", doc_id)))?;
    Ok(Json(section))
}

pub async fn similar_payslips(
    State(state): State<AppState>,
    Query(query): Query<SimilarQuery>,
) -> ApiResult<Vec<SimilarPayslip>> {
    let results = state
        .similarity
        .search(
            query.national_id.as_deref(),
            query.employee_name.as_deref(),
            query.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT),
        )
        .await?;
    Ok(Json(results))
}
