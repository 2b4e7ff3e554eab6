//! Record catalog routes: search, CRUD, choice lists, month list and images.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::session::Session;
use super::state::{GuardedImageStore, GuardedRecordStore, ServerState};
use crate::record_store::{
    ChoiceCategory, RangeFilter, RecordFields, RecordStoreError, SearchFilters,
};

const MAX_UPLOAD_SIZE: usize = 32 * 1024 * 1024;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for RecordStoreError {
    fn into_response(self) -> Response {
        match &self {
            RecordStoreError::Validation(_) => {
                error_response(StatusCode::BAD_REQUEST, self.to_string())
            }
            RecordStoreError::NotFound(_) | RecordStoreError::UnknownCategory(_) => {
                error_response(StatusCode::NOT_FOUND, self.to_string())
            }
            RecordStoreError::Persistence(err) => {
                error!("Record store failure: {}", err);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Storage failure")
            }
        }
    }
}

/// Query string of the search endpoint.
#[derive(Deserialize, Debug, Default)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub adv_artist: Option<String>,
    pub adv_album: Option<String>,
    pub adv_genre: Option<String>,
    pub adv_store: Option<String>,
    pub adv_year_start: Option<String>,
    pub adv_year_end: Option<String>,
    pub adv_date_start: Option<String>,
    pub adv_date_end: Option<String>,
}

impl From<SearchQuery> for SearchFilters {
    fn from(query: SearchQuery) -> Self {
        SearchFilters {
            text: query.search,
            artist: query.adv_artist,
            album: query.adv_album,
            genre: query.adv_genre,
            store: query.adv_store,
            year: RangeFilter::new(query.adv_year_start, query.adv_year_end),
            created_month: RangeFilter::new(query.adv_date_start, query.adv_date_end),
        }
        .normalized()
    }
}

#[derive(Deserialize, Debug, Default)]
struct DeleteRecordBody {
    #[serde(default)]
    confirm: bool,
}

/// Multipart form of the add and edit endpoints.
struct RecordForm {
    fields: RecordFields,
    image: Option<(String, Bytes)>,
}

async fn read_record_form(mut multipart: Multipart) -> Result<RecordForm, Response> {
    let mut fields = RecordFields::default();
    let mut image = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed record form: {}", e);
                return Err(error_response(StatusCode::BAD_REQUEST, e.body_text()));
            }
        };
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == "image" {
            let file_name = field.file_name().unwrap_or("").to_string();
            match field.bytes().await {
                Ok(bytes) => image = Some((file_name, bytes)),
                Err(e) => {
                    warn!("Failed to read image data: {}", e);
                    return Err(error_response(
                        StatusCode::BAD_REQUEST,
                        "Failed to read image",
                    ));
                }
            }
            continue;
        }

        let value = match field.text().await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read field {}: {}", field_name, e);
                return Err(error_response(StatusCode::BAD_REQUEST, e.body_text()));
            }
        };
        match field_name.as_str() {
            "artist" => fields.artist = value,
            "album" => fields.album = value,
            "genre" => fields.genre = Some(value),
            "year" => fields.year = Some(value),
            "store" => fields.store = Some(value),
            other => debug!("Ignoring form field {}", other),
        }
    }

    Ok(RecordForm {
        fields: fields.normalized(),
        image,
    })
}

/// Validates the form and stores its image, if any.
async fn prepare_fields(
    form: RecordForm,
    images: &GuardedImageStore,
) -> Result<RecordFields, Response> {
    let RecordForm { mut fields, image } = form;
    fields.validate().map_err(IntoResponse::into_response)?;

    fields.filename = match image {
        Some((name, bytes)) => images.save(&name, &bytes).await.map_err(|e| {
            error!("Failed to store image: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store image")
        })?,
        None => None,
    };
    Ok(fields)
}

async fn search_records(
    _session: Session,
    State(store): State<GuardedRecordStore>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let filters = SearchFilters::from(query);
    debug!("search_records() {:?}", filters);
    match store.search(&filters) {
        Ok(records) => Json(records).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn create_record(
    _session: Session,
    State(state): State<ServerState>,
    multipart: Multipart,
) -> Response {
    let form = match read_record_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    let fields = match prepare_fields(form, &state.image_store).await {
        Ok(fields) => fields,
        Err(response) => return response,
    };

    match state.record_store.create_record(&fields) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_record(
    _session: Session,
    State(store): State<GuardedRecordStore>,
    Path(id): Path<i64>,
) -> Response {
    match store.get_record(id) {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn update_record(
    _session: Session,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Response {
    let form = match read_record_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    let fields = match prepare_fields(form, &state.image_store).await {
        Ok(fields) => fields,
        Err(response) => return response,
    };

    match state.record_store.update_record(id, &fields) {
        Ok(record) => Json(record).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn delete_record(
    _session: Session,
    State(store): State<GuardedRecordStore>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Response {
    let confirmed = serde_json::from_slice::<DeleteRecordBody>(&body)
        .map(|body| body.confirm)
        .unwrap_or(false);
    if !confirmed {
        return error_response(
            StatusCode::PRECONDITION_REQUIRED,
            "Deletion must be confirmed",
        );
    }

    match store.delete_record(id) {
        Ok(true) => StatusCode::OK.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn list_choices(
    _session: Session,
    State(store): State<GuardedRecordStore>,
    Path(category): Path<String>,
) -> Response {
    let category: ChoiceCategory = match category.parse() {
        Ok(category) => category,
        Err(err) => return RecordStoreError::into_response(err),
    };
    match store.list_choices(category) {
        Ok(names) => Json(names).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_months(_session: Session, State(store): State<GuardedRecordStore>) -> Response {
    match store.month_range() {
        Ok(months) => Json(months).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_image(
    _session: Session,
    State(images): State<GuardedImageStore>,
    Path(filename): Path<String>,
) -> Response {
    let Some(path) = images.path_of(&filename) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let buffer = match tokio::fs::read(&path).await {
        Ok(buffer) => buffer,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            error!("Failed to read image {:?}: {}", path, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match infer::get(&buffer) {
        Some(kind) if kind.mime_type().starts_with("image/") => {
            ([(header::CONTENT_TYPE, kind.mime_type())], buffer).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Routes mounted under `/v1`:
///
/// - GET/POST /records - Search, add
/// - GET/PUT/DELETE /records/{id} - Detail, edit, delete
/// - GET /choices/{category} - Recency-ordered genres or stores
/// - GET /months - Creation months for the date filter
/// - GET /images/{filename} - Cover images
pub fn record_routes() -> Router<ServerState> {
    let form_routes = Router::new()
        .route("/records", get(search_records).post(create_record))
        .route(
            "/records/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE));

    Router::new()
        .merge(form_routes)
        .route("/choices/{category}", get(list_choices))
        .route("/months", get(get_months))
        .route("/images/{filename}", get(get_image))
}
