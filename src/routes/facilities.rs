//! Facility CRUD and the facility responsibles list.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::{ApiError, ApiResult, AppState};
use crate::alerts::recipients::{emails_from_record, responsibles_item};
use crate::alerts::normalize_emails;
use crate::keys::{self, METADATA_SK, RESPONSIBLES_SK};
use crate::store::attrs::{self, item_to_json};
use crate::store::{Item, ItemStore, ScanFilter};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/facilities", get(list_facilities).post(create_facility))
        .route("/facilities/{facility_id}", get(get_facility).put(update_facility))
        .route(
            "/facilities/{facility_id}/responsibles",
            get(get_responsibles).put(put_responsibles),
        )
}

#[derive(Debug, Deserialize)]
struct FacilityCreate {
    name: String,
    location: String,
}

#[derive(Debug, Default, Deserialize)]
struct FacilityUpdate {
    name: Option<String>,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsiblesUpdate {
    responsibles: Vec<String>,
}

async fn load_facility(store: &dyn ItemStore, facility_id: &str) -> ApiResult<Item> {
    store
        .get_item(&keys::facility_pk(facility_id), METADATA_SK)
        .await?
        .ok_or(ApiError::NotFound("Facility not found"))
}

async fn list_facilities(State((store, _)): State<AppState>) -> ApiResult<Json<Value>> {
    // ---
    let filter = ScanFilter {
        pk_prefix: Some(keys::FACILITY_PREFIX.to_string()),
        sk_equals: Some(METADATA_SK.to_string()),
        attr: None,
    };
    let facilities: Vec<Value> = store.scan(&filter).await?.iter().map(item_to_json).collect();

    Ok(Json(json!({ "count": facilities.len(), "facilities": facilities })))
}

async fn create_facility(
    State((store, _)): State<AppState>,
    Json(body): Json<FacilityCreate>,
) -> ApiResult<Json<Value>> {
    // ---
    let facility_id = Uuid::new_v4().to_string();
    let item = Item::from([
        (keys::PK.to_string(), attrs::s(keys::facility_pk(&facility_id))),
        (keys::SK.to_string(), attrs::s(METADATA_SK)),
        ("facility_id".to_string(), attrs::s(&facility_id)),
        ("name".to_string(), attrs::s(body.name)),
        ("location".to_string(), attrs::s(body.location)),
        (keys::TYPE_ATTR.to_string(), attrs::s("FACILITY")),
    ]);

    store.put_item(item.clone()).await?;
    info!(%facility_id, "Facility created");

    Ok(Json(json!({
        "message": "Facility created successfully",
        "facility": item_to_json(&item),
    })))
}

async fn get_facility(
    State((store, _)): State<AppState>,
    Path(facility_id): Path<String>,
) -> ApiResult<Json<Value>> {
    // ---
    let item = load_facility(store.as_ref(), &facility_id).await?;
    Ok(Json(item_to_json(&item)))
}

async fn update_facility(
    State((store, _)): State<AppState>,
    Path(facility_id): Path<String>,
    Json(body): Json<FacilityUpdate>,
) -> ApiResult<Json<Value>> {
    // ---
    let mut item = load_facility(store.as_ref(), &facility_id).await?;

    let updates: Vec<(&str, String)> = [("name", body.name), ("location", body.location)]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
        .collect();
    if updates.is_empty() {
        return Err(ApiError::BadRequest("No fields to update"));
    }

    for (field, value) in updates {
        item.insert(field.to_string(), attrs::s(value));
    }
    store.put_item(item.clone()).await?;
    info!(%facility_id, "Facility updated");

    Ok(Json(json!({
        "message": "Facility updated successfully",
        "updated_facility": item_to_json(&item),
    })))
}

async fn get_responsibles(
    State((store, _)): State<AppState>,
    Path(facility_id): Path<String>,
) -> ApiResult<Json<Value>> {
    // ---
    let responsibles = store
        .get_item(&keys::facility_pk(&facility_id), RESPONSIBLES_SK)
        .await?
        .map(|item| emails_from_record(&item))
        .unwrap_or_default();

    Ok(Json(json!({ "facility_id": facility_id, "responsibles": responsibles })))
}

async fn put_responsibles(
    State((store, _)): State<AppState>,
    Path(facility_id): Path<String>,
    Json(body): Json<ResponsiblesUpdate>,
) -> ApiResult<Json<Value>> {
    // ---
    load_facility(store.as_ref(), &facility_id).await?;

    let responsibles = normalize_emails(&body.responsibles);
    store
        .put_item(responsibles_item(&facility_id, &responsibles))
        .await?;
    info!(%facility_id, count = responsibles.len(), "Responsibles updated");

    Ok(Json(json!({
        "message": "Responsibles updated successfully",
        "facility_id": facility_id,
        "responsibles": responsibles,
    })))
}
