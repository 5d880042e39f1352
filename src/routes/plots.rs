//! Plot metadata, thresholds and sensor history.
//!
//! Plot metadata lives under its facility (`FACILITY#<fid>` / `PLOT#<pid>`),
//! so lookups by plot id go through the type index. Everything else about a
//! plot (thresholds, states, irrigation events) sits under `PLOT#<pid>`.
//!
//! The web client addresses plots under the singular `/plot` prefix and reads
//! history as a bare array; those routes share the handlers below.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ApiError, ApiResult, AppState};
use crate::keys::{self, EVENT_PREFIX, METADATA_SK, STATE_PREFIX, THRESHOLDS_SK};
use crate::models::{Bounds, Metric, MetricBounds, PlotThresholds};
use crate::store::attrs::{self, first_string, item_to_json, key_string};
use crate::store::{AttrFilter, Item, ItemStore, KeyQuery};

/// Sorts after every timestamp character, closing a prefix range.
const RANGE_END: char = '~';

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/plots", post(create_plot))
        .route("/plots/facility/{facility_id}", get(list_facility_plots))
        .route(
            "/plots/{plot_id}",
            get(get_plot).put(update_plot).delete(delete_plot),
        )
        .route(
            "/plots/{plot_id}/thresholds",
            get(get_thresholds).put(put_thresholds),
        )
        .route("/plots/{plot_id}/state", get(latest_state))
        .route("/plots/{plot_id}/history", get(history))
        .route("/plots/{plot_id}/irrigations", get(irrigations))
        .route("/plots/{plot_id}/last-irrigation", get(last_irrigation))
        .route("/plot", post(create_plot))
        .route(
            "/plot/{plot_id}",
            get(get_plot).put(update_plot).delete(delete_plot),
        )
        .route("/plot/{plot_id}/state", get(latest_state))
        .route("/plot/{plot_id}/history", get(history_list))
}

#[derive(Debug, Deserialize)]
struct PlotCreate {
    facility_id: String,
    name: String,
    location: String,
    mac_address: String,
    species: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlotUpdate {
    name: Option<String>,
    location: Option<String>,
    species: Option<String>,
}

/// Bounds are replaced per metric; an omitted metric keeps its stored bounds.
#[derive(Debug, Deserialize)]
struct ThresholdsUpdate {
    enabled: Option<bool>,
    temperature: Option<MetricBounds>,
    humidity: Option<MetricBounds>,
    light: Option<MetricBounds>,
    irrigation: Option<MetricBounds>,
}

impl ThresholdsUpdate {
    fn bounds(&self) -> [(Metric, Option<MetricBounds>); 4] {
        [
            (Metric::Temperature, self.temperature),
            (Metric::Humidity, self.humidity),
            (Metric::Light, self.light),
            (Metric::Irrigation, self.irrigation),
        ]
    }

    fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.bounds().iter().all(|(_, b)| b.is_none())
    }
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

/// Metadata item of a plot, found through the type index.
async fn find_plot(store: &dyn ItemStore, plot_id: &str) -> ApiResult<Item> {
    // ---
    let filter = AttrFilter::eq("plot_id", plot_id);
    store
        .query_type_index("PLOT", Some(&filter), Some(1))
        .await?
        .into_iter()
        .next()
        .ok_or(ApiError::NotFound("Plot not found"))
}

/// Thresholds for a new plot: the species profile's bounds when there is
/// one, otherwise disabled with open bounds.
async fn initial_thresholds(
    store: &dyn ItemStore,
    plot_id: &str,
    facility_id: &str,
    species_id: Option<&str>,
) -> ApiResult<PlotThresholds> {
    // ---
    let mut thresholds = PlotThresholds::disabled(plot_id);
    thresholds.facility_id = Some(facility_id.to_string());

    let Some(species_id) = species_id else {
        return Ok(thresholds);
    };
    thresholds.species_id = Some(species_id.to_string());

    match store.get_item(&keys::species_pk(species_id), METADATA_SK).await? {
        Some(profile) => {
            let bounds = Bounds::from_item(&profile);
            thresholds.enabled = Metric::ALL.iter().any(|m| !bounds.get(*m).is_open());
            thresholds.bounds = bounds;
            debug!(plot_id, species_id, "Copied thresholds from species profile");
        }
        None => debug!(plot_id, species_id, "Species profile not found, thresholds disabled"),
    }
    Ok(thresholds)
}

async fn create_plot(
    State((store, _)): State<AppState>,
    Json(body): Json<PlotCreate>,
) -> ApiResult<Json<Value>> {
    // ---
    let store = store.as_ref();
    store
        .get_item(&keys::facility_pk(&body.facility_id), METADATA_SK)
        .await?
        .ok_or(ApiError::NotFound("Facility not found"))?;

    let plot_id = Uuid::new_v4().to_string();
    let species = body.species.filter(|s| !s.trim().is_empty());

    let mut item = Item::from([
        (keys::PK.to_string(), attrs::s(keys::facility_pk(&body.facility_id))),
        (keys::SK.to_string(), attrs::s(keys::plot_sk(&plot_id))),
        ("plot_id".to_string(), attrs::s(&plot_id)),
        ("facility_id".to_string(), attrs::s(&body.facility_id)),
        ("name".to_string(), attrs::s(body.name)),
        ("location".to_string(), attrs::s(body.location)),
        ("mac_address".to_string(), attrs::s(body.mac_address)),
        (keys::TYPE_ATTR.to_string(), attrs::s("PLOT")),
    ]);
    if let Some(species) = &species {
        item.insert("species".to_string(), attrs::s(species));
    }

    let thresholds =
        initial_thresholds(store, &plot_id, &body.facility_id, species.as_deref()).await?;

    store.put_item(item.clone()).await?;
    store.put_item(thresholds.to_item()).await?;
    info!(%plot_id, facility_id = %body.facility_id, enabled = thresholds.enabled, "Plot created");

    Ok(Json(json!({
        "message": "Plot created successfully",
        "plot": item_to_json(&item),
        "thresholds": item_to_json(&thresholds.to_item()),
    })))
}

async fn list_facility_plots(
    State((store, _)): State<AppState>,
    Path(facility_id): Path<String>,
) -> ApiResult<Json<Value>> {
    // ---
    let query = KeyQuery::partition(keys::facility_pk(&facility_id))
        .begins_with(keys::PLOT_PREFIX);
    let plots: Vec<Value> = store.query(&query).await?.iter().map(item_to_json).collect();

    Ok(Json(json!({ "count": plots.len(), "plots": plots })))
}

async fn get_plot(
    State((store, _)): State<AppState>,
    Path(plot_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let item = find_plot(store.as_ref(), &plot_id).await?;
    Ok(Json(item_to_json(&item)))
}

async fn update_plot(
    State((store, _)): State<AppState>,
    Path(plot_id): Path<String>,
    Json(body): Json<PlotUpdate>,
) -> ApiResult<Json<Value>> {
    // ---
    let mut item = find_plot(store.as_ref(), &plot_id).await?;

    let updates: Vec<(&str, String)> = [
        ("name", body.name),
        ("location", body.location),
        ("species", body.species),
    ]
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
    info!(%plot_id, "Plot updated");

    Ok(Json(json!({
        "message": "Plot updated successfully",
        "updated_plot": item_to_json(&item),
    })))
}

async fn delete_plot(
    State((store, _)): State<AppState>,
    Path(plot_id): Path<String>,
) -> ApiResult<Json<Value>> {
    // ---
    let item = find_plot(store.as_ref(), &plot_id).await?;
    let (Some(pk), Some(sk)) = (key_string(&item, keys::PK), key_string(&item, keys::SK)) else {
        return Err(ApiError::NotFound("Plot not found"));
    };

    store.delete_item(pk, sk).await?;
    info!(%plot_id, facility = ?first_string(&item, &["facility_id"]), "Plot deleted");

    Ok(Json(json!({ "message": format!("Plot {plot_id} deleted successfully") })))
}

async fn get_thresholds(
    State((store, _)): State<AppState>,
    Path(plot_id): Path<String>,
) -> ApiResult<Json<Value>> {
    // ---
    let item = store
        .get_item(&keys::plot_pk(&plot_id), THRESHOLDS_SK)
        .await?
        .ok_or(ApiError::NotFound("Thresholds not found"))?;
    Ok(Json(item_to_json(&item)))
}

async fn put_thresholds(
    State((store, _)): State<AppState>,
    Path(plot_id): Path<String>,
    Json(body): Json<ThresholdsUpdate>,
) -> ApiResult<Json<Value>> {
    // ---
    if body.is_empty() {
        return Err(ApiError::BadRequest("No fields to update"));
    }

    let mut thresholds = match store.get_item(&keys::plot_pk(&plot_id), THRESHOLDS_SK).await? {
        Some(item) => PlotThresholds::from_item(&plot_id, &item),
        None => PlotThresholds::disabled(&plot_id),
    };

    if let Some(enabled) = body.enabled {
        thresholds.enabled = enabled;
    }
    for (metric, bounds) in body.bounds() {
        if let Some(bounds) = bounds {
            thresholds.bounds.set(metric, bounds);
        }
    }

    let item = thresholds.to_item();
    store.put_item(item.clone()).await?;
    info!(%plot_id, enabled = thresholds.enabled, "Thresholds updated");

    Ok(Json(json!({
        "message": "Thresholds updated successfully",
        "thresholds": item_to_json(&item),
    })))
}

/// Newest items of a plot under one sort-key prefix.
async fn newest(
    store: &dyn ItemStore,
    plot_id: &str,
    prefix: &str,
    limit: usize,
) -> ApiResult<Vec<Value>> {
    // ---
    let query = KeyQuery::partition(keys::plot_pk(plot_id))
        .begins_with(prefix)
        .newest_first()
        .limit(limit);
    Ok(store.query(&query).await?.iter().map(item_to_json).collect())
}

async fn latest_state(
    State((store, _)): State<AppState>,
    Path(plot_id): Path<String>,
) -> ApiResult<Json<Value>> {
    // ---
    newest(store.as_ref(), &plot_id, STATE_PREFIX, 1)
        .await?
        .into_iter()
        .next()
        .map(Json)
        .ok_or(ApiError::NotFound("No state found for plot"))
}

/// Sort-key range for a history request. Both dates are inclusive prefixes:
/// `end_date=2025-06-01` covers every reading of that day.
fn history_query(plot_id: &str, params: &HistoryParams) -> ApiResult<KeyQuery> {
    // ---
    let query = KeyQuery::partition(keys::plot_pk(plot_id));
    match (params.start_date.as_deref(), params.end_date.as_deref()) {
        (None, None) => Ok(query.begins_with(STATE_PREFIX)),
        (start, end) => {
            let low = format!("{STATE_PREFIX}{}", start.unwrap_or_default());
            let high = format!("{STATE_PREFIX}{}{RANGE_END}", end.unwrap_or_default());
            if low > high {
                return Err(ApiError::BadRequest("start_date must not be after end_date"));
            }
            Ok(query.between(low, high))
        }
    }
}

/// Readings of a plot in the requested range, newest first.
async fn fetch_history(
    store: &dyn ItemStore,
    history_limit: u32,
    plot_id: &str,
    params: &HistoryParams,
) -> ApiResult<Vec<Value>> {
    // ---
    let limit = params.limit.unwrap_or(history_limit as usize);
    let query = history_query(plot_id, params)?.newest_first().limit(limit);

    let history: Vec<Value> = store.query(&query).await?.iter().map(item_to_json).collect();
    debug!(%plot_id, count = history.len(), "History fetched");
    Ok(history)
}

async fn history(
    State((store, config)): State<AppState>,
    Path(plot_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Value>> {
    // ---
    let history = fetch_history(store.as_ref(), config.history_limit, &plot_id, &params).await?;
    Ok(Json(json!({ "plot_id": plot_id, "count": history.len(), "history": history })))
}

async fn history_list(
    State((store, config)): State<AppState>,
    Path(plot_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Vec<Value>>> {
    let history = fetch_history(store.as_ref(), config.history_limit, &plot_id, &params).await?;
    Ok(Json(history))
}

async fn irrigations(
    State((store, config)): State<AppState>,
    Path(plot_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Value>> {
    // ---
    let limit = params.limit.unwrap_or(config.history_limit as usize);
    let irrigations = newest(store.as_ref(), &plot_id, EVENT_PREFIX, limit).await?;

    Ok(Json(json!({
        "plot_id": plot_id,
        "count": irrigations.len(),
        "irrigations": irrigations,
    })))
}

async fn last_irrigation(
    State((store, _)): State<AppState>,
    Path(plot_id): Path<String>,
) -> ApiResult<Json<Value>> {
    // ---
    newest(store.as_ref(), &plot_id, EVENT_PREFIX, 1)
        .await?
        .into_iter()
        .next()
        .map(Json)
        .ok_or(ApiError::NotFound("No irrigation found for plot"))
}
