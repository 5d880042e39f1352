//! Species profiles and their assignment to plots.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::{ApiError, ApiResult, AppState};
use crate::keys::{self, METADATA_SK};
use crate::models::{Bounds, Metric, MetricBounds};
use crate::store::attrs::{self, item_to_json};
use crate::store::Item;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/species", get(list_species).post(create_species))
        .route("/species/{species_id}", delete(delete_species))
        .route(
            "/species/{species_id}/assign-to-plot/{plot_id}",
            put(assign_to_plot),
        )
}

/// A new profile; bounds are optional and become the default thresholds of
/// plots created with this species.
#[derive(Debug, Deserialize)]
struct SpeciesCreate {
    name: String,
    temperature: Option<MetricBounds>,
    humidity: Option<MetricBounds>,
    light: Option<MetricBounds>,
    irrigation: Option<MetricBounds>,
}

impl SpeciesCreate {
    fn bounds(&self) -> Option<Bounds> {
        // ---
        let given = [
            (Metric::Temperature, self.temperature),
            (Metric::Humidity, self.humidity),
            (Metric::Light, self.light),
            (Metric::Irrigation, self.irrigation),
        ];
        if given.iter().all(|(_, b)| b.is_none()) {
            return None;
        }

        let mut bounds = Bounds::default();
        for (metric, value) in given {
            if let Some(value) = value {
                bounds.set(metric, value);
            }
        }
        Some(bounds)
    }
}

#[derive(Debug, Deserialize)]
struct AssignParams {
    facility_id: String,
}

async fn list_species(State((store, _)): State<AppState>) -> ApiResult<Json<Value>> {
    // ---
    let species: Vec<Value> = store
        .query_type_index("SPECIES", None, None)
        .await?
        .iter()
        .map(item_to_json)
        .collect();

    Ok(Json(json!({ "count": species.len(), "species": species })))
}

async fn create_species(
    State((store, _)): State<AppState>,
    Json(body): Json<SpeciesCreate>,
) -> ApiResult<Json<Value>> {
    // ---
    let species_id = Uuid::new_v4().to_string();
    let mut item = Item::from([
        (keys::PK.to_string(), attrs::s(keys::species_pk(&species_id))),
        (keys::SK.to_string(), attrs::s(METADATA_SK)),
        ("species_id".to_string(), attrs::s(&species_id)),
        ("name".to_string(), attrs::s(&body.name)),
        (keys::TYPE_ATTR.to_string(), attrs::s("SPECIES")),
    ]);
    if let Some(bounds) = body.bounds() {
        bounds.write_into(&mut item);
    }

    store.put_item(item.clone()).await?;
    info!(%species_id, name = %body.name, "Species created");

    Ok(Json(json!({
        "message": "Species created successfully",
        "created_species": item_to_json(&item),
    })))
}

async fn delete_species(
    State((store, _)): State<AppState>,
    Path(species_id): Path<String>,
) -> ApiResult<Json<Value>> {
    // ---
    let pk = keys::species_pk(&species_id);
    store
        .get_item(&pk, METADATA_SK)
        .await?
        .ok_or(ApiError::NotFound("Species not found"))?;

    store.delete_item(&pk, METADATA_SK).await?;
    info!(%species_id, "Species deleted");

    Ok(Json(json!({ "message": format!("Species {species_id} deleted successfully") })))
}

/// Link a species to an existing plot of the given facility.
async fn assign_to_plot(
    State((store, _)): State<AppState>,
    Path((species_id, plot_id)): Path<(String, String)>,
    Query(params): Query<AssignParams>,
) -> ApiResult<Json<Value>> {
    // ---
    let species_key = keys::species_pk(&species_id);
    store
        .get_item(&species_key, METADATA_SK)
        .await?
        .ok_or(ApiError::NotFound("Species not found"))?;

    store
        .get_item(&keys::facility_pk(&params.facility_id), &keys::plot_sk(&plot_id))
        .await?
        .ok_or(ApiError::NotFound("Plot not found or does not exist"))?;

    let link = Item::from([
        (keys::PK.to_string(), attrs::s(keys::plot_pk(&plot_id))),
        (keys::SK.to_string(), attrs::s(&species_key)),
        ("specie".to_string(), attrs::s(&species_key)),
        (keys::TYPE_ATTR.to_string(), attrs::s("PLOT_SPECIES")),
    ]);
    store.put_item(link).await?;
    info!(%species_id, %plot_id, "Species assigned to plot");

    Ok(Json(json!({
        "message": format!("Species {species_id} assigned to plot {plot_id} successfully")
    })))
}
