//! Threshold lookup and facility resolution for a plot.
//!
//! Every step here is best-effort: store failures are logged and read as
//! "nothing found", never propagated to the batch.

use tracing::{error, info, warn};

use crate::keys;
use crate::models::{PlotThresholds, SensorReading};
use crate::store::attrs::first_string;
use crate::store::{AttrFilter, ItemStore};

// ---

/// Where a facility id was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilitySource {
    /// `FacilityId` / `facility_id` on the reading itself.
    Reading,
    /// `GSI_PK = FACILITY#<id>` on the reading.
    IndexKey,
    /// `facility_id` on the plot's thresholds record.
    Thresholds,
    /// Plot metadata found through the type index.
    PlotMetadata,
}

impl FacilitySource {
    /// Resolution order; the first strategy yielding an id wins.
    pub const ORDER: [FacilitySource; 4] = [
        FacilitySource::Reading,
        FacilitySource::IndexKey,
        FacilitySource::Thresholds,
        FacilitySource::PlotMetadata,
    ];
}

/// Outcome of the facility resolution chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilityResolution {
    Resolved {
        facility_id: String,
        source: FacilitySource,
    },
    Unresolved,
}

impl FacilityResolution {
    pub fn facility_id(&self) -> Option<&str> {
        match self {
            FacilityResolution::Resolved { facility_id, .. } => Some(facility_id),
            FacilityResolution::Unresolved => None,
        }
    }
}

/// Fetch the plot's own thresholds record (`PLOT#<id>` / `THRESHOLDS`).
pub async fn fetch_plot_thresholds(
    store: &dyn ItemStore,
    plot_id: &str,
) -> Option<PlotThresholds> {
    // ---
    match store
        .get_item(&keys::plot_pk(plot_id), keys::THRESHOLDS_SK)
        .await
    {
        Ok(Some(item)) => {
            info!(plot_id, "Found plot thresholds");
            Some(PlotThresholds::from_item(plot_id, &item))
        }
        Ok(None) => None,
        Err(e) => {
            error!(plot_id, error = %e, "Failed to fetch plot thresholds");
            None
        }
    }
}

/// Resolve the facility a reading belongs to.
///
/// Walks [`FacilitySource::ORDER`] and stops at the first hit. Only the last
/// strategy touches the store.
pub async fn resolve_facility(
    store: &dyn ItemStore,
    reading: &SensorReading,
    thresholds: Option<&PlotThresholds>,
) -> FacilityResolution {
    // ---
    for source in FacilitySource::ORDER {
        let found = match source {
            FacilitySource::Reading => reading.facility_id.clone(),
            FacilitySource::IndexKey => reading.index_facility_id.clone(),
            FacilitySource::Thresholds => thresholds.and_then(|t| t.facility_id.clone()),
            FacilitySource::PlotMetadata => {
                warn!(
                    plot_id = %reading.plot_id,
                    "facility_id not found on reading, fetching plot metadata"
                );
                facility_from_plot_metadata(store, &reading.plot_id).await
            }
        };

        if let Some(facility_id) = found {
            if source != FacilitySource::Reading {
                info!(plot_id = %reading.plot_id, %facility_id, ?source, "Resolved facility_id");
            }
            return FacilityResolution::Resolved {
                facility_id,
                source,
            };
        }
    }

    warn!(plot_id = %reading.plot_id, "Unable to resolve facility_id");
    FacilityResolution::Unresolved
}

async fn facility_from_plot_metadata(store: &dyn ItemStore, plot_id: &str) -> Option<String> {
    // ---
    let filter = AttrFilter::eq("plot_id", plot_id);
    match store.query_type_index("PLOT", Some(&filter), Some(1)).await {
        Ok(items) => items
            .first()
            .and_then(|item| first_string(item, &["facility_id", "FacilityId"])),
        Err(e) => {
            error!(plot_id, error = %e, "Failed to fetch plot metadata by id");
            None
        }
    }
}

/// Display name of a facility for alert bodies.
pub async fn facility_display_name(store: &dyn ItemStore, facility_id: Option<&str>) -> String {
    // ---
    let Some(facility_id) = facility_id else {
        return "Unknown Facility".to_string();
    };

    match store
        .get_item(&keys::facility_pk(facility_id), keys::METADATA_SK)
        .await
    {
        Ok(Some(item)) => {
            if let Some(name) = first_string(&item, &["name"]) {
                return name;
            }
        }
        Ok(None) => {}
        Err(e) => error!(facility_id, error = %e, "Failed to fetch facility name"),
    }

    format!("Facility {}", keys::short_id(facility_id))
}
