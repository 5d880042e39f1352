//! Facility-scoped recipient resolution.
//!
//! Recipients come from the facility's responsibles record
//! (`FACILITY#<id>` / `RESPONSIBLES`). Lookup failures resolve to an empty
//! list so the caller can skip publishing without failing the record.

use std::collections::HashSet;

use tracing::{error, info, warn};

use crate::keys;
use crate::store::attrs::string_entries;
use crate::store::{AttributeValue, Item, ItemStore};

/// Attribute holding the responsible emails.
pub const RESPONSIBLES_ATTR: &str = "responsibles";

// ---

/// Trim, drop blanks and dedupe (case-insensitively, first spelling kept).
pub fn normalize_emails<I, S>(emails: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    // ---
    let mut seen = HashSet::new();
    emails
        .into_iter()
        .filter_map(|e| {
            let trimmed = e.as_ref().trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .filter(|e| seen.insert(e.to_lowercase()))
        .collect()
}

/// Emails stored on a responsibles item.
///
/// Accepts a list, a string set, or the legacy comma-separated string.
/// Any other type yields an empty list.
pub fn emails_from_record(item: &Item) -> Vec<String> {
    // ---
    let Some(raw) = item.get(RESPONSIBLES_ATTR) else {
        return Vec::new();
    };

    match string_entries(raw) {
        Some(entries) => normalize_emails(entries),
        None => {
            warn!(value = ?raw, "responsibles attribute is not a list or string");
            Vec::new()
        }
    }
}

/// Build the responsibles item for a facility.
pub fn responsibles_item(facility_id: &str, emails: &[String]) -> Item {
    Item::from([
        (keys::PK.to_string(), AttributeValue::S(keys::facility_pk(facility_id))),
        (keys::SK.to_string(), AttributeValue::S(keys::RESPONSIBLES_SK.to_string())),
        ("facility_id".to_string(), AttributeValue::S(facility_id.to_string())),
        (
            RESPONSIBLES_ATTR.to_string(),
            AttributeValue::L(emails.iter().cloned().map(AttributeValue::S).collect()),
        ),
    ])
}

/// Resolve the alert recipients of a facility.
pub async fn fetch_responsible_emails(
    store: &dyn ItemStore,
    business_id: Option<&str>,
    facility_id: Option<&str>,
) -> Vec<String> {
    // ---
    let Some(facility_id) = facility_id else {
        warn!(?business_id, "Missing facility_id for responsible lookup");
        return Vec::new();
    };

    let record = match store
        .get_item(&keys::facility_pk(facility_id), keys::RESPONSIBLES_SK)
        .await
    {
        Ok(Some(record)) => record,
        Ok(None) => {
            info!(facility_id, "No responsible record found");
            return Vec::new();
        }
        Err(e) => {
            error!(facility_id, error = %e, "Failed to fetch responsibles");
            return Vec::new();
        }
    };

    let emails = emails_from_record(&record);
    info!(facility_id, count = emails.len(), "Found responsible(s)");
    emails
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::attrs::s;
    use crate::store::MemoryStore;

    fn record(value: AttributeValue) -> Item {
        Item::from([(RESPONSIBLES_ATTR.to_string(), value)])
    }

    #[test]
    fn csv_string_drops_blanks() {
        let item = record(s("a@x.com, ,b@x.com"));
        assert_eq!(emails_from_record(&item), vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn list_is_deduplicated_case_insensitively() {
        // ---
        let item = record(AttributeValue::L(vec![
            s("Ops@Farm.io"),
            s("ops@farm.io"),
            s("  "),
            s("grower@farm.io"),
        ]));
        assert_eq!(emails_from_record(&item), vec!["Ops@Farm.io", "grower@farm.io"]);
    }

    #[test]
    fn unexpected_type_yields_nothing() {
        assert!(emails_from_record(&record(AttributeValue::Bool(true))).is_empty());
        assert!(emails_from_record(&Item::new()).is_empty());
    }

    #[tokio::test]
    async fn resolves_from_facility_record() {
        // ---
        let store = MemoryStore::new();
        store
            .put_item(responsibles_item("f-1", &["ops@farm.io".to_string()]))
            .await
            .unwrap();

        assert_eq!(
            fetch_responsible_emails(&store, None, Some("f-1")).await,
            vec!["ops@farm.io"]
        );
        assert!(fetch_responsible_emails(&store, None, Some("f-2")).await.is_empty());
        assert!(fetch_responsible_emails(&store, Some("b-1"), None).await.is_empty());
    }
}
