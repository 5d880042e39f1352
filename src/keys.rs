//! Single-table key conventions.
//!
//! Every entity lives in one DynamoDB table and is told apart by the prefix
//! of its `pk`/`sk` values, e.g. `PLOT#<id>` + `STATE#<timestamp>`.

// ---

pub const PK: &str = "pk";
pub const SK: &str = "sk";

pub const PLOT_PREFIX: &str = "PLOT#";
pub const FACILITY_PREFIX: &str = "FACILITY#";
pub const SPECIES_PREFIX: &str = "SPECIES#";
pub const STATE_PREFIX: &str = "STATE#";
pub const EVENT_PREFIX: &str = "EVENT#";
pub const DATA_PREFIX: &str = "DATA#";
pub const TIMESTAMP_PREFIX: &str = "TIMESTAMP#";

pub const METADATA_SK: &str = "Metadata";
pub const THRESHOLDS_SK: &str = "THRESHOLDS";
pub const RESPONSIBLES_SK: &str = "RESPONSIBLES";

/// Secondary index partitioned on the `type` attribute.
pub const TYPE_INDEX: &str = "GSI_TypeIndex";
pub const TYPE_ATTR: &str = "type";
pub const GSI_PK: &str = "GSI_PK";
pub const GSI_SK: &str = "GSI_SK";

/// Placeholder written to `GSI_PK` when ingestion cannot place a reading.
pub const UNKNOWN_ID: &str = "UNKNOWN";

pub fn plot_pk(plot_id: &str) -> String {
    format!("{PLOT_PREFIX}{plot_id}")
}

pub fn facility_pk(facility_id: &str) -> String {
    format!("{FACILITY_PREFIX}{facility_id}")
}

pub fn species_pk(species_id: &str) -> String {
    format!("{SPECIES_PREFIX}{species_id}")
}

pub fn plot_sk(plot_id: &str) -> String {
    format!("{PLOT_PREFIX}{plot_id}")
}

pub fn state_sk(timestamp: &str) -> String {
    format!("{STATE_PREFIX}{timestamp}")
}

pub fn event_sk(timestamp: &str) -> String {
    format!("{EVENT_PREFIX}{timestamp}")
}

/// Return the id after `prefix`, or `None` when the key has another prefix
/// or nothing follows it.
pub fn strip_entity<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}

/// Return whatever follows the first `#`, or the whole key when there is none.
pub fn key_suffix(key: &str) -> &str {
    key.split_once('#').map_or(key, |(_, rest)| rest)
}

/// First eight characters of an id, used for short display names.
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn builds_prefixed_keys() {
        assert_eq!(plot_pk("p1"), "PLOT#p1");
        assert_eq!(facility_pk("f1"), "FACILITY#f1");
        assert_eq!(state_sk("2025-01-01T00:00:00Z"), "STATE#2025-01-01T00:00:00Z");
    }

    #[test]
    fn strips_only_matching_prefix() {
        // ---
        assert_eq!(strip_entity("FACILITY#abc", FACILITY_PREFIX), Some("abc"));
        assert_eq!(strip_entity("PLOT#abc", FACILITY_PREFIX), None);
        assert_eq!(strip_entity("FACILITY#", FACILITY_PREFIX), None);
    }

    #[test]
    fn suffix_keeps_later_hashes() {
        assert_eq!(key_suffix("STATE#2025#x"), "2025#x");
        assert_eq!(key_suffix("THRESHOLDS"), "THRESHOLDS");
    }

    #[test]
    fn short_id_is_char_safe() {
        assert_eq!(short_id("0123456789"), "01234567");
        assert_eq!(short_id("ñandú"), "ñandú");
    }
}
