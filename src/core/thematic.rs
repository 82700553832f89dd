//! Thematic road objects (speed limits, tolls, ...) placed on trace-level link sequences

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::core::position::LinkSequenceId;

/// One placement of a thematic object on a link sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThematicRecord {
    pub record_id: u64,
    pub version: u32,
    pub object_type: Option<u32>,
    pub link_sequence_id: LinkSequenceId,
    pub start_offset: f64,
    pub end_offset: f64,
    /// Property values by property name
    pub properties: BTreeMap<String, serde_json::Value>,
    /// WKT geometry of the object, when provided
    pub geometry: Option<String>,
}

/// One page of an object query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObjectPage {
    #[serde(rename = "objekter", default)]
    pub objects: Vec<RawObject>,
    #[serde(default)]
    pub metadata: Option<RawPageMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPageMetadata {
    #[serde(rename = "returnert")]
    pub returned: Option<usize>,
    #[serde(rename = "neste")]
    pub next: Option<RawNextPage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNextPage {
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObject {
    pub id: Option<u64>,
    #[serde(default)]
    pub metadata: Option<RawObjectMetadata>,
    #[serde(rename = "egenskaper", default)]
    pub properties: Vec<RawProperty>,
    #[serde(rename = "geometri", default)]
    pub geometry: Option<RawGeometry>,
    #[serde(rename = "lokasjon", default)]
    pub location: Option<RawLocation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObjectMetadata {
    #[serde(rename = "versjon")]
    pub version: Option<u32>,
    #[serde(rename = "type")]
    pub object_type: Option<RawObjectType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObjectType {
    pub id: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProperty {
    #[serde(rename = "navn")]
    pub name: Option<String>,
    #[serde(rename = "verdi", default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGeometry {
    pub wkt: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLocation {
    #[serde(rename = "stedfestinger", default)]
    pub placements: Vec<RawPlacement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlacement {
    #[serde(rename = "veglenkesekvensid")]
    pub link_sequence_id: Option<LinkSequenceId>,
    #[serde(rename = "startposisjon")]
    pub start: Option<f64>,
    #[serde(rename = "sluttposisjon")]
    pub end: Option<f64>,
    /// Point placements carry a single position
    #[serde(rename = "relativPosisjon")]
    pub position: Option<f64>,
}

impl RawObjectPage {
    /// Link to the next page, or `None` when this page was the last one
    pub fn next_href(&self) -> Option<&str> {
        let metadata = self.metadata.as_ref()?;
        if metadata.returned.unwrap_or(self.objects.len()) == 0 {
            return None;
        }
        metadata.next.as_ref()?.href.as_deref()
    }
}

impl RawObject {
    /// Flatten the object into one record per placement
    pub fn into_records(self) -> Result<Vec<ThematicRecord>> {
        let record_id = self.id.ok_or_else(|| {
            Error::ValidationError("thematic object without 'id'".to_string())
        })?;
        let metadata = self.metadata.unwrap_or_default();
        let version = metadata.version.ok_or_else(|| {
            Error::ValidationError(format!("thematic object {record_id} without 'versjon'"))
        })?;
        let object_type = metadata.object_type.and_then(|t| t.id);

        let properties: BTreeMap<String, serde_json::Value> = self
            .properties
            .into_iter()
            .filter_map(|p| p.name.map(|name| (name, p.value)))
            .collect();
        let geometry = self.geometry.and_then(|g| g.wkt);

        let mut records = Vec::new();
        for placement in self.location.unwrap_or_default().placements {
            let link_sequence_id = placement.link_sequence_id.ok_or_else(|| {
                Error::ValidationError(format!(
                    "thematic object {record_id} has a placement without 'veglenkesekvensid'"
                ))
            })?;
            let (start_offset, end_offset) = match (placement.start, placement.end, placement.position) {
                (Some(start), Some(end), _) => (start, end),
                (_, _, Some(position)) => (position, position),
                _ => {
                    return Err(Error::ValidationError(format!(
                        "thematic object {record_id} has a placement on {link_sequence_id} without offsets"
                    )))
                }
            };
            records.push(ThematicRecord {
                record_id,
                version,
                object_type,
                link_sequence_id,
                start_offset,
                end_offset,
                properties: properties.clone(),
                geometry: geometry.clone(),
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(json: serde_json::Value) -> RawObjectPage {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_object_flattens_per_placement() {
        let p = page(serde_json::json!({
            "objekter": [{
                "id": 85288328,
                "metadata": { "versjon": 3, "type": { "id": 105, "navn": "Fartsgrense" } },
                "egenskaper": [ { "id": 2021, "navn": "Fartsgrense", "verdi": 50 } ],
                "geometri": { "wkt": "LINESTRING Z(1 2 3, 4 5 6)" },
                "lokasjon": { "stedfestinger": [
                    { "veglenkesekvensid": 625517, "startposisjon": 0.0, "sluttposisjon": 0.4 },
                    { "veglenkesekvensid": 625518, "startposisjon": 0.1, "sluttposisjon": 1.0 }
                ]}
            }],
            "metadata": { "returnert": 1, "neste": { "href": "https://example/next" } }
        }));

        assert_eq!(p.next_href(), Some("https://example/next"));
        let records = p.objects.into_iter().next().unwrap().into_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_id, 85288328);
        assert_eq!(records[0].version, 3);
        assert_eq!(records[0].object_type, Some(105));
        assert_eq!(records[1].link_sequence_id, 625518);
        assert_eq!(records[1].start_offset, 0.1);
        assert_eq!(records[0].properties["Fartsgrense"], serde_json::json!(50));
        assert_eq!(records[0].geometry.as_deref(), Some("LINESTRING Z(1 2 3, 4 5 6)"));
    }

    #[test]
    fn test_empty_page_has_no_next() {
        let p = page(serde_json::json!({
            "objekter": [],
            "metadata": { "returnert": 0, "neste": { "href": "https://example/next" } }
        }));
        assert_eq!(p.next_href(), None);
    }

    #[test]
    fn test_object_without_version_is_rejected() {
        let p = page(serde_json::json!({ "objekter": [{ "id": 1 }] }));
        let err = p.objects.into_iter().next().unwrap().into_records().unwrap_err();
        assert!(err.to_string().contains("versjon"));
    }
}
