//! The NeoWs feed payload.
//!
//! The payload is kept as an untyped JSON value so that it can be archived
//! byte-for-byte as the API returned it. The objects for the date that we
//! actually ingest are then pulled out into the typed structures below; the
//! API is inconsistent about whether it sends numbers or numeric strings, so
//! every float accepts both.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use crate::error::TransformError;

/// The decoded response body for one feed request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawFeedPayload(pub Value);

#[derive(Deserialize)]
struct FeedEnvelope {
    near_earth_objects: Map<String, Value>,
}

/// Just the close-approach list of an object, left undecoded so that nothing
/// else about the object is looked at before we know it will be used.
#[derive(Deserialize)]
struct ApproachList {
    close_approach_data: Vec<Value>,
}

/// The per-object fields that end up in a row. Close-approach entries are
/// decoded separately, see [`CloseApproach`].
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct NeoObject {
    pub neo_reference_id: String,
    pub name: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub absolute_magnitude_h: f64,
    pub estimated_diameter: EstimatedDiameter,
    pub is_potentially_hazardous_asteroid: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EstimatedDiameter {
    pub kilometers: DiameterRange,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct DiameterRange {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub estimated_diameter_min: f64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub estimated_diameter_max: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CloseApproach {
    pub close_approach_date: String,
    pub relative_velocity: RelativeVelocity,
    pub miss_distance: MissDistance,
    pub orbiting_body: String,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct RelativeVelocity {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub kilometers_per_second: f64,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct MissDistance {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub kilometers: f64,
}

/// An object together with its first close approach.
#[derive(Clone, Debug)]
pub struct FirstApproach {
    pub object: NeoObject,
    pub approach: CloseApproach,
}

impl RawFeedPayload {
    /// Get the undecoded near-earth objects listed under `date`.
    ///
    /// A date that doesn't appear in the feed at all yields an empty list.
    pub fn objects_for(&self, date: NaiveDate) -> Result<Vec<Value>, TransformError> {
        let mut envelope =
            FeedEnvelope::deserialize(&self.0).map_err(TransformError::Payload)?;
        let date = date.to_string();

        match envelope.near_earth_objects.remove(&date) {
            Some(Value::Array(objects)) => Ok(objects),
            Some(other) => Err(TransformError::Payload(serde::de::Error::custom(format!(
                "expected a list of objects for {date}, got {other}"
            )))),
            None => Ok(Vec::new()),
        }
    }

    /// Decode the objects listed under `date` along with their first close
    /// approach, in feed order.
    ///
    /// Objects with no close approaches are skipped without decoding anything
    /// else about them, and entries after the first are never looked at.
    /// Everything that is decoded must be well-formed.
    pub fn first_approaches(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<FirstApproach>, TransformError> {
        let mut decoded = Vec::new();

        for (index, obj) in self.objects_for(date)?.into_iter().enumerate() {
            let object_error = |source: serde_json::Error| TransformError::Object {
                date: date.to_string(),
                index,
                source,
            };

            let approaches = ApproachList::deserialize(&obj).map_err(object_error)?;

            let Some(first) = approaches.close_approach_data.into_iter().next() else {
                continue;
            };

            decoded.push(FirstApproach {
                object: NeoObject::deserialize(obj).map_err(object_error)?,
                approach: CloseApproach::deserialize(first).map_err(object_error)?,
            });
        }

        Ok(decoded)
    }
}
