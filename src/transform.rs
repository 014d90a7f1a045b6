//! Flattening the feed into table rows.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use lambda_runtime::tracing;
use serde::{Deserialize, Serialize};

use crate::{
    error::TransformError,
    feed::{FirstApproach, RawFeedPayload},
};

/// One near-earth object's first close approach on the query date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AsteroidRecord {
    pub asteroid_id: String,
    pub name: String,
    pub absolute_magnitude_h: f64,
    pub estimated_diameter_min_km: f64,
    pub estimated_diameter_max_km: f64,
    pub is_potentially_hazardous: bool,
    pub close_approach_date: String,
    pub relative_velocity_km_s: f64,
    pub miss_distance_km: f64,
    pub orbiting_body: String,
    pub ingestion_timestamp: String,
}

/// Flatten the objects for `date`, stamping them with the current time.
pub fn transform_records(
    payload: &RawFeedPayload,
    date: NaiveDate,
) -> Result<Vec<AsteroidRecord>, TransformError> {
    transform_records_at(payload, date, Utc::now())
}

/// Flatten the objects for `date`, stamping every record with `ingested_at`.
///
/// Objects without any close-approach entries are dropped. Otherwise only the
/// first entry is used, and the input order is preserved.
pub fn transform_records_at(
    payload: &RawFeedPayload,
    date: NaiveDate,
    ingested_at: DateTime<Utc>,
) -> Result<Vec<AsteroidRecord>, TransformError> {
    let ingestion_timestamp = ingested_at.to_rfc3339_opts(SecondsFormat::Micros, true);

    let records: Vec<_> = payload
        .first_approaches(date)?
        .into_iter()
        .map(|FirstApproach { object, approach }| {
            let km = object.estimated_diameter.kilometers;

            AsteroidRecord {
                asteroid_id: object.neo_reference_id,
                name: object.name,
                absolute_magnitude_h: object.absolute_magnitude_h,
                estimated_diameter_min_km: km.estimated_diameter_min,
                estimated_diameter_max_km: km.estimated_diameter_max,
                is_potentially_hazardous: object.is_potentially_hazardous_asteroid,
                close_approach_date: approach.close_approach_date,
                relative_velocity_km_s: approach.relative_velocity.kilometers_per_second,
                miss_distance_km: approach.miss_distance.kilometers,
                orbiting_body: approach.orbiting_body,
                ingestion_timestamp: ingestion_timestamp.clone(),
            }
        })
        .collect();

    tracing::info!("transformed {} records", records.len());
    Ok(records)
}
