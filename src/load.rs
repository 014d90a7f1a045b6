//! Loading rows into the DynamoDB table.
//!
//! DynamoDB's `BatchWriteItem` is as close as we get to a streaming insert: it
//! appends, it doesn't roll anything back, and it reports the items that it
//! didn't get to as "unprocessed" rather than failing. We treat those as
//! per-row errors. They get logged and returned to the caller as a
//! [`LoadOutcome::Partial`], but the step as a whole still succeeds.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use lambda_runtime::tracing;
use std::collections::HashMap;

use crate::{
    config::EtlConfig,
    error::{BoxError, EtlError},
    transform::AsteroidRecord,
};

/// The most put requests that DynamoDB accepts in one `BatchWriteItem`.
pub const MAX_BATCH_ITEMS: usize = 25;

/// The table's sort key attribute; the partition key is `asteroid_id`.
pub const ROW_KEY_ATTR: &str = "row_key";

/// One row that the table service did not accept.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RowError {
    pub asteroid_id: String,
    pub reason: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadOutcome {
    /// There was nothing to insert, so the table wasn't touched.
    Skipped,

    /// Every row was accepted.
    Inserted(usize),

    /// Some rows were rejected.
    Partial {
        attempted: usize,
        errors: Vec<RowError>,
    },
}

/// An append-only table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Append `rows` to `table`, returning any per-row failures. Failure of
    /// the request as a whole is an `Err`.
    async fn insert_rows(
        &self,
        table: &str,
        rows: &[AsteroidRecord],
    ) -> Result<Vec<RowError>, BoxError>;
}

#[derive(Clone, Debug)]
pub struct DynamoRowSink {
    dc: aws_sdk_dynamodb::Client,
}

impl DynamoRowSink {
    pub fn new(dc: aws_sdk_dynamodb::Client) -> Self {
        DynamoRowSink { dc }
    }
}

#[async_trait]
impl RowSink for DynamoRowSink {
    async fn insert_rows(
        &self,
        table: &str,
        rows: &[AsteroidRecord],
    ) -> Result<Vec<RowError>, BoxError> {
        let mut errors = Vec::new();

        for (i_chunk, chunk) in rows.chunks(MAX_BATCH_ITEMS).enumerate() {
            match self.write_chunk(table, chunk, i_chunk * MAX_BATCH_ITEMS).await {
                Ok(chunk_errors) => errors.extend(chunk_errors),

                Err(e) => {
                    // Earlier chunks are already in the table.
                    log_row_errors(&errors);
                    return Err(e);
                }
            }
        }

        Ok(errors)
    }
}

impl DynamoRowSink {
    async fn write_chunk(
        &self,
        table: &str,
        chunk: &[AsteroidRecord],
        first_position: usize,
    ) -> Result<Vec<RowError>, BoxError> {
        let result = self
            .dc
            .batch_write_item()
            .request_items(table, write_requests(chunk, first_position)?)
            .send()
            .await?;

        Ok(result
            .unprocessed_items()
            .map(|unprocessed| unprocessed_row_errors(unprocessed).collect())
            .unwrap_or_default())
    }
}

/// Build the put requests for `rows`, the first of which sits at
/// `first_position` within the whole batch.
///
/// Besides the record's own columns, each item gets a `row_key` of
/// `<ingestion_timestamp>#<position>`, which is the table's sort key. Every
/// row of a batch therefore has a distinct key, even if the feed lists the
/// same object twice, and a later run never overwrites an earlier one.
fn write_requests(
    rows: &[AsteroidRecord],
    first_position: usize,
) -> Result<Vec<WriteRequest>, BoxError> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let mut item: HashMap<String, AttributeValue> = serde_dynamo::to_item(row)?;
            item.insert(
                ROW_KEY_ATTR.to_owned(),
                AttributeValue::S(format!(
                    "{}#{}",
                    row.ingestion_timestamp,
                    first_position + i
                )),
            );
            let put = PutRequest::builder().set_item(Some(item)).build()?;
            Ok(WriteRequest::builder().put_request(put).build())
        })
        .collect()
}

fn unprocessed_row_errors(
    unprocessed: &HashMap<String, Vec<WriteRequest>>,
) -> impl Iterator<Item = RowError> + '_ {
    unprocessed
        .values()
        .flatten()
        .filter_map(|req| req.put_request())
        .map(|put| RowError {
            asteroid_id: put
                .item()
                .get("asteroid_id")
                .and_then(|v| v.as_s().ok())
                .cloned()
                .unwrap_or_else(|| "<unknown>".to_owned()),
            reason: "left unprocessed by BatchWriteItem".to_owned(),
        })
}

fn log_row_errors(errors: &[RowError]) {
    for e in errors {
        tracing::warn!(asteroid_id = %e.asteroid_id, "row insert error: {}", e.reason);
    }
}

/// Append the records to the configured table.
///
/// An empty batch never reaches the table.
pub async fn load_records<S: RowSink + ?Sized>(
    sink: &S,
    config: &EtlConfig,
    records: &[AsteroidRecord],
) -> Result<LoadOutcome, EtlError> {
    if records.is_empty() {
        return Ok(LoadOutcome::Skipped);
    }

    let table = config.table_id();

    let errors = sink
        .insert_rows(&table, records)
        .await
        .map_err(|source| EtlError::Load {
            table: table.clone(),
            source,
        })?;

    if errors.is_empty() {
        tracing::info!("inserted {} rows into {}", records.len(), table);
        return Ok(LoadOutcome::Inserted(records.len()));
    }

    tracing::warn!(
        "{} of {} rows were not inserted into {}",
        errors.len(),
        records.len(),
        table
    );

    log_row_errors(&errors);

    Ok(LoadOutcome::Partial {
        attempted: records.len(),
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::tests::{example_date, example_payload};
    use crate::transform::transform_records;

    fn records(n: usize) -> Vec<AsteroidRecord> {
        let base = transform_records(&example_payload(), example_date()).unwrap();

        (0..n)
            .map(|i| AsteroidRecord {
                asteroid_id: format!("{}", 3000000 + i),
                ..base[0].clone()
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_batch_is_not_sent() {
        let mut sink = MockRowSink::new();
        sink.expect_insert_rows().never();

        let outcome = load_records(&sink, &EtlConfig::for_tests(), &[])
            .await
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Skipped);
    }

    #[tokio::test]
    async fn batch_goes_to_the_qualified_table() {
        let mut sink = MockRowSink::new();
        sink.expect_insert_rows()
            .withf(|table, rows| table == "astro.nasa_neo.raw_neo_feed" && rows.len() == 3)
            .times(1)
            .returning(|_, _| Ok(Vec::new()));

        let outcome = load_records(&sink, &EtlConfig::for_tests(), &records(3))
            .await
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Inserted(3));
    }

    #[tokio::test]
    async fn row_errors_do_not_fail_the_load() {
        let mut sink = MockRowSink::new();
        sink.expect_insert_rows().times(1).returning(|_, rows| {
            Ok(vec![RowError {
                asteroid_id: rows[1].asteroid_id.clone(),
                reason: "throttled".to_owned(),
            }])
        });

        let outcome = load_records(&sink, &EtlConfig::for_tests(), &records(2))
            .await
            .unwrap();

        match outcome {
            LoadOutcome::Partial { attempted, errors } => {
                assert_eq!(attempted, 2);
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].asteroid_id, "3000001");
            }
            other => panic!("expected a partial load, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_failure_propagates() {
        let mut sink = MockRowSink::new();
        sink.expect_insert_rows()
            .times(1)
            .returning(|_, _| Err("ResourceNotFoundException".into()));

        let result = load_records(&sink, &EtlConfig::for_tests(), &records(1)).await;
        assert!(matches!(result, Err(EtlError::Load { .. })));
    }

    #[test]
    fn items_carry_every_column() {
        let reqs = write_requests(&records(1), 0).unwrap();
        let item = reqs[0].put_request().unwrap().item();

        assert_eq!(item.len(), 12);
        assert_eq!(
            item.get("asteroid_id"),
            Some(&AttributeValue::S("3000000".to_owned()))
        );
        assert_eq!(
            item.get("miss_distance_km"),
            Some(&AttributeValue::N("450000".to_owned()))
        );
        assert_eq!(
            item.get("is_potentially_hazardous"),
            Some(&AttributeValue::Bool(false))
        );
    }

    #[test]
    fn repeated_objects_get_distinct_row_keys() {
        let row = records(1).remove(0);
        let reqs = write_requests(&[row.clone(), row.clone()], 25).unwrap();

        let keys: Vec<_> = reqs
            .iter()
            .map(|r| r.put_request().unwrap().item()[ROW_KEY_ATTR].clone())
            .collect();

        assert_eq!(
            keys,
            [
                AttributeValue::S(format!("{}#25", row.ingestion_timestamp)),
                AttributeValue::S(format!("{}#26", row.ingestion_timestamp)),
            ]
        );
    }

    #[test]
    fn unprocessed_items_become_row_errors() {
        let reqs = write_requests(&records(2), 0).unwrap();
        let unprocessed = HashMap::from([("astro.nasa_neo.raw_neo_feed".to_owned(), reqs)]);

        let ids: Vec<_> = unprocessed_row_errors(&unprocessed)
            .map(|e| e.asteroid_id)
            .collect();
        assert_eq!(ids, ["3000000", "3000001"]);
    }

    mod dynamo {
        use super::*;
        use aws_sdk_dynamodb::{
            operation::batch_write_item::{
                BatchWriteItemError, BatchWriteItemInput, BatchWriteItemOutput,
            },
            types::error::ResourceNotFoundException,
            Client,
        };
        use aws_smithy_mocks::{mock, mock_client, RuleMode};

        const TABLE: &str = "astro.nasa_neo.raw_neo_feed";

        /// The asteroid ids in a request, in order.
        fn request_ids(input: &BatchWriteItemInput) -> Vec<String> {
            input
                .request_items()
                .and_then(|items| items.get(TABLE))
                .map(|reqs| {
                    reqs.iter()
                        .filter_map(|r| r.put_request())
                        .filter_map(|p| p.item().get("asteroid_id")?.as_s().ok().cloned())
                        .collect()
                })
                .unwrap_or_default()
        }

        fn ids(rows: &[AsteroidRecord]) -> Vec<String> {
            rows.iter().map(|r| r.asteroid_id.clone()).collect()
        }

        fn unprocessed(rows: &[AsteroidRecord]) -> BatchWriteItemOutput {
            BatchWriteItemOutput::builder()
                .unprocessed_items(TABLE, write_requests(rows, 0).unwrap())
                .build()
        }

        #[tokio::test]
        async fn large_batch_is_sent_in_ordered_chunks() {
            let rows = records(60);

            let first = ids(&rows[..25]);
            let second = ids(&rows[25..50]);
            let third = ids(&rows[50..]);
            let left_over_a = rows[3..4].to_vec();
            let left_over_b = rows[58..60].to_vec();

            let chunk_a = mock!(Client::batch_write_item)
                .match_requests(move |req| request_ids(req) == first)
                .then_output(move || unprocessed(&left_over_a));
            let chunk_b = mock!(Client::batch_write_item)
                .match_requests(move |req| request_ids(req) == second)
                .then_output(|| BatchWriteItemOutput::builder().build());
            let chunk_c = mock!(Client::batch_write_item)
                .match_requests(move |req| request_ids(req) == third)
                .then_output(move || unprocessed(&left_over_b));

            let dc = mock_client!(
                aws_sdk_dynamodb,
                RuleMode::Sequential,
                [&chunk_a, &chunk_b, &chunk_c]
            );

            let errors = DynamoRowSink::new(dc)
                .insert_rows(TABLE, &rows)
                .await
                .unwrap();

            assert_eq!(chunk_a.num_calls(), 1);
            assert_eq!(chunk_b.num_calls(), 1);
            assert_eq!(chunk_c.num_calls(), 1);

            let failed: Vec<_> = errors.into_iter().map(|e| e.asteroid_id).collect();
            assert_eq!(failed, ["3000003", "3000058", "3000059"]);
        }

        #[tokio::test]
        async fn failed_chunk_stops_the_batch() {
            let rows = records(30);

            let chunk_a = mock!(Client::batch_write_item)
                .then_output(|| BatchWriteItemOutput::builder().build());
            let chunk_b = mock!(Client::batch_write_item).then_error(|| {
                BatchWriteItemError::ResourceNotFoundException(
                    ResourceNotFoundException::builder()
                        .message("table not found")
                        .build(),
                )
            });

            let dc = mock_client!(aws_sdk_dynamodb, RuleMode::Sequential, [&chunk_a, &chunk_b]);

            let result = DynamoRowSink::new(dc).insert_rows(TABLE, &rows).await;

            assert!(result.is_err());
            assert_eq!(chunk_a.num_calls(), 1);
            assert_eq!(chunk_b.num_calls(), 1);
        }
    }
}
