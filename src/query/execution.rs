//! Query execution methods for `SelectQuery`.
//!
//! Every method builds the statement, runs it through a [`QueryExecutor`]
//! and, except for [`SelectQuery::get_raw_many`], hydrates the root entities
//! and maps the registered relation ids onto them before returning.

use crate::executor::QueryExecutor;
use crate::query::hydrate::{hydrate, Hydrated, Record};
use crate::query::select::SelectQuery;
use crate::relation_id::{mapper, RelationIdError};
use crate::value::RawRow;
use crate::ExecError;
use sea_query::{PostgresQueryBuilder, Values};
use serde::de::DeserializeOwned;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Everything one execution produced
#[derive(Debug)]
pub struct QueryOutput {
    /// Rows as returned by the executor
    pub raw: Vec<RawRow>,
    /// One record per distinct root entity, in first-seen row order
    pub records: Vec<Record>,
    /// Relation-id values that could not be converted; the rest are mapped
    pub mapping_errors: Vec<RelationIdError>,
}

impl SelectQuery<'_> {
    /// Final SQL with `$n` placeholders and its parameters.
    pub fn build(&self) -> (String, Values) {
        self.statement.build(PostgresQueryBuilder)
    }

    /// Final SQL with parameters inlined, for logging and tests.
    pub fn to_sql_string(&self) -> String {
        self.statement.to_string(PostgresQueryBuilder)
    }

    /// Execute and return the raw rows without hydration.
    ///
    /// # Errors
    ///
    /// Returns `RelationIdError::Execution` with the executor's error unchanged.
    pub fn get_raw_many<E>(&self, executor: &E) -> Result<Vec<RawRow>, RelationIdError>
    where
        E: QueryExecutor + ?Sized,
    {
        let (sql, values) = self.build();
        log::trace!("select: {sql}");
        Ok(executor.fetch_raw(&sql, &values)?)
    }

    /// Execute, hydrate and map relation ids.
    ///
    /// Mapping failures do not fail the call; they are returned in
    /// [`QueryOutput::mapping_errors`].
    pub fn get_raw_and_entities<E>(&self, executor: &E) -> Result<QueryOutput, RelationIdError>
    where
        E: QueryExecutor + ?Sized,
    {
        let raw = self.get_raw_many(executor)?;
        let Hydrated { mut records, groups } = hydrate(&raw, &self.columns)?;

        let mapping_errors = {
            #[cfg(feature = "tracing")]
            let _span = tracing_helpers::map_span(raw.len(), self.relation_ids.len()).entered();
            mapper::map(&raw, &mut records, &groups, &self.relation_ids)
        };

        #[cfg(feature = "metrics")]
        METRICS.record_mapping_errors(mapping_errors.len());

        Ok(QueryOutput {
            raw,
            records,
            mapping_errors,
        })
    }

    /// All records, one per distinct root entity.
    ///
    /// # Errors
    ///
    /// Execution errors, or `RelationIdError::Mapping` if any relation id
    /// failed to map.
    pub fn get_many<E>(&self, executor: &E) -> Result<Vec<Record>, RelationIdError>
    where
        E: QueryExecutor + ?Sized,
    {
        let output = self.get_raw_and_entities(executor)?;
        if !output.mapping_errors.is_empty() {
            return Err(RelationIdError::Mapping(output.mapping_errors));
        }
        Ok(output.records)
    }

    /// The record of the first raw row, if any.
    pub fn get_one<E>(&self, executor: &E) -> Result<Option<Record>, RelationIdError>
    where
        E: QueryExecutor + ?Sized,
    {
        Ok(self.get_many(executor)?.into_iter().next())
    }

    /// [`get_many`](Self::get_many), deserialized into `T`.
    pub fn get_many_as<T, E>(&self, executor: &E) -> Result<Vec<T>, RelationIdError>
    where
        T: DeserializeOwned,
        E: QueryExecutor + ?Sized,
    {
        self.get_many(executor)?
            .iter()
            .map(|r| r.deserialize().map_err(parse_error))
            .collect()
    }

    /// [`get_one`](Self::get_one), deserialized into `T`.
    pub fn get_one_as<T, E>(&self, executor: &E) -> Result<Option<T>, RelationIdError>
    where
        T: DeserializeOwned,
        E: QueryExecutor + ?Sized,
    {
        self.get_one(executor)?
            .map(|r| r.deserialize().map_err(parse_error))
            .transpose()
    }
}

fn parse_error(err: serde_json::Error) -> RelationIdError {
    RelationIdError::Execution(ExecError::ParseError(err.to_string()))
}
