//! In-memory [`QueryExecutor`] for tests.
//!
//! Queued row batches are handed out one per `fetch_raw` call, in order. Every
//! statement received is recorded so tests can assert on the generated SQL, or
//! on the absence of any SQL when planning fails.

use crate::executor::{ExecError, QueryExecutor};
use crate::value::RawRow;
use std::collections::VecDeque;
use std::sync::Mutex;

enum MockResult {
    Rows(Vec<RawRow>),
    Error(String),
}

#[derive(Default)]
pub struct MockExecutor {
    results: Mutex<VecDeque<MockResult>>,
    statements: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the rows returned by the next `fetch_raw` call.
    #[must_use]
    pub fn append_rows(self, rows: Vec<RawRow>) -> Self {
        self.lock_results().push_back(MockResult::Rows(rows));
        self
    }

    /// Queue a failure for the next `fetch_raw` call.
    #[must_use]
    pub fn append_error(self, message: impl Into<String>) -> Self {
        self.lock_results().push_back(MockResult::Error(message.into()));
        self
    }

    /// SQL received so far, oldest first.
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn lock_results(&self) -> std::sync::MutexGuard<'_, VecDeque<MockResult>> {
        // A panicking test thread must not hide the queue from the others.
        self.results.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, sql: &str) {
        self.statements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sql.to_string());
    }
}

impl QueryExecutor for MockExecutor {
    fn fetch_raw(&self, sql: &str, _values: &sea_query::Values) -> Result<Vec<RawRow>, ExecError> {
        self.record(sql);
        match self.lock_results().pop_front() {
            Some(MockResult::Rows(rows)) => Ok(rows),
            Some(MockResult::Error(message)) => Err(ExecError::QueryError(message)),
            None => Err(ExecError::Other("mock executor has no queued results".into())),
        }
    }

    fn execute(&self, sql: &str, _values: &sea_query::Values) -> Result<u64, ExecError> {
        self.record(sql);
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_results_are_returned_in_order() {
        let mock = MockExecutor::new()
            .append_rows(vec![RawRow::from_pairs([("a", json!(1))])])
            .append_error("simulated failure");
        let values = sea_query::Values(vec![]);

        let first = mock.fetch_raw("SELECT 1", &values).unwrap();
        assert_eq!(first[0].get("a"), Some(&json!(1)));

        let second = mock.fetch_raw("SELECT 2", &values);
        assert!(matches!(second, Err(ExecError::QueryError(m)) if m.contains("simulated")));

        assert!(mock.fetch_raw("SELECT 3", &values).is_err());
        assert_eq!(mock.statements(), vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }
}
