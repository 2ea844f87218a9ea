//! Analytics warehouse access.
//!
//! The export stage only needs one thing from the warehouse: run a query and
//! hand back the complete, buffered result set with its schema order. The
//! [`Warehouse`] trait is that seam; [`bigquery::BigQueryClient`] is the
//! production implementation over the REST API.

/// REST client for the managed warehouse
pub mod bigquery;

use crate::error::Result;

pub use bigquery::BigQueryClient;

/// A fully buffered query result.
///
/// Rows are positional over `columns`; `None` is a SQL NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builder-style helper, mostly for tests and fixtures.
    pub fn with_row<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(values.into_iter().map(|v| Some(v.into())).collect());
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Runs a query to completion and returns every row.
#[cfg_attr(test, mockall::automock)]
pub trait Warehouse {
    fn query(&self, sql: &str) -> Result<ResultSet>;
}
