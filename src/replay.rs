//! Replay client: a `ClientLibrary` that serves results from a fixture.
//!
//! Every submission queues a fresh copy of the fixture's results, so the
//! same fixture can be fetched through any entry point and any number of
//! times. Submissions are recorded for inspection.
//!
//! ```json
//! {
//!   "database": "app",
//!   "results": [
//!     {
//!       "columns": ["id", "secret"],
//!       "types": [23, 17],
//!       "rows": [["1", "\\x6869"], ["2", null]]
//!     }
//!   ]
//! }
//! ```

use crate::adaptee::{ClientLibrary, ConnStatus, Format, Oid, QueryParams, SendResult};
use crate::error::{ClientError, PqExtResult};
use crate::result::{ExecStatus, ResultSet};
use crate::schema::{FieldDescriptor, Schema};
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub results: Vec<FixtureResult>,
}

fn default_database() -> String {
    "replay".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureResult {
    #[serde(default = "default_status")]
    pub status: ExecStatus,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Type OIDs, positionally matching `columns`. Missing entries are unknown.
    #[serde(default)]
    pub types: Vec<Oid>,
    #[serde(default)]
    pub rows: Vec<Vec<Option<String>>>,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_status() -> ExecStatus {
    ExecStatus::TuplesOk
}

impl FixtureResult {
    fn to_result(&self) -> PqExtResult<ResultSet> {
        if let Some(message) = &self.error {
            return Ok(ResultSet::failed(self.status, message.clone()));
        }
        let fields = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| match self.types.get(i) {
                Some(&type_oid) => FieldDescriptor::typed(name.as_str(), type_oid),
                None => FieldDescriptor::named(name.as_str()),
            })
            .collect();
        let mut result = ResultSet::new(self.status, Schema::from_fields(fields));
        for row in &self.rows {
            result.push_row(
                row.iter()
                    .map(|cell| cell.as_ref().map(|v| v.as_bytes().to_vec()))
                    .collect(),
            )?;
        }
        Ok(result)
    }
}

/// What a replay client was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Query(String),
    QueryParams {
        command: String,
        params: OwnedParams,
    },
    Prepared {
        stmt_name: String,
        params: OwnedParams,
    },
    Prepare {
        stmt_name: String,
        query: String,
        param_types: Vec<Oid>,
    },
    Exec(String),
}

/// Owned copy of a `QueryParams`, for recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedParams {
    pub types: Vec<Oid>,
    pub values: Vec<Option<Vec<u8>>>,
    pub formats: Vec<Format>,
    pub result_format: Format,
}

impl From<&QueryParams<'_>> for OwnedParams {
    fn from(params: &QueryParams<'_>) -> Self {
        Self {
            types: params.types.to_vec(),
            values: params.values.iter().map(|v| v.map(<[u8]>::to_vec)).collect(),
            formats: params.formats.to_vec(),
            result_format: params.result_format,
        }
    }
}

#[derive(Debug)]
pub struct ReplayClient {
    database: String,
    results: Vec<ResultSet>,
    pending: VecDeque<ResultSet>,
    submissions: Vec<Submission>,
    send_error: Option<ClientError>,
}

impl ReplayClient {
    pub fn new(database: impl Into<String>, results: Vec<ResultSet>) -> Self {
        Self {
            database: database.into(),
            results,
            pending: VecDeque::new(),
            submissions: Vec::new(),
            send_error: None,
        }
    }

    /// Fail every subsequent submission with `err`.
    pub fn with_send_error(mut self, err: ClientError) -> Self {
        self.send_error = Some(err);
        self
    }

    pub fn from_fixture(fixture: &Fixture) -> PqExtResult<Self> {
        let results = fixture
            .results
            .iter()
            .map(FixtureResult::to_result)
            .collect::<PqExtResult<Vec<_>>>()?;
        Ok(Self::new(fixture.database.clone(), results))
    }

    pub fn from_json(json: &str) -> PqExtResult<Self> {
        let fixture: Fixture = serde_json::from_str(json)?;
        Self::from_fixture(&fixture)
    }

    pub fn from_file(path: impl AsRef<Path>) -> PqExtResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    fn submit(&mut self, submission: Submission) -> SendResult {
        self.submissions.push(submission);
        if let Some(err) = &self.send_error {
            return Err(err.clone());
        }
        self.pending.extend(self.results.iter().cloned());
        Ok(())
    }
}

impl ClientLibrary for ReplayClient {
    fn status(&self) -> ConnStatus {
        ConnStatus::Ok
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    fn send_query(&mut self, query: &str) -> SendResult {
        self.submit(Submission::Query(query.to_string()))
    }

    fn send_query_params(&mut self, command: &str, params: &QueryParams<'_>) -> SendResult {
        self.submit(Submission::QueryParams {
            command: command.to_string(),
            params: params.into(),
        })
    }

    fn send_query_prepared(&mut self, stmt_name: &str, params: &QueryParams<'_>) -> SendResult {
        self.submit(Submission::Prepared {
            stmt_name: stmt_name.to_string(),
            params: params.into(),
        })
    }

    fn send_prepare(&mut self, stmt_name: &str, query: &str, param_types: &[Oid]) -> SendResult {
        self.submit(Submission::Prepare {
            stmt_name: stmt_name.to_string(),
            query: query.to_string(),
            param_types: param_types.to_vec(),
        })
    }

    fn get_result(&mut self) -> Option<ResultSet> {
        self.pending.pop_front()
    }

    fn exec(&mut self, query: &str) -> Result<ResultSet, ClientError> {
        self.submissions.push(Submission::Exec(query.to_string()));
        Ok(self
            .results
            .last()
            .cloned()
            .unwrap_or_else(ResultSet::command_ok))
    }
}
