// Request/response bodies of the query endpoints
//
// Request field names are lowercase; the validator folds the client's keys
// before decoding.

use serde::{Deserialize, Serialize};

/// Body of a submit request: `{"year": "2017"}`
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub year: String,
}

/// Body of a fetch request: `{"queryid": "2017-1510000000000000000"}`
#[derive(Debug, Default, Deserialize)]
pub struct FetchRequest {
    #[serde(default, rename = "queryid")]
    pub query_id: String,
}

/// Reply to a successful submit
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    #[serde(rename = "queryid")]
    pub query_id: String,
}
