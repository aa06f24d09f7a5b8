use std::collections::HashMap;

use placegate_types::models::params;

// Column projections for the two query endpoints. `searchtype` is persisted
// but not projected or filterable, matching the endpoint's public shape.
pub const SEARCH_QUERY_PREFIX: &str = "SELECT sessionid, timestamp, username, query, location, \
     radius, keyword, language, minprice, maxprice, name, opennow, rankby, types, pagetoken, \
     zagatselected FROM searches";
pub const RESULT_QUERY_PREFIX: &str =
    "SELECT sessionid, timestamp, username, placeid, lat, lng FROM results";

pub const SEARCH_QUERY_ALLOW_LIST: &[&str] = &[
    "sessionid",
    "timestamp",
    params::USERNAME,
    params::QUERY,
    params::LOCATION,
    params::RADIUS,
    params::KEYWORD,
    params::LANGUAGE,
    params::MINPRICE,
    params::MAXPRICE,
    params::NAME,
    params::OPENNOW,
    params::RANKBY,
    params::TYPES,
    params::PAGETOKEN,
    params::ZAGATSELECTED,
];
pub const RESULT_QUERY_ALLOW_LIST: &[&str] =
    &["sessionid", "timestamp", params::USERNAME, "placeid"];

/// Immutable description of one query endpoint: the fixed SELECT prefix,
/// the parameter names it may filter on, and the ordering/limit suffix.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    pub prefix: &'static str,
    pub allow_list: &'static [&'static str],
    pub suffix: String,
}

impl QueryTemplate {
    pub fn searches(limit: u32) -> Self {
        Self {
            prefix: SEARCH_QUERY_PREFIX,
            allow_list: SEARCH_QUERY_ALLOW_LIST,
            suffix: format!(" ORDER BY timestamp DESC LIMIT {limit}"),
        }
    }

    pub fn results(limit: u32) -> Self {
        Self {
            prefix: RESULT_QUERY_PREFIX,
            allow_list: RESULT_QUERY_ALLOW_LIST,
            suffix: format!(" ORDER BY timestamp DESC LIMIT {limit}"),
        }
    }
}

/// A fully built, parameterized SELECT: SQL text with positional
/// placeholders and the values to bind, one per placeholder, in order.
///
/// Caller-supplied values never reach the SQL text — only allow-listed
/// column names (fixed strings) are spliced into the WHERE clause.
#[derive(Debug, Clone)]
pub struct QueryStatement {
    sql: String,
    params: Vec<String>,
}

impl QueryStatement {
    /// Build a statement from a template and the client's parameters.
    ///
    /// Filters appear in allow-list order regardless of request order, each
    /// rendered as `name = ?` and joined with AND. No allow-listed
    /// parameter present means no WHERE clause at all.
    pub fn build(template: &QueryTemplate, request_params: &HashMap<String, String>) -> Self {
        let mut sql = String::from(template.prefix);
        let mut params = Vec::new();
        let mut clauses = Vec::new();

        for name in template.allow_list {
            if let Some(value) = request_params.get(*name) {
                clauses.push(format!("{name} = ?"));
                params.push(value.clone());
            }
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(&template.suffix);

        Self { sql, params }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }
}
