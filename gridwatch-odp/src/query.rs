//! Optional filters for a records request.

use chrono::{DateTime, SecondsFormat, Utc};

/// Filters applied to a records request.
///
/// An empty query pulls the latest readings for every constraint on the
/// network, up to the client's page limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchQuery {
    /// Restrict to a single distributed energy resource.
    pub der_name: Option<String>,
    /// Only readings at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only readings strictly before this instant.
    pub until: Option<DateTime<Utc>>,
    /// Page size override.
    pub limit: Option<u32>,
}

impl FetchQuery {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the named DER.
    pub fn der_name(mut self, name: impl Into<String>) -> Self {
        self.der_name = Some(name.into());
        self
    }

    /// Only readings at or after `since`.
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Only readings before `until`.
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Override the page size.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// ODSQL `where` clause for the time range, if any bound is set.
    pub fn where_clause(&self) -> Option<String> {
        let mut clauses = Vec::new();
        if let Some(since) = self.since {
            clauses.push(format!("timestamp >= date'{}'", rfc3339(since)));
        }
        if let Some(until) = self.until {
            clauses.push(format!("timestamp < date'{}'", rfc3339(until)));
        }
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }

    /// Query-string parameters for this filter (excluding the API key).
    pub(crate) fn params(&self, default_limit: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.limit.unwrap_or(default_limit).to_string())];
        if let Some(ref der) = self.der_name {
            params.push(("refine", format!("der_name:{}", der)));
        }
        if let Some(clause) = self.where_clause() {
            params.push(("where", clause));
        }
        params
    }
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_empty_query_params() {
        let params = FetchQuery::new().params(100);
        assert_eq!(params, vec![("limit", "100".to_string())]);
    }

    #[test]
    fn test_der_and_limit() {
        let params = FetchQuery::new().der_name("Wissington").limit(20).params(100);
        assert!(params.contains(&("limit", "20".to_string())));
        assert!(params.contains(&("refine", "der_name:Wissington".to_string())));
    }

    #[test]
    fn test_time_range() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let query = FetchQuery::new().since(since).until(until);

        assert_eq!(
            query.where_clause().unwrap(),
            "timestamp >= date'2024-01-01T00:00:00Z' AND timestamp < date'2024-01-02T00:00:00Z'"
        );
    }

    #[test]
    fn test_open_ended_range() {
        let since = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();
        let query = FetchQuery::new().since(since);
        assert_eq!(
            query.where_clause().unwrap(),
            "timestamp >= date'2024-06-01T12:30:00Z'"
        );
        assert!(FetchQuery::new().where_clause().is_none());
    }
}
