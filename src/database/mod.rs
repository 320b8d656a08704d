pub mod manager;
pub mod models;

pub use manager::{DatabaseError, DatabaseManager};

/// Wrap a SELECT so it yields one JSON array column named `rows`.
///
/// Row order of the inner query is kept by `json_agg`.
pub fn json_rows_sql(inner: &str) -> String {
    format!("SELECT COALESCE(json_agg(t), '[]'::json) AS rows FROM ({}) t", inner)
}

/// Wrap a SELECT so each row comes back as a JSON object column named `row`.
pub fn json_row_sql(inner: &str) -> String {
    format!("SELECT row_to_json(t) AS row FROM ({}) t", inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_inner_queries() {
        assert_eq!(
            json_row_sql("SELECT * FROM clients WHERE id = $1"),
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM clients WHERE id = $1) t"
        );
        assert!(json_rows_sql("SELECT 1").starts_with("SELECT COALESCE(json_agg(t), '[]'::json)"));
    }
}
