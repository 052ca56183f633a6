//! Request IR and raw row types for the graphplan query planner.
//!
//! This crate holds the plain data that flows into and out of the planner:
//!
//! - [`value`] - Runtime values for literals, keys and row cells
//! - [`filter`] - Boolean filter expression trees
//! - [`query`] - Hierarchical query requests
//! - [`row`] - Flat row sets returned by executors
//! - [`error`] - Error types
//!
//! Everything here derives serde's `Serialize`/`Deserialize`, so requests
//! can be logged, cached or fingerprinted as JSON.

pub mod error;
pub mod filter;
pub mod query;
pub mod row;
pub mod value;

pub use error::Error;

pub use filter::{CompareOp, FilterExpr, Operand, PATH_SEPARATOR};
pub use query::{
    AggregateKind, AggregateSpec, AncestorKey, ExpandSpec, GroupBySpec, OrderDirection,
    OrderSpec, QueryRequest,
};
pub use row::RowSet;
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_to_json() {
        let request = QueryRequest::new("Order")
            .with_filter(FilterExpr::any("Lines", FilterExpr::eq("Sku", "X")))
            .expand(ExpandSpec::new("Lines"))
            .with_top(10);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["root_type"], "Order");
        assert_eq!(json["top"], 10);
        assert_eq!(json["expand"][0]["path"], "Lines");
    }
}
