use super::spec::{Direction, FieldRef, Filter, FilterOp, Limit, OrderBy, QuerySpec};
use crate::connection::{CollectionRef, ContextId, OdmConfig};
use crate::core::naming::{check_candidates, check_field, clean_key};
use crate::core::{OdmError, Result};
use crate::storage::DocumentSnapshot;
use log::debug;
use serde_json::Value;

/// Lazily executed query against one collection of one store context.
///
/// Every clause consumes the selection and hands it back, so clauses chain
/// with `?`. Executing borrows it: a finished selection can be run again
/// and cloned freely.
///
/// ```ignore
/// let chairs = mapper
///     .select()?
///     .where_equal_to("name", "chair")?
///     .order_by("price", Direction::Descending)?
///     .limit(10)?;
/// let items = mapper.retrieve_all(&chairs).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Selection {
    collection: CollectionRef,
    spec: QuerySpec,
    limits: OdmConfig,
}

fn positive(what: &str, n: i64) -> Result<usize> {
    if n <= 0 {
        return Err(OdmError::Format(format!("{} must be greater than 0, got {}", what, n)));
    }
    usize::try_from(n).map_err(|_| OdmError::Format(format!("{} {} is out of range", what, n)))
}

impl Selection {
    pub fn new(collection: CollectionRef, limits: OdmConfig) -> Self {
        Self {
            collection,
            spec: QuerySpec::new(),
            limits,
        }
    }

    /// Store context the selection was built against.
    pub fn context(&self) -> ContextId {
        self.collection.context()
    }

    pub fn collection(&self) -> &str {
        self.collection.path()
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    fn push(mut self, field: FieldRef, op: FilterOp, value: Value) -> Self {
        self.spec.filters.push(Filter { field, op, value });
        self
    }

    fn field_clause(self, field: &str, op: FilterOp, value: Value) -> Result<Self> {
        let field = check_field(field, self.limits.field_byte_limit)?.to_string();
        Ok(self.push(FieldRef::Field(field), op, value))
    }

    fn list_clause<I>(self, field: &str, op: FilterOp, values: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let field = check_field(field, self.limits.field_byte_limit)?.to_string();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        check_candidates(&values)?;
        Ok(self.push(FieldRef::Field(field), op, Value::Array(values)))
    }

    fn key_clause<I>(self, op: FilterOp, keys: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|key| clean_key("Key", key.as_ref(), self.limits.key_byte_limit).map(Value::String))
            .collect::<Result<Vec<Value>>>()?;
        check_candidates(&keys)?;
        Ok(self.push(FieldRef::DocumentId, op, Value::Array(keys)))
    }

    pub fn where_equal_to(self, field: &str, value: impl Into<Value>) -> Result<Self> {
        self.field_clause(field, FilterOp::Equal, value.into())
    }

    pub fn where_not_equal_to(self, field: &str, value: impl Into<Value>) -> Result<Self> {
        self.field_clause(field, FilterOp::NotEqual, value.into())
    }

    pub fn where_less_than(self, field: &str, value: impl Into<Value>) -> Result<Self> {
        self.field_clause(field, FilterOp::LessThan, value.into())
    }

    pub fn where_less_than_or_equal_to(self, field: &str, value: impl Into<Value>) -> Result<Self> {
        self.field_clause(field, FilterOp::LessThanOrEqual, value.into())
    }

    pub fn where_greater_than(self, field: &str, value: impl Into<Value>) -> Result<Self> {
        self.field_clause(field, FilterOp::GreaterThan, value.into())
    }

    pub fn where_greater_than_or_equal_to(self, field: &str, value: impl Into<Value>) -> Result<Self> {
        self.field_clause(field, FilterOp::GreaterThanOrEqual, value.into())
    }

    /// Array field containing `value`.
    pub fn where_array_contains(self, field: &str, value: impl Into<Value>) -> Result<Self> {
        self.field_clause(field, FilterOp::Contains, value.into())
    }

    /// Array field containing at least one of `values`.
    pub fn where_array_contains_any<I>(self, field: &str, values: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.list_clause(field, FilterOp::ContainsAny, values)
    }

    pub fn where_in<I>(self, field: &str, values: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.list_clause(field, FilterOp::In, values)
    }

    pub fn where_not_in<I>(self, field: &str, values: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.list_clause(field, FilterOp::NotIn, values)
    }

    /// Restricts the selection to the given document keys.
    pub fn keys<I>(self, keys: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.key_clause(FilterOp::In, keys)
    }

    /// Excludes the given document keys.
    pub fn except<I>(self, keys: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.key_clause(FilterOp::NotIn, keys)
    }

    /// Orders by one field, replacing any earlier ordering.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Result<Self> {
        let field = check_field(field, self.limits.field_byte_limit)?.to_string();
        self.spec.order = Some(OrderBy { field, direction });
        Ok(self)
    }

    /// Skips the first `n` records.
    pub fn offset(mut self, n: i64) -> Result<Self> {
        self.spec.offset = positive("Offset", n)?;
        Ok(self)
    }

    /// Keeps at most the first `n` records.
    pub fn limit(mut self, n: i64) -> Result<Self> {
        self.spec.limit = Some(Limit::First(positive("Limit", n)?));
        Ok(self)
    }

    /// Keeps at most the last `n` records of the ordered result.
    pub fn limit_to_last(mut self, n: i64) -> Result<Self> {
        self.spec.limit = Some(Limit::Last(positive("Limit", n)?));
        Ok(self)
    }

    /// Runs the query and returns the matching raw records in order.
    pub async fn documents(&self) -> Result<Vec<DocumentSnapshot>> {
        debug!("Selecting from {}: {}", self.collection.path(), self.spec);
        let records = self.collection.query(&self.spec).await?;
        debug!("Selected {} record(s) from {}", records.len(), self.collection.path());
        Ok(records)
    }

    /// Matching document keys, in order.
    pub async fn document_keys(&self) -> Result<Vec<String>> {
        Ok(self.documents().await?.into_iter().map(|record| record.id).collect())
    }
}
