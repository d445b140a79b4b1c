use serde_json::Value;
use std::fmt;

/// Left-hand side of a filter clause.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRef {
    /// A (possibly dotted) document field.
    Field(String),
    /// The document id itself.
    DocumentId,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{}", name),
            Self::DocumentId => write!(f, "__name__"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    /// Array field contains the value.
    Contains,
    /// Array field contains any of the candidate values.
    ContainsAny,
    /// Field equals one of the candidate values.
    In,
    /// Field equals none of the candidate values.
    NotIn,
}

impl FilterOp {
    /// Whether the clause value is a candidate list.
    pub fn takes_list(&self) -> bool {
        matches!(self, Self::ContainsAny | Self::In | Self::NotIn)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Contains => "array-contains",
            Self::ContainsAny => "array-contains-any",
            Self::In => "in",
            Self::NotIn => "not-in",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: FieldRef,
    pub op: FilterOp,
    /// Scalar operand, or a `Value::Array` of candidates for list operators.
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Keep the first N records of the ordered result.
    First(usize),
    /// Keep the last N records of the ordered result.
    Last(usize),
}

/// Accumulated query clauses, as handed to a [`crate::storage::DocumentStore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
    pub offset: usize,
    pub limit: Option<Limit>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, field: FieldRef, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter { field, op, value });
        self
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WHERE")?;
        if self.filters.is_empty() {
            write!(f, " *")?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                write!(f, " AND")?;
            }
            write!(f, " {} {} {}", filter.field, filter.op, filter.value)?;
        }
        if let Some(order) = &self.order {
            let dir = match order.direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            write!(f, " ORDER BY {} {}", order.field, dir)?;
        }
        if self.offset > 0 {
            write!(f, " OFFSET {}", self.offset)?;
        }
        match self.limit {
            Some(Limit::First(n)) => write!(f, " LIMIT {}", n)?,
            Some(Limit::Last(n)) => write!(f, " LIMIT LAST {}", n)?,
            None => {}
        }
        Ok(())
    }
}
