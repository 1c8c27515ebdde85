//! Row filters and their compilation to parameterized WHERE fragments.
//!
//! A [`Condition`] is either a comparison on one column or an AND/OR group of
//! child conditions. [`compile`] renders the fragment (without the `WHERE`
//! keyword); [`bindings`] produces the values for every token it references.
//!
//! Token scheme, for a column `age`:
//!
//! | operator      | fragment                                   |
//! |---------------|--------------------------------------------|
//! | `=`           | `AGE = @AGE`                               |
//! | `!=`          | `AGE != @AGE_NE`                           |
//! | `>` `<`       | `AGE > @AGE_GT`, `AGE < @AGE_LT`           |
//! | `>=` `<=`     | `AGE >= @AGE_GTE`, `AGE <= @AGE_LTE`       |
//! | `LIKE`        | `AGE LIKE @AGE_LIKE`                       |
//! | `IN`          | `AGE IN (@AGE_IN_0, @AGE_IN_1, ...)`       |
//! | `BETWEEN`     | `AGE BETWEEN @AGE_BETWEEN_1 AND @AGE_BETWEEN_2` |
//! | `IS NULL`     | `AGE IS NULL`                              |

use crate::error::{Result, RowkitError};
use crate::schema::{is_identifier, normalize_name};
use crate::statement::bind_token;
use crate::value::{Params, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    In,
    Between,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::Between => "BETWEEN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Suffix appended to the column name to form the bind token.
    fn token_suffix(&self) -> &'static str {
        match self {
            Operator::Eq => "",
            Operator::Ne => "_NE",
            Operator::Gt => "_GT",
            Operator::Lt => "_LT",
            Operator::Gte => "_GTE",
            Operator::Lte => "_LTE",
            Operator::Like => "_LIKE",
            Operator::In => "_IN",
            Operator::Between => "_BETWEEN",
            Operator::IsNull | Operator::IsNotNull => "",
        }
    }
}

impl FromStr for Operator {
    type Err = RowkitError;

    fn from_str(s: &str) -> Result<Self> {
        let words: Vec<String> = s.split_whitespace().map(normalize_name).collect();
        match words.join(" ").as_str() {
            "=" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            ">" => Ok(Operator::Gt),
            "<" => Ok(Operator::Lt),
            ">=" => Ok(Operator::Gte),
            "<=" => Ok(Operator::Lte),
            "LIKE" => Ok(Operator::Like),
            "IN" => Ok(Operator::In),
            "BETWEEN" => Ok(Operator::Between),
            "IS NULL" => Ok(Operator::IsNull),
            "IS NOT NULL" => Ok(Operator::IsNotNull),
            _ => Err(RowkitError::UnsupportedOperator(s.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Single(Value),
    List(Vec<Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    fn keyword(&self) -> &'static str {
        match self {
            Combinator::And => " AND ",
            Combinator::Or => " OR ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison {
        column: String,
        operator: Operator,
        operand: Operand,
    },
    Combinator {
        kind: Combinator,
        children: Vec<Condition>,
    },
}

impl Condition {
    pub fn compare(column: impl Into<String>, operator: Operator, operand: Operand) -> Self {
        Condition::Comparison {
            column: column.into(),
            operator,
            operand,
        }
    }

    fn single(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self::compare(column, operator, Operand::Single(value.into()))
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(column, Operator::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(column, Operator::Ne, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(column, Operator::Gt, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(column, Operator::Lt, value)
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(column, Operator::Gte, value)
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(column, Operator::Lte, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::single(column, Operator::Like, pattern)
    }

    pub fn in_list<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self::compare(column, Operator::In, Operand::List(values))
    }

    pub fn between(
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::compare(
            column,
            Operator::Between,
            Operand::List(vec![low.into(), high.into()]),
        )
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::compare(column, Operator::IsNull, Operand::None)
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::compare(column, Operator::IsNotNull, Operand::None)
    }

    pub fn and(children: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Combinator {
            kind: Combinator::And,
            children: children.into_iter().collect(),
        }
    }

    pub fn or(children: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Combinator {
            kind: Combinator::Or,
            children: children.into_iter().collect(),
        }
    }

    /// Parse the mapping form: `$and`/`$or` keys hold arrays of child
    /// mappings, every other key is a column mapped to a literal (equality)
    /// or to an `{operator: operand}` mapping. Several entries in one mapping
    /// are ANDed together in the order they were written.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let map = json.as_object().ok_or_else(|| {
            RowkitError::InvalidCriteria(format!("expected a mapping, got {json}"))
        })?;

        let mut conditions = Vec::new();
        for (key, value) in map {
            match key.to_ascii_lowercase().as_str() {
                "$and" => conditions.push(Self::and(parse_children(key, value)?)),
                "$or" => conditions.push(Self::or(parse_children(key, value)?)),
                _ => conditions.extend(parse_column(key, value)?),
            }
        }

        match conditions.len() {
            0 => Err(RowkitError::InvalidCriteria("empty criteria".into())),
            1 => Ok(conditions.remove(0)),
            _ => Ok(Self::and(conditions)),
        }
    }
}

fn parse_children(key: &str, value: &serde_json::Value) -> Result<Vec<Condition>> {
    let items = value.as_array().ok_or_else(|| {
        RowkitError::InvalidCriteria(format!("{key} expects an array of criteria"))
    })?;
    items.iter().map(Condition::from_json).collect()
}

fn parse_column(column: &str, value: &serde_json::Value) -> Result<Vec<Condition>> {
    let ops = match value {
        serde_json::Value::Object(ops) => ops,
        serde_json::Value::Array(_) => {
            return Err(RowkitError::InvalidCriteria(format!(
                "column {column} needs an operator for a list operand"
            )))
        }
        literal => return Ok(vec![Condition::eq(column, Value::from(literal))]),
    };

    let mut conditions = Vec::with_capacity(ops.len());
    for (op, operand) in ops {
        let operator: Operator = op.parse()?;
        let operand = match (operator, operand) {
            (Operator::IsNull | Operator::IsNotNull, _) => Operand::None,
            (Operator::In | Operator::Between, serde_json::Value::Array(items)) => {
                Operand::List(items.iter().map(Value::from).collect())
            }
            (Operator::In | Operator::Between, _) => {
                return Err(RowkitError::InvalidCriteria(format!(
                    "{operator} on {column} expects an array operand"
                )))
            }
            (_, serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                return Err(RowkitError::InvalidCriteria(format!(
                    "{operator} on {column} expects a single value"
                )))
            }
            (_, literal) => Operand::Single(Value::from(literal)),
        };
        conditions.push(Condition::compare(column, operator, operand));
    }
    Ok(conditions)
}

/// Compile a condition into a WHERE fragment (no leading keyword).
pub fn compile(condition: &Condition) -> Result<String> {
    match condition {
        Condition::Combinator { kind, children } => {
            if children.is_empty() {
                return Err(RowkitError::InvalidCriteria(format!(
                    "empty{}group",
                    kind.keyword()
                )));
            }
            let parts = children.iter().map(compile).collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", parts.join(kind.keyword())))
        }
        Condition::Comparison {
            column,
            operator,
            operand,
        } => compile_comparison(column, *operator, operand),
    }
}

fn compile_comparison(column: &str, operator: Operator, operand: &Operand) -> Result<String> {
    if !is_identifier(column) {
        return Err(RowkitError::InvalidCriteria(format!(
            "invalid column name '{column}'"
        )));
    }
    let name = normalize_name(column);
    let token = bind_token(&format!("{name}{}", operator.token_suffix()));

    match (operator, operand) {
        (Operator::IsNull | Operator::IsNotNull, _) => Ok(format!("{name} {operator}")),
        (Operator::In, Operand::List(values)) => {
            let tokens: Vec<String> = (0..values.len()).map(|i| format!("{token}_{i}")).collect();
            Ok(format!("{name} IN ({})", tokens.join(", ")))
        }
        (Operator::Between, Operand::List(values)) if values.len() == 2 => {
            Ok(format!("{name} BETWEEN {token}_1 AND {token}_2"))
        }
        (Operator::Between, Operand::List(values)) => Err(RowkitError::InvalidCriteria(format!(
            "BETWEEN on {column} needs exactly two bounds, got {}",
            values.len()
        ))),
        (Operator::In | Operator::Between, _) => Err(RowkitError::InvalidCriteria(format!(
            "{operator} on {column} expects a list operand"
        ))),
        (_, Operand::Single(_)) => Ok(format!("{name} {operator} {token}")),
        (_, _) => Err(RowkitError::InvalidCriteria(format!(
            "{operator} on {column} expects a single value"
        ))),
    }
}

/// Bind values for every token `compile` emits for this condition.
/// Fails when one token would need two different values.
pub fn bindings(condition: &Condition) -> Result<Params> {
    let mut bound = BTreeMap::new();
    collect_bindings(condition, &mut bound)?;
    Ok(bound.into_iter().collect())
}

fn collect_bindings(condition: &Condition, bound: &mut BTreeMap<String, Value>) -> Result<()> {
    match condition {
        Condition::Combinator { children, .. } => {
            for child in children {
                collect_bindings(child, bound)?;
            }
            Ok(())
        }
        Condition::Comparison {
            column,
            operator,
            operand,
        } => {
            let base = format!("{}{}", normalize_name(column), operator.token_suffix());
            match (operator, operand) {
                (Operator::IsNull | Operator::IsNotNull, _) | (_, Operand::None) => Ok(()),
                (Operator::In, Operand::List(values)) => values
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, v)| bind(bound, format!("{base}_{i}"), v)),
                (Operator::Between, Operand::List(values)) => values
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, v)| bind(bound, format!("{base}_{}", i + 1), v)),
                (Operator::In | Operator::Between, _) => Err(RowkitError::InvalidCriteria(
                    format!("{operator} on {column} expects a list operand"),
                )),
                (_, Operand::Single(v)) => bind(bound, base, v),
                (_, Operand::List(_)) => Err(RowkitError::InvalidCriteria(format!(
                    "{operator} on {column} expects a single value"
                ))),
            }
        }
    }
}

fn bind(bound: &mut BTreeMap<String, Value>, name: String, value: &Value) -> Result<()> {
    match bound.get(&name) {
        Some(existing) if existing != value => Err(RowkitError::InvalidCriteria(format!(
            "token @{name} is bound to two different values"
        ))),
        Some(_) => Ok(()),
        None => {
            bound.insert(name, value.clone());
            Ok(())
        }
    }
}
