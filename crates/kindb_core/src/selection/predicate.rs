//! Predicate trees over record fields.
//!
//! A predicate is either a comparison `(field, operator, value)` or a
//! connective (`AND`, `OR`, `NOT`) over other predicates. Fields are
//! dotted paths into the record as seen through [`Record::to_value`].
//!
//! Evaluation is two-pass: first the referenced fields are resolved from
//! the record, then the boolean tree is evaluated over those values.
//!
//! [`Record::to_value`]: crate::model::Record::to_value

use kindb_codec::Value;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `IN`: the field equals one element of an array value.
    In,
    /// `IS`: equality that treats a missing field as null.
    Is,
    /// `IS NOT`
    IsNot,
    /// `IS NULL`: the field is missing or null. The value is ignored.
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
    /// `BETWEEN`: inclusive range given as a two-element array.
    Between,
    /// `LIKE`: SQL pattern, `%` for any run and `_` for one character.
    Like,
    /// `REGEXP`: regular expression found anywhere in the text.
    Regexp,
}

impl Operator {
    /// SQL spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::In => "IN",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
            Self::Between => "BETWEEN",
            Self::Like => "LIKE",
            Self::Regexp => "REGEXP",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
        Ok(match norm.as_str() {
            "=" | "==" => Self::Eq,
            "<>" | "!=" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            "IN" => Self::In,
            "IS" => Self::Is,
            "IS NOT" => Self::IsNot,
            "IS NULL" => Self::IsNull,
            "IS NOT NULL" => Self::IsNotNull,
            "BETWEEN" => Self::Between,
            "LIKE" => Self::Like,
            "REGEXP" => Self::Regexp,
            _ => return Err(CoreError::invalid_predicate(format!("unknown operator '{s}'"))),
        })
    }
}

/// A predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `field op value`.
    Compare {
        /// Dotted field path.
        field: String,
        /// Operator.
        op: Operator,
        /// Right-hand value.
        value: Value,
    },
    /// All children hold. An empty `And` holds.
    And(Vec<Predicate>),
    /// Any child holds. An empty `Or` does not hold.
    Or(Vec<Predicate>),
    /// The child does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    /// A comparison.
    pub fn compare(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Eq, value)
    }

    /// `field LIKE pattern`
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(field, Operator::Like, Value::Text(pattern.into()))
    }

    /// `field IS NULL`
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::compare(field, Operator::IsNull, Value::Null)
    }

    /// `field BETWEEN low AND high`
    pub fn between(field: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::compare(
            field,
            Operator::Between,
            Value::Array(vec![low.into(), high.into()]),
        )
    }

    /// `field IN (values...)`
    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::compare(
            field,
            Operator::In,
            Value::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Conjunction with another predicate.
    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::And(mut items) => {
                items.push(other);
                Self::And(items)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Disjunction with another predicate.
    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Or(mut items) => {
                items.push(other);
                Self::Or(items)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Negation.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Builds a node from its textual parts, e.g. `("AND", children)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPredicate` for an unknown connective or a `NOT`
    /// with other than one child.
    pub fn connective(name: &str, mut children: Vec<Predicate>) -> CoreResult<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And(children)),
            "OR" => Ok(Self::Or(children)),
            "NOT" if children.len() == 1 => Ok(Self::Not(Box::new(children.remove(0)))),
            "NOT" => Err(CoreError::invalid_predicate("NOT takes exactly one expression")),
            other => Err(CoreError::invalid_predicate(format!("unknown connective '{other}'"))),
        }
    }

    /// Every field path the predicate reads, without duplicates.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Compare { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_fields(out);
                }
            }
            Self::Not(inner) => inner.collect_fields(out),
        }
    }

    /// Prepares the predicate for repeated evaluation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPredicate` if a pattern does not compile or an
    /// operator is given a value of the wrong shape.
    pub fn compile(&self) -> CoreResult<Matcher> {
        Ok(Matcher {
            fields: self.fields().into_iter().map(String::from).collect(),
            root: Node::build(self)?,
        })
    }
}

/// Converts a `LIKE` pattern into an anchored regular expression.
pub(crate) fn like_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

#[derive(Debug)]
enum Node {
    Compare { field: String, test: Test },
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
}

#[derive(Debug)]
enum Test {
    Cmp(Operator, Value),
    In(Vec<Value>),
    Between(Value, Value),
    Null(bool),
    Pattern(Regex),
}

impl Node {
    fn build(p: &Predicate) -> CoreResult<Self> {
        Ok(match p {
            Predicate::Compare { field, op, value } => Node::Compare {
                field: field.clone(),
                test: Test::build(*op, value)?,
            },
            Predicate::And(items) => Node::And(items.iter().map(Node::build).collect::<CoreResult<_>>()?),
            Predicate::Or(items) => Node::Or(items.iter().map(Node::build).collect::<CoreResult<_>>()?),
            Predicate::Not(inner) => Node::Not(Box::new(Node::build(inner)?)),
        })
    }

    fn eval(&self, values: &HashMap<&str, Option<&Value>>) -> bool {
        match self {
            Node::Compare { field, test } => {
                test.eval(values.get(field.as_str()).copied().flatten())
            }
            Node::And(items) => items.iter().all(|n| n.eval(values)),
            Node::Or(items) => items.iter().any(|n| n.eval(values)),
            Node::Not(inner) => !inner.eval(values),
        }
    }
}

impl Test {
    fn build(op: Operator, value: &Value) -> CoreResult<Self> {
        Ok(match op {
            Operator::In => match value {
                Value::Array(items) => Test::In(items.clone()),
                _ => return Err(CoreError::invalid_predicate("IN needs an array value")),
            },
            Operator::Between => match value.as_array() {
                Some([low, high]) => Test::Between(low.clone(), high.clone()),
                _ => {
                    return Err(CoreError::invalid_predicate(
                        "BETWEEN needs a two-element array",
                    ))
                }
            },
            Operator::IsNull => Test::Null(true),
            Operator::IsNotNull => Test::Null(false),
            Operator::Like | Operator::Regexp => {
                let text = value.as_text().ok_or_else(|| {
                    CoreError::invalid_predicate(format!("{op} needs a text pattern"))
                })?;
                let source = if op == Operator::Like {
                    like_to_regex(text)
                } else {
                    text.to_string()
                };
                let re = Regex::new(&source)
                    .map_err(|e| CoreError::invalid_predicate(format!("bad pattern '{text}': {e}")))?;
                Test::Pattern(re)
            }
            other => Test::Cmp(other, value.clone()),
        })
    }

    fn eval(&self, actual: Option<&Value>) -> bool {
        let null = Value::Null;
        match self {
            Test::Null(want_null) => actual.map_or(true, Value::is_null) == *want_null,
            Test::Cmp(Operator::Is, v) => equal(actual.unwrap_or(&null), v),
            Test::Cmp(Operator::IsNot, v) => !equal(actual.unwrap_or(&null), v),
            Test::Cmp(op, v) => {
                let Some(actual) = actual else {
                    return false;
                };
                match (op, actual.compare(v)) {
                    (Operator::Ne, ord) => ord != Some(Ordering::Equal),
                    (_, None) => false,
                    (Operator::Eq, Some(o)) => o == Ordering::Equal,
                    (Operator::Gt, Some(o)) => o == Ordering::Greater,
                    (Operator::Ge, Some(o)) => o != Ordering::Less,
                    (Operator::Lt, Some(o)) => o == Ordering::Less,
                    (Operator::Le, Some(o)) => o != Ordering::Greater,
                    _ => false,
                }
            }
            Test::In(items) => actual.is_some_and(|a| items.iter().any(|v| equal(a, v))),
            Test::Between(low, high) => actual.is_some_and(|a| {
                matches!(a.compare(low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(a.compare(high), Some(Ordering::Less | Ordering::Equal))
            }),
            Test::Pattern(re) => actual
                .and_then(Value::to_text)
                .is_some_and(|text| re.is_match(&text)),
        }
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    a.compare(b) == Some(Ordering::Equal)
}

/// A compiled predicate.
#[derive(Debug)]
pub struct Matcher {
    fields: Vec<String>,
    root: Node,
}

impl Matcher {
    /// Field paths read by the predicate.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Evaluates against a record's value tree.
    #[must_use]
    pub fn matches(&self, record: &Value) -> bool {
        let values: HashMap<&str, Option<&Value>> = self
            .fields
            .iter()
            .map(|f| (f.as_str(), record.path(f)))
            .collect();
        self.root.eval(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Value {
        Value::map([
            ("external_id", Value::from("I0007")),
            ("change", Value::from(1_700_000_000i64)),
            ("private", Value::from(false)),
            ("place", Value::Null),
            (
                "primary_name",
                Value::map([
                    ("first_name", Value::from("Karin")),
                    ("surname_list", Value::Array(vec![Value::map([("surname", Value::from("Månsdotter"))])])),
                ]),
            ),
        ])
    }

    fn check(p: Predicate) -> bool {
        p.compile().unwrap().matches(&record())
    }

    #[test]
    fn comparisons() {
        assert!(check(Predicate::eq("external_id", "I0007")));
        assert!(!check(Predicate::eq("external_id", "I0008")));
        assert!(check(Predicate::compare("change", Operator::Gt, 1_600_000_000i64)));
        assert!(check(Predicate::compare("change", Operator::Le, 1_700_000_000i64)));
        assert!(!check(Predicate::compare("change", Operator::Lt, 1_700_000_000i64)));
        assert!(check(Predicate::compare("change", Operator::Ne, 5i64)));
        assert!(check(Predicate::compare("change", Operator::Ge, 1.5e9)));
    }

    #[test]
    fn missing_fields_fail_comparisons_but_are_null() {
        assert!(!check(Predicate::eq("nickname", "x")));
        assert!(check(Predicate::is_null("nickname")));
        assert!(check(Predicate::is_null("place")));
        assert!(check(Predicate::compare("private", Operator::IsNotNull, Value::Null)));
        assert!(check(Predicate::compare("nickname", Operator::Is, Value::Null)));
        assert!(check(Predicate::compare("private", Operator::IsNot, Value::Null)));
    }

    #[test]
    fn in_and_between() {
        assert!(check(Predicate::is_in("external_id", ["I0001", "I0007"])));
        assert!(!check(Predicate::is_in("external_id", ["I0001"])));
        assert!(check(Predicate::between("change", 1_000_000_000i64, 2_000_000_000i64)));
        assert!(!check(Predicate::between("change", 0i64, 10i64)));
    }

    #[test]
    fn like_translates_wildcards() {
        assert_eq!(like_to_regex("I00_%"), "^I00..*$");
        assert!(check(Predicate::like("external_id", "I00%")));
        assert!(check(Predicate::like("external_id", "I_007")));
        assert!(!check(Predicate::like("external_id", "I00")));
        assert!(check(Predicate::like("primary_name.surname_list.0.surname", "M%dotter")));
        // Regex metacharacters in LIKE patterns are literal.
        assert!(!check(Predicate::like("external_id", "I.*")));
    }

    #[test]
    fn regexp_searches_anywhere() {
        assert!(check(Predicate::compare("primary_name.first_name", Operator::Regexp, "ar")));
        assert!(!check(Predicate::compare("primary_name.first_name", Operator::Regexp, "^ar")));
    }

    #[test]
    fn connectives() {
        let p = Predicate::eq("external_id", "I0007").and(Predicate::like("primary_name.first_name", "K%"));
        assert!(check(p.clone()));
        assert!(!check(p.negate()));
        assert!(check(Predicate::eq("external_id", "nope").or(Predicate::is_null("place"))));
        assert!(check(Predicate::And(vec![])));
        assert!(!check(Predicate::Or(vec![])));
        assert!(check(Predicate::connective("not", vec![Predicate::eq("private", true)]).unwrap()));
        assert!(Predicate::connective("XOR", vec![]).is_err());
        assert!(Predicate::connective("NOT", vec![]).is_err());
    }

    #[test]
    fn fields_are_gathered_once() {
        let p = Predicate::eq("a", 1i64).and(Predicate::eq("b", 2i64)).or(Predicate::eq("a", 3i64));
        assert_eq!(p.fields(), vec!["a", "b"]);
    }

    #[test]
    fn operators_parse() {
        assert_eq!("is  not null".parse::<Operator>().unwrap(), Operator::IsNotNull);
        assert_eq!("<>".parse::<Operator>().unwrap(), Operator::Ne);
        assert_eq!("regexp".parse::<Operator>().unwrap(), Operator::Regexp);
        assert!("~=".parse::<Operator>().is_err());
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(Predicate::compare("a", Operator::In, 1i64).compile().is_err());
        assert!(Predicate::compare("a", Operator::Between, Value::Array(vec![])).compile().is_err());
        assert!(Predicate::compare("a", Operator::Regexp, "(").compile().is_err());
    }
}
