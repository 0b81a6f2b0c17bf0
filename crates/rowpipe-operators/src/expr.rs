//! Comparison expressions and a tiny predicate parser.
//!
//! Supports predicates of the form "selector OP operand" where
//! OP ∈ {=, ==, !=, <>, <, <=, >, >=} and the operand is a literal, a
//! `@param`, or another column. Any NULL operand makes the comparison a
//! NULL boolean rather than `false`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rowpipe_core::prelude::*;
use rowpipe_core::schema::encode_selector;

use crate::traits::ValueExp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn apply(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

fn check_type(expected: SqlValueType, found: SqlValueType) -> Result<()> {
    if found == expected || found == SqlValueType::Any {
        Ok(())
    } else {
        Err(Error::TypeMismatch { expected, found })
    }
}

fn is_numeric(t: SqlValueType) -> bool {
    matches!(t, SqlValueType::Integer | SqlValueType::Float)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal(pub Value);

impl ValueExp for Literal {
    fn infer_type(
        &self,
        _cols: &HashMap<String, ColDescriptor>,
        _params: &mut ParamTypes,
        _implicit_table: &str,
    ) -> Result<SqlValueType> {
        Ok(self.0.value_type())
    }

    fn requires_type(
        &self,
        t: SqlValueType,
        _cols: &HashMap<String, ColDescriptor>,
        _params: &mut ParamTypes,
        _implicit_table: &str,
    ) -> Result<()> {
        check_type(t, self.0.value_type())
    }

    fn substitute(&self, _params: &Params) -> Result<Arc<dyn ValueExp>> {
        Ok(Arc::new(self.clone()))
    }

    fn reduce(&self, _tx: Option<&TxContext>, _row: &Row, _implicit_table: &str) -> Result<Value> {
        Ok(self.0.clone())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::Null(_) => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Varchar(s) => write!(f, "'{}'", s),
            Value::Blob(b) => write!(f, "x'{}'", b.iter().map(|x| format!("{:02x}", x)).collect::<String>()),
        }
    }
}

/// Named runtime parameter (`@name`). Must be bound before evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ValueExp for Param {
    fn infer_type(
        &self,
        _cols: &HashMap<String, ColDescriptor>,
        params: &mut ParamTypes,
        _implicit_table: &str,
    ) -> Result<SqlValueType> {
        Ok(params.get(&self.name).copied().unwrap_or(SqlValueType::Any))
    }

    fn requires_type(
        &self,
        t: SqlValueType,
        _cols: &HashMap<String, ColDescriptor>,
        params: &mut ParamTypes,
        _implicit_table: &str,
    ) -> Result<()> {
        match params.get(&self.name).copied() {
            Some(existing) if existing != t && existing != SqlValueType::Any => {
                Err(Error::TypeMismatch {
                    expected: t,
                    found: existing,
                })
            }
            _ => {
                params.insert(self.name.clone(), t);
                Ok(())
            }
        }
    }

    fn substitute(&self, params: &Params) -> Result<Arc<dyn ValueExp>> {
        let value = params
            .get(&self.name)
            .cloned()
            .ok_or_else(|| Error::ParamNotFound(self.name.clone()))?;
        Ok(Arc::new(Literal(value)))
    }

    fn reduce(&self, _tx: Option<&TxContext>, _row: &Row, _implicit_table: &str) -> Result<Value> {
        Err(Error::ParamNotFound(self.name.clone()))
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}

/// Column reference; an absent table resolves against the implicit table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: Option<&str>, column: impl Into<String>) -> Self {
        Self {
            table: table.map(str::to_string),
            column: column.into(),
        }
    }

    fn selector(&self, implicit_table: &str) -> String {
        encode_selector(self.table.as_deref().unwrap_or(implicit_table), &self.column)
    }
}

impl ValueExp for ColumnRef {
    fn infer_type(
        &self,
        cols: &HashMap<String, ColDescriptor>,
        _params: &mut ParamTypes,
        implicit_table: &str,
    ) -> Result<SqlValueType> {
        let sel = self.selector(implicit_table);
        cols.get(&sel)
            .map(|c| c.value_type)
            .ok_or(Error::ColumnNotFound(sel))
    }

    fn requires_type(
        &self,
        t: SqlValueType,
        cols: &HashMap<String, ColDescriptor>,
        params: &mut ParamTypes,
        implicit_table: &str,
    ) -> Result<()> {
        let own = self.infer_type(cols, params, implicit_table)?;
        check_type(t, own)
    }

    fn substitute(&self, _params: &Params) -> Result<Arc<dyn ValueExp>> {
        Ok(Arc::new(self.clone()))
    }

    fn reduce(&self, _tx: Option<&TxContext>, row: &Row, implicit_table: &str) -> Result<Value> {
        let sel = self.selector(implicit_table);
        row.values_by_selector
            .get(&sel)
            .cloned()
            .ok_or(Error::ColumnNotFound(sel))
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(t) => write!(f, "{}.{}", t, self.column),
            None => f.write_str(&self.column),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub op: CmpOp,
    pub left: Arc<dyn ValueExp>,
    pub right: Arc<dyn ValueExp>,
}

impl Comparison {
    pub fn new(op: CmpOp, left: Arc<dyn ValueExp>, right: Arc<dyn ValueExp>) -> Self {
        Self { op, left, right }
    }
}

impl ValueExp for Comparison {
    fn infer_type(
        &self,
        cols: &HashMap<String, ColDescriptor>,
        params: &mut ParamTypes,
        implicit_table: &str,
    ) -> Result<SqlValueType> {
        let lt = self.left.infer_type(cols, params, implicit_table)?;
        let rt = self.right.infer_type(cols, params, implicit_table)?;

        match (lt, rt) {
            (SqlValueType::Any, SqlValueType::Any) => {}
            (SqlValueType::Any, t) => self.left.requires_type(t, cols, params, implicit_table)?,
            (t, SqlValueType::Any) => self.right.requires_type(t, cols, params, implicit_table)?,
            (l, r) if l == r || (is_numeric(l) && is_numeric(r)) => {}
            (l, r) => {
                return Err(Error::TypeMismatch {
                    expected: l,
                    found: r,
                })
            }
        }

        Ok(SqlValueType::Boolean)
    }

    fn requires_type(
        &self,
        t: SqlValueType,
        cols: &HashMap<String, ColDescriptor>,
        params: &mut ParamTypes,
        implicit_table: &str,
    ) -> Result<()> {
        if t != SqlValueType::Boolean {
            return Err(Error::TypeMismatch {
                expected: t,
                found: SqlValueType::Boolean,
            });
        }
        self.infer_type(cols, params, implicit_table).map(|_| ())
    }

    fn substitute(&self, params: &Params) -> Result<Arc<dyn ValueExp>> {
        Ok(Arc::new(Comparison {
            op: self.op,
            left: self.left.substitute(params)?,
            right: self.right.substitute(params)?,
        }))
    }

    fn reduce(&self, tx: Option<&TxContext>, row: &Row, implicit_table: &str) -> Result<Value> {
        let l = self.left.reduce(tx, row, implicit_table)?;
        let r = self.right.reduce(tx, row, implicit_table)?;

        if l.is_null() || r.is_null() {
            return Ok(Value::Null(SqlValueType::Boolean));
        }

        let ord = l.compare(&r).ok_or(Error::TypeMismatch {
            expected: l.value_type(),
            found: r.value_type(),
        })?;
        Ok(Value::Bool(self.op.apply(ord)))
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.left, self.op, self.right)
    }
}

/// Parse a simple predicate like "val > 18", "t1.name = 'Alice'" or "val >= @min".
pub fn parse_predicate(expr: &str) -> Result<Comparison> {
    // Two-char operators first so "<=" is not read as "<".
    const OPS: [(&str, CmpOp); 8] = [
        ("==", CmpOp::Eq),
        ("!=", CmpOp::Ne),
        ("<>", CmpOp::Ne),
        ("<=", CmpOp::Le),
        (">=", CmpOp::Ge),
        ("<", CmpOp::Lt),
        (">", CmpOp::Gt),
        ("=", CmpOp::Eq),
    ];

    for (tok, op) in OPS {
        if let Some(pos) = expr.find(tok) {
            let left = parse_column(expr[..pos].trim())?;
            let right = parse_operand(expr[pos + tok.len()..].trim())?;
            return Ok(Comparison::new(op, Arc::new(left), right));
        }
    }

    Err(Error::Parse(format!("unparseable predicate: {}", expr)))
}

fn parse_column(s: &str) -> Result<ColumnRef> {
    let valid = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_alphanumeric() || c == '_');
    match s.split_once('.') {
        Some((t, c)) if valid(t) && valid(c) => Ok(ColumnRef::new(Some(t), c)),
        None if valid(s) => Ok(ColumnRef::new(None, s)),
        _ => Err(Error::Parse(format!("invalid column selector '{}'", s))),
    }
}

fn parse_operand(s: &str) -> Result<Arc<dyn ValueExp>> {
    if s.is_empty() {
        return Err(Error::Parse("missing right-hand operand".into()));
    }
    if let Some(name) = s.strip_prefix('@') {
        if name.is_empty() {
            return Err(Error::Parse("empty parameter name".into()));
        }
        return Ok(Arc::new(Param::new(name)));
    }
    if s.eq_ignore_ascii_case("null") {
        return Ok(Arc::new(Literal(Value::Null(SqlValueType::Any))));
    }
    if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
        return Ok(Arc::new(Literal(Value::Bool(s.eq_ignore_ascii_case("true")))));
    }
    if let Some(inner) = s.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        return Ok(Arc::new(Literal(Value::Varchar(inner.to_string()))));
    }
    if let Ok(i) = s.parse::<i64>() {
        return Ok(Arc::new(Literal(Value::Integer(i))));
    }
    if let Ok(x) = s.parse::<f64>() {
        return Ok(Arc::new(Literal(Value::Float(x))));
    }
    Ok(Arc::new(parse_column(s)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Vec<ColDescriptor> {
        vec![
            ColDescriptor::new("t1", "val", SqlValueType::Integer),
            ColDescriptor::new("t1", "name", SqlValueType::Varchar),
        ]
    }

    fn by_selector() -> HashMap<String, ColDescriptor> {
        cols().into_iter().map(|c| (c.selector(), c)).collect()
    }

    fn row(val: Value, name: &str) -> Row {
        Row::new(&cols(), vec![val, Value::Varchar(name.into())])
    }

    #[test]
    fn test_parse_and_reduce_ops() {
        let r = row(Value::Integer(10), "a");
        let cases = [
            ("val > 5", true),
            ("val >= 10", true),
            ("val < 10", false),
            ("val <= 9", false),
            ("val = 10", true),
            ("val == 11", false),
            ("val != 11", true),
            ("val <> 10", false),
            ("t1.name = 'a'", true),
            ("val > 9.5", true),
        ];
        for (src, expected) in cases {
            let pred = parse_predicate(src).unwrap();
            assert_eq!(
                pred.reduce(None, &r, "t1").unwrap(),
                Value::Bool(expected),
                "predicate {}",
                src
            );
        }
    }

    #[test]
    fn test_null_operand_yields_null_boolean() {
        let pred = parse_predicate("val > 5").unwrap();
        let r = row(Value::Null(SqlValueType::Integer), "a");
        assert_eq!(
            pred.reduce(None, &r, "t1").unwrap(),
            Value::Null(SqlValueType::Boolean)
        );
    }

    #[test]
    fn test_param_binding() {
        let pred = parse_predicate("val >= @min").unwrap();
        let r = row(Value::Integer(3), "a");

        // Unbound parameters cannot be evaluated.
        assert!(matches!(
            pred.reduce(None, &r, "t1"),
            Err(Error::ParamNotFound(_))
        ));
        assert!(matches!(
            pred.substitute(&Params::new()),
            Err(Error::ParamNotFound(_))
        ));

        let mut params = Params::new();
        params.insert("min".into(), Value::Integer(3));
        let bound = pred.substitute(&params).unwrap();
        assert_eq!(bound.reduce(None, &r, "t1").unwrap(), Value::Bool(true));
        assert_eq!(bound.to_string(), "(val >= 3)");
    }

    #[test]
    fn test_infer_records_param_type() {
        let pred = parse_predicate("val < @max").unwrap();
        let mut params = ParamTypes::new();
        pred.requires_type(SqlValueType::Boolean, &by_selector(), &mut params, "t1")
            .unwrap();
        assert_eq!(params.get("max"), Some(&SqlValueType::Integer));

        assert!(matches!(
            pred.requires_type(SqlValueType::Integer, &by_selector(), &mut params, "t1"),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_infer_rejects_bad_columns_and_types() {
        let mut params = ParamTypes::new();
        let missing = parse_predicate("nope = 1").unwrap();
        assert!(matches!(
            missing.infer_type(&by_selector(), &mut params, "t1"),
            Err(Error::ColumnNotFound(_))
        ));

        let mismatch = parse_predicate("name > 3").unwrap();
        assert!(matches!(
            mismatch.infer_type(&by_selector(), &mut params, "t1"),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_predicate("val"), Err(Error::Parse(_))));
        assert!(matches!(parse_predicate(" > 3"), Err(Error::Parse(_))));
        assert!(matches!(parse_predicate("val > @"), Err(Error::Parse(_))));
    }
}
