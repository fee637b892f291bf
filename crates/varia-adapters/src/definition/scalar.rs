//! Scalar typing shared by the path-query backends.
//!
//! Values arrive as text. An attribute that already exists keeps its kind
//! when the new text parses as that kind; anything else is inferred in the
//! order bool, integer, float, string.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScalarKind {
    Bool,
    Integer,
    Float,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub(crate) fn infer(raw: &str) -> Self {
        if let Ok(b) = raw.parse::<bool>() {
            return Self::Bool(b);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Integer(i);
        }
        match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => Self::Float(f),
            _ => Self::Text(raw.to_string()),
        }
    }

    /// Parse `raw` as `kind`, falling back to inference when it does not fit.
    pub(crate) fn coerce(raw: &str, kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Text => Self::Text(raw.to_string()),
            ScalarKind::Bool => raw.parse().map(Self::Bool).unwrap_or_else(|_| Self::infer(raw)),
            ScalarKind::Integer => raw
                .parse()
                .map(Self::Integer)
                .unwrap_or_else(|_| Self::infer(raw)),
            ScalarKind::Float => match raw.parse::<f64>() {
                Ok(f) if f.is_finite() => Self::Float(f),
                _ => Self::infer(raw),
            },
        }
    }
}
