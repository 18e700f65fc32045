// src/selector/eval.rs

use std::borrow::Cow;

use crate::scene::{Attributes, Node, Value};
use crate::selector::parser::{Clause, Predicate};

/// Reserved key computed from a node's geometry payload.
pub const GEOM_TYPE_KEY: &str = "geom:type";

/// Anything a selector can be evaluated against.
pub trait AttributeSource {
    fn attribute(&self, key: &str) -> Option<Cow<'_, Value>>;
}

impl AttributeSource for Attributes {
    fn attribute(&self, key: &str) -> Option<Cow<'_, Value>> {
        self.get(key).map(Cow::Borrowed)
    }
}

impl AttributeSource for Node {
    fn attribute(&self, key: &str) -> Option<Cow<'_, Value>> {
        if key == GEOM_TYPE_KEY {
            return self
                .geom_type()
                .map(|t| Cow::Owned(Value::Str(t.as_str().to_string())));
        }
        self.attrs.attribute(key)
    }
}

/// Missing attributes never error: they simply fail positive clauses.
pub(crate) fn clause_holds<S: AttributeSource + ?Sized>(clause: &Clause, source: &S) -> bool {
    let value = source.attribute(&clause.key).filter(|v| !v.is_null());

    let holds = match (&clause.predicate, value) {
        (Predicate::Present, v) => v.is_some(),
        (_, None) => false,
        (Predicate::Equals(expected), Some(v)) => v.render() == *expected,
        (Predicate::Matches(re), Some(v)) => re.is_match(&v.render()),
    };

    holds != clause.negated
}
