//! The `testtype` record.

use serde::{Deserialize, Serialize};

use super::record::Record;

/// A record with one string and one integer field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestType {
    /// Free-form text, empty when unset.
    pub text: String,
    /// An integer, zero when unset.
    pub num: i64,
}

impl Record for TestType {
    const TYPE_NAME: &'static str = "testtype";
    type Fields = TestTypeFields;
}

/// Input for creating or replacing a [`TestType`].
///
/// A field left as `None` is omitted from the request and stored as its zero
/// value; `Some(0)` and `None` therefore store the same `num`, but callers can
/// still tell them apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTypeFields {
    /// New `text`, if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// New `num`, if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num: Option<i64>,
}

impl TestTypeFields {
    /// Sets `text`.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets `num`.
    pub fn num(mut self, num: i64) -> Self {
        self.num = Some(num);
        self
    }

    /// The record these fields describe, with omitted fields at zero.
    pub fn into_record(self) -> TestType {
        TestType {
            text: self.text.unwrap_or_default(),
            num: self.num.unwrap_or_default(),
        }
    }
}

impl From<TestType> for TestTypeFields {
    fn from(record: TestType) -> Self {
        Self {
            text: Some(record.text),
            num: Some(record.num),
        }
    }
}
