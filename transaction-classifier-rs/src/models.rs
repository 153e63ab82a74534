//! Domain records and label vocabularies

use serde::{Deserialize, Serialize};

/// A label that is either `""` (no match) or an exact vocabulary member
pub type ValidatedLabel = String;

/// A financial transaction to be labelled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    /// Unique within one batch
    pub id: String,

    pub description: String,

    /// Signed decimal amount, kept as written so no precision is lost
    pub amount: String,

    /// Transaction date, ideally ISO-8601
    pub date: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_account: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ClassificationRecord {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        amount: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            amount: amount.into(),
            date: date.into(),
            source_account: None,
            destination_account: None,
            notes: None,
        }
    }

    pub fn with_source_account(mut self, account: impl Into<String>) -> Self {
        self.source_account = Some(account.into());
        self
    }

    pub fn with_destination_account(mut self, account: impl Into<String>) -> Self {
        self.destination_account = Some(account.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Ordered set of allowed labels for one label space
///
/// Blank entries are dropped and duplicates removed, keeping the first
/// occurrence. The "no match" sentinel `""` is implicit and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    labels: Vec<String>,
}

impl Vocabulary {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into().trim().to_string();
            if !label.is_empty() && !unique.contains(&label) {
                unique.push(label);
            }
        }
        Self { labels: unique }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Exact, case-sensitive membership
    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.labels.iter()
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(labels: Vec<String>) -> Self {
        Self::new(labels)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.labels
    }
}

impl<S: Into<String>> FromIterator<S> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a Vocabulary {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_drops_blanks_and_duplicates() {
        let vocabulary = Vocabulary::new(["Food", "", "  ", "Medical", "Food", " Shopping "]);
        assert_eq!(vocabulary.as_slice(), ["Food", "Medical", "Shopping"]);
        assert!(vocabulary.contains("Shopping"));
        assert!(!vocabulary.contains("food"));
    }

    #[test]
    fn test_vocabulary_deserializes_from_list() {
        let vocabulary: Vocabulary = serde_json::from_str(r#"["Rent", "Rent", "Fun"]"#).unwrap();
        assert_eq!(vocabulary.len(), 2);
    }

    #[test]
    fn test_record_optional_fields_are_skipped() {
        let record = ClassificationRecord::new("t1", "Coffee", "4.50", "2024-03-01").with_notes("latte");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["notes"], "latte");
        assert!(json.get("source_account").is_none());
    }

    #[test]
    fn test_record_amount_is_a_decimal_string() {
        let record: ClassificationRecord = serde_json::from_str(
            r#"{"id":"t1","description":"Pharmacy","amount":"12.50","date":"2024-03-01"}"#,
        )
        .unwrap();
        assert_eq!(record.amount, "12.50");
        assert!(record.notes.is_none());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["amount"], "12.50");
    }
}
