//! Category and budget assignment for a batch of records
//!
//! The `Orchestrator` runs one `AssignmentService` per requested label space
//! and merges their outputs into a sparse map keyed by record id. A record
//! only appears when at least one requested space produced a label for it.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::assignment::AssignmentService;
use crate::client::ResilientClient;
use crate::config::ClassifierConfig;
use crate::core::CallOptions;
use crate::error::{ClassifierError, Result};
use crate::models::{ClassificationRecord, ValidatedLabel, Vocabulary};

/// Labels assigned to one record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAssignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
}

/// Record id to assigned labels
pub type AssignmentMap = BTreeMap<String, RecordAssignment>;

/// Top-level entry point of the pipeline
#[derive(Clone)]
pub struct Orchestrator {
    category: AssignmentService,
    budget: AssignmentService,
    budget_uses_category_context: bool,
}

impl Orchestrator {
    /// Both passes share `client`, and with it the rate limit and circuit
    pub fn new(client: Arc<ResilientClient>) -> Self {
        Self {
            category: AssignmentService::category(Arc::clone(&client)),
            budget: AssignmentService::budget(client),
            budget_uses_category_context: false,
        }
    }

    pub fn from_config(client: Arc<ResilientClient>, config: &ClassifierConfig) -> Self {
        Self::new(client).with_category_context(config.budget_uses_category_context)
    }

    /// Run the budget pass after the category pass, passing it the categories
    pub fn with_category_context(mut self, enabled: bool) -> Self {
        self.budget_uses_category_context = enabled;
        self
    }

    /// Per-call overrides for every model call of both passes
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.category = self.category.with_options(options.clone());
        self.budget = self.budget.with_options(options);
        self
    }

    /// Assign categories and budgets to `records`.
    ///
    /// A space is skipped when its vocabulary is absent or empty. Transient
    /// and content failures degrade that space to "no label"; fatal errors
    /// from either pass abort the run.
    #[tracing::instrument(skip_all, fields(records = records.len()))]
    pub async fn process_records(
        &self,
        records: &[ClassificationRecord],
        category_vocabulary: Option<&Vocabulary>,
        budget_vocabulary: Option<&Vocabulary>,
    ) -> Result<AssignmentMap> {
        if records.is_empty() {
            return Ok(AssignmentMap::new());
        }

        ensure_unique_ids(records)?;

        let category_vocabulary = category_vocabulary.filter(|v| !v.is_empty());
        let budget_vocabulary = budget_vocabulary.filter(|v| !v.is_empty());

        let (categories, budgets) = if self.budget_uses_category_context {
            let categories = run_pass(&self.category, records, category_vocabulary, None).await?;
            let budgets =
                run_pass(&self.budget, records, budget_vocabulary, categories.as_deref()).await?;
            (categories, budgets)
        } else {
            let (categories, budgets) = tokio::join!(
                run_pass(&self.category, records, category_vocabulary, None),
                run_pass(&self.budget, records, budget_vocabulary, None),
            );
            (categories?, budgets?)
        };

        let assignments = merge(records, categories, budgets);
        info!(
            "Assigned labels to {} of {} records",
            assignments.len(),
            records.len()
        );

        Ok(assignments)
    }
}

async fn run_pass(
    service: &AssignmentService,
    records: &[ClassificationRecord],
    vocabulary: Option<&Vocabulary>,
    context: Option<&[String]>,
) -> Result<Option<Vec<ValidatedLabel>>> {
    match vocabulary {
        Some(vocabulary) => service
            .assign_with_context(records, vocabulary, context)
            .await
            .map(Some),
        None => Ok(None),
    }
}

fn ensure_unique_ids(records: &[ClassificationRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id.as_str()) {
            return Err(ClassifierError::configuration(format!(
                "Duplicate record id {:?} in batch",
                record.id
            )));
        }
    }
    Ok(())
}

fn merge(
    records: &[ClassificationRecord],
    categories: Option<Vec<ValidatedLabel>>,
    budgets: Option<Vec<ValidatedLabel>>,
) -> AssignmentMap {
    let pick = |labels: &Option<Vec<ValidatedLabel>>, index: usize| {
        labels
            .as_ref()
            .and_then(|l| l.get(index))
            .filter(|label| !label.is_empty())
            .cloned()
    };

    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let assignment = RecordAssignment {
                category: pick(&categories, index),
                budget: pick(&budgets, index),
            };
            (assignment.category.is_some() || assignment.budget.is_some())
                .then(|| (record.id.clone(), assignment))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ClassificationRecord> {
        vec![
            ClassificationRecord::new("a", "Coffee", "3.00", "2024-01-01"),
            ClassificationRecord::new("b", "Rent", "900.00", "2024-01-01"),
            ClassificationRecord::new("c", "Refund", "-20.00", "2024-01-02"),
        ]
    }

    #[test]
    fn test_merge_is_sparse() {
        let categories = Some(vec!["Food".to_string(), "Housing".to_string(), String::new()]);
        let budgets = Some(vec![String::new(), "Bills".to_string(), String::new()]);

        let map = merge(&records(), categories, budgets);

        assert_eq!(map.len(), 2);
        assert_eq!(
            map["a"],
            RecordAssignment {
                category: Some("Food".to_string()),
                budget: None
            }
        );
        assert_eq!(map["b"].budget.as_deref(), Some("Bills"));
        assert!(!map.contains_key("c"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut batch = records();
        batch.push(ClassificationRecord::new("a", "Tea", "2.00", "2024-01-03"));
        assert!(ensure_unique_ids(&batch).unwrap_err().is_fatal());
        assert!(ensure_unique_ids(&records()).is_ok());
    }

    #[test]
    fn test_assignment_serializes_without_missing_spaces() {
        let assignment = RecordAssignment {
            category: Some("Food".to_string()),
            budget: None,
        };
        assert_eq!(
            serde_json::to_string(&assignment).unwrap(),
            r#"{"category":"Food"}"#
        );
    }
}
