//! Tests for the Orchestrator
//!
//! A mock model answers by label space so both passes can be checked
//! together, including how they degrade and abort independently.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::core::{ClassifyRequest, MockCompletionProvider};
    use crate::error::ClassifierError;
    use crate::models::{ClassificationRecord, Vocabulary};
    use crate::orchestrator::{Orchestrator, RecordAssignment};
    use crate::tests::support::fast_client;

    fn records() -> Vec<ClassificationRecord> {
        vec![
            ClassificationRecord::new("t1", "Whole Foods Market", "84.20", "2024-05-02"),
            ClassificationRecord::new("t2", "CVS Pharmacy", "12.99", "2024-05-03"),
            ClassificationRecord::new("t3", "Amazon.com order", "45.00", "2024-05-04"),
        ]
    }

    fn categories() -> Vocabulary {
        Vocabulary::new(["Food", "Medical", "Shopping"])
    }

    fn budgets() -> Vocabulary {
        Vocabulary::new(["Groceries", "Health"])
    }

    fn function_name(request: &ClassifyRequest) -> &str {
        request.function.as_ref().map_or("", |f| f.name.as_str())
    }

    fn describes(request: &ClassifyRequest, needle: &str) -> bool {
        request.user_content().map_or(false, |c| c.contains(needle))
    }

    /// Categories by merchant; budgets for groceries and pharmacy only
    fn answer(request: &ClassifyRequest) -> String {
        let (category, budget) = if describes(request, "Whole Foods") {
            ("Food", "Groceries")
        } else if describes(request, "Pharmacy") {
            ("Medical", "Health")
        } else {
            ("Shopping", "")
        };

        match function_name(request) {
            "assign_category" => json!({ "category": category }).to_string(),
            _ => json!({ "budget": budget }).to_string(),
        }
    }

    fn orchestrator(mock: MockCompletionProvider) -> Orchestrator {
        Orchestrator::new(Arc::new(fast_client(Arc::new(mock))))
    }

    #[tokio::test]
    async fn test_merges_both_passes_sparsely() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .times(6)
            .returning(|request, _| Ok(answer(request)));

        let map = orchestrator(mock)
            .process_records(&records(), Some(&categories()), Some(&budgets()))
            .await
            .unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(
            map["t1"],
            RecordAssignment {
                category: Some("Food".to_string()),
                budget: Some("Groceries".to_string()),
            }
        );
        assert_eq!(map["t2"].budget.as_deref(), Some("Health"));
        assert_eq!(map["t3"].category.as_deref(), Some("Shopping"));
        assert_eq!(map["t3"].budget, None);
    }

    #[tokio::test]
    async fn test_empty_records_return_empty_map() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete().times(0);

        let map = orchestrator(mock)
            .process_records(&[], Some(&categories()), Some(&budgets()))
            .await
            .unwrap();

        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_only_requested_spaces_run() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .withf(|request, _| function_name(request) == "assign_category")
            .times(3)
            .returning(|request, _| Ok(answer(request)));

        let map = orchestrator(mock)
            .process_records(&records(), Some(&categories()), Some(&Vocabulary::default()))
            .await
            .unwrap();

        assert_eq!(map.len(), 3);
        assert!(map.values().all(|a| a.budget.is_none()));
    }

    #[tokio::test]
    async fn test_no_vocabularies_means_no_calls() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete().times(0);

        let map = orchestrator(mock)
            .process_records(&records(), None, None)
            .await
            .unwrap();

        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_pass_does_not_affect_the_other() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete().returning(|request, _| match function_name(request) {
            "assign_category" => Ok(json!({ "category": "Utilities" }).to_string()),
            _ => Ok(answer(request)),
        });

        let map = orchestrator(mock)
            .process_records(&records(), Some(&categories()), Some(&budgets()))
            .await
            .unwrap();

        assert_eq!(map.len(), 2);
        assert!(map.values().all(|a| a.category.is_none()));
        assert_eq!(map["t1"].budget.as_deref(), Some("Groceries"));
        assert!(!map.contains_key("t3"));
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_the_run() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete().returning(|request, _| match function_name(request) {
            "assign_budget" => Err(ClassifierError::authorization("model access denied")),
            _ => Ok(answer(request)),
        });

        let err = orchestrator(mock)
            .process_records(&records(), Some(&categories()), Some(&budgets()))
            .await
            .unwrap_err();

        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_budget_pass_sees_categories_when_enabled() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .withf(|request, _| function_name(request) == "assign_category")
            .times(3)
            .returning(|request, _| Ok(answer(request)));
        mock.expect_complete()
            .withf(|request, _| {
                function_name(request) == "assign_budget"
                    && ["Category: Food", "Category: Medical", "Category: Shopping"]
                        .iter()
                        .any(|needle| describes(request, needle))
            })
            .times(3)
            .returning(|request, _| Ok(answer(request)));

        let map = orchestrator(mock)
            .with_category_context(true)
            .process_records(&records(), Some(&categories()), Some(&budgets()))
            .await
            .unwrap();

        assert_eq!(map["t2"].budget.as_deref(), Some("Health"));
    }

    #[tokio::test]
    async fn test_duplicate_ids_fail_before_any_call() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete().times(0);

        let mut batch = records();
        batch[2].id = "t1".to_string();

        let err = orchestrator(mock)
            .process_records(&batch, Some(&categories()), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifierError::Configuration(_)));
    }
}
