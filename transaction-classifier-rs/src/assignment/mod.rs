//! Label assignment for one label space
//!
//! An `AssignmentService` turns a batch of records into one validated label
//! per record. It never fails on transient or content problems: those are
//! logged and the whole batch degrades to the "no match" label. Only fatal
//! errors (authentication, authorization, configuration) reach the caller.

pub mod prompt;

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::client::ResilientClient;
use crate::core::CallOptions;
use crate::error::{ClassifierError, Result};
use crate::models::{ClassificationRecord, ValidatedLabel, Vocabulary};
use crate::validation::{EmptyResponsePolicy, ResponseValidator};

/// The label spaces the pipeline assigns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelSpace {
    Category,
    Budget,
}

impl LabelSpace {
    pub fn name(&self) -> &'static str {
        match self {
            LabelSpace::Category => "category",
            LabelSpace::Budget => "budget",
        }
    }

    /// Function the model is forced to call
    pub fn function_name(&self) -> &'static str {
        match self {
            LabelSpace::Category => "assign_category",
            LabelSpace::Budget => "assign_budget",
        }
    }

    /// Argument carrying the label
    pub fn property_name(&self) -> &'static str {
        self.name()
    }

    /// An empty answer is "no budget" for budgets and a failure for categories
    pub fn empty_policy(&self) -> EmptyResponsePolicy {
        match self {
            LabelSpace::Category => EmptyResponsePolicy::Reject,
            LabelSpace::Budget => EmptyResponsePolicy::NoMatch,
        }
    }
}

impl fmt::Display for LabelSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Assigns labels of one space through a shared `ResilientClient`
#[derive(Clone)]
pub struct AssignmentService {
    client: Arc<ResilientClient>,
    space: LabelSpace,
    validator: ResponseValidator,
    options: Option<CallOptions>,
}

impl AssignmentService {
    pub fn new(client: Arc<ResilientClient>, space: LabelSpace) -> Self {
        Self {
            client,
            space,
            validator: ResponseValidator::default(),
            options: None,
        }
    }

    pub fn category(client: Arc<ResilientClient>) -> Self {
        Self::new(client, LabelSpace::Category)
    }

    pub fn budget(client: Arc<ResilientClient>) -> Self {
        Self::new(client, LabelSpace::Budget)
    }

    pub fn with_validator(mut self, validator: ResponseValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Per-call overrides passed to every model call of this service
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn space(&self) -> LabelSpace {
        self.space
    }

    /// One label per record, in record order
    pub async fn assign(
        &self,
        records: &[ClassificationRecord],
        vocabulary: &Vocabulary,
    ) -> Result<Vec<ValidatedLabel>> {
        self.assign_with_context(records, vocabulary, None).await
    }

    /// Like `assign`, adding one context label per record to the prompt
    #[tracing::instrument(skip_all, fields(space = %self.space, records = records.len()))]
    pub async fn assign_with_context(
        &self,
        records: &[ClassificationRecord],
        vocabulary: &Vocabulary,
        context: Option<&[String]>,
    ) -> Result<Vec<ValidatedLabel>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(context) = context {
            if context.len() != records.len() {
                return Err(ClassifierError::configuration(format!(
                    "{} context labels supplied for {} records",
                    context.len(),
                    records.len()
                )));
            }
        }

        if vocabulary.is_empty() {
            debug!("Empty {} vocabulary, skipping model calls", self.space);
            return Ok(vec![String::new(); records.len()]);
        }

        match self.request_labels(records, vocabulary, context).await {
            Ok(labels) => Ok(labels),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
                warn!(
                    "{} assignment degraded to no match for records {:?}: {} (vocabulary: {:?})",
                    self.space,
                    ids,
                    err,
                    vocabulary.as_slice()
                );
                Ok(vec![String::new(); records.len()])
            }
        }
    }

    async fn request_labels(
        &self,
        records: &[ClassificationRecord],
        vocabulary: &Vocabulary,
        context: Option<&[String]>,
    ) -> Result<Vec<ValidatedLabel>> {
        let requests = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let label = context.and_then(|c| c.get(index)).map(String::as_str);
                prompt::build_request(self.space, record, vocabulary, label)
            })
            .collect();

        let raws = self.client.classify(requests, self.options.clone()).await?;
        let property = self.space.property_name();
        let policy = self.space.empty_policy();

        self.validator.validate_batch(&raws, |raw| {
            self.validator
                .validate_one(&prompt::extract_label(raw, property), vocabulary, policy)
        })
    }
}
