//! Atomic dual writes: one original node, one abstracted twin, one
//! provenance edge, committed together or not at all.

use std::sync::Arc;

use doppel_graph::{
    with_retry, GraphError, GraphStore, NodeDraft, NodeId, NodeKind, RelDraft, RetryPolicy,
    WriteBatch,
};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use doppel_abstract::AbstractedId;

use crate::descriptor::ResourceDescriptor;
use crate::error::IngestError;
use crate::rewrite::rewrite_identifiers;
use crate::screen::{screen_properties, RejectedProperty};
use crate::session::{PairEntry, ScanSession};

/// Upper bound on in-flight dual writes during a batch ingest.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Outcome of a single dual write.
#[derive(Debug, Clone, Serialize)]
pub struct PairReceipt {
    /// Customer-facing identifier the pair was written for.
    pub resource_id: String,
    /// Token the abstracted twin is keyed by.
    pub abstracted_id: AbstractedId,
    /// Effective id of the original node.
    pub original_node: NodeId,
    /// Effective id of the abstracted node.
    pub abstracted_node: NodeId,
    /// True when this write created the pair, false on a re-scan upsert.
    pub created: bool,
    /// Properties dropped by the injection screen before the write.
    pub rejected_properties: Vec<RejectedProperty>,
}

/// Per-descriptor result of a batch ingest.
#[derive(Debug)]
pub struct ItemOutcome {
    /// Resource id of the descriptor this outcome belongs to.
    pub resource_id: String,
    /// The write's receipt or the error that kept it out.
    pub result: Result<PairReceipt, IngestError>,
}

/// Collected outcomes of [`DualNodeWriter::write_batch`]. Items fail
/// independently; one poisoned descriptor never blocks its siblings.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One outcome per submitted descriptor, in completion order.
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    /// Number of writes that landed.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Number of writes that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Whether every item landed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Receipts of the writes that landed.
    pub fn receipts(&self) -> impl Iterator<Item = &PairReceipt> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Resource ids paired with the errors that kept them out.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &IngestError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.resource_id.as_str(), e)))
    }
}

/// Writes Original/Abstracted node pairs into a scan session's layer.
///
/// Every resource becomes three operations in a single batch: the
/// original node, its abstracted twin, and the `SCAN_SOURCE_NODE` edge
/// from twin to original. The store applies the batch atomically, so a
/// failure can never strand a node without its counterpart.
pub struct DualNodeWriter {
    store: Arc<dyn GraphStore>,
    session: Arc<ScanSession>,
    policy: RetryPolicy,
    concurrency: usize,
}

impl DualNodeWriter {
    /// Build a writer over a store and an open scan session.
    pub fn new(store: Arc<dyn GraphStore>, session: Arc<ScanSession>) -> Self {
        Self {
            store,
            session,
            policy: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Replace the retry policy used for store commits.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bound the number of concurrent dual writes in a batch.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Write one resource as an atomic Original/Abstracted pair.
    ///
    /// Properties are screened for injection payloads first; rejected
    /// entries are dropped from both nodes and reported on the receipt.
    /// The abstracted twin carries the same property shape with
    /// identifier values replaced by derived tokens.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Graph`] when the store rejects the batch
    /// or retries are exhausted.
    pub async fn write_resource(
        &self,
        descriptor: ResourceDescriptor,
    ) -> Result<PairReceipt, IngestError> {
        let ResourceDescriptor {
            resource_id,
            resource_type,
            properties,
        } = descriptor;

        let (clean, rejected) = screen_properties(properties);
        for rejection in &rejected {
            tracing::warn!(
                resource = %resource_id,
                property = %rejection.name,
                reason = %rejection.reason,
                "dropped property at ingest screen"
            );
        }

        let abstractor = self.session.abstractor();
        let abstracted_id = abstractor.abstract_id(&resource_type, &resource_id);
        let abstracted_props = rewrite_identifiers(abstractor, clean.clone());

        let mut batch = WriteBatch::new(self.session.tenant(), self.session.layer().clone());
        let original = batch.upsert_node(NodeDraft::new(
            NodeKind::Original,
            &resource_id,
            &resource_type,
            clean,
        ));
        let abstracted = batch.upsert_node(NodeDraft::new(
            NodeKind::Abstracted,
            abstracted_id.as_str(),
            &resource_type,
            abstracted_props,
        ));
        batch.upsert_relationship(RelDraft::provenance(abstracted, original));

        let receipt = with_retry(&self.policy, "write_resource", || {
            let store = Arc::clone(&self.store);
            let batch = batch.clone();
            async move { store.apply(batch).await }
        })
        .await?;

        let original_node = receipt
            .effective_node(original)
            .ok_or_else(|| missing_entry("original node"))?;
        let abstracted_node = receipt
            .effective_node(abstracted)
            .ok_or_else(|| missing_entry("abstracted node"))?;
        let created = receipt.nodes_created() > 0;

        self.session.pairs().insert(
            resource_id.clone(),
            PairEntry {
                original_node,
                abstracted_node,
                abstracted_id: abstracted_id.clone(),
            },
        );

        tracing::debug!(
            resource = %resource_id,
            abstracted = %abstracted_id,
            created,
            "dual write committed"
        );

        Ok(PairReceipt {
            resource_id,
            abstracted_id,
            original_node,
            abstracted_node,
            created,
            rejected_properties: rejected,
        })
    }

    /// Ingest a batch of descriptors with bounded concurrency.
    ///
    /// Each descriptor commits in its own transaction; failures are
    /// collected per item rather than aborting the batch.
    pub async fn write_batch(&self, descriptors: Vec<ResourceDescriptor>) -> BatchReport {
        let total = descriptors.len();
        let outcomes = stream::iter(descriptors)
            .map(|descriptor| async move {
                let resource_id = descriptor.resource_id.clone();
                let result = self.write_resource(descriptor).await;
                ItemOutcome {
                    resource_id,
                    result,
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let report = BatchReport { outcomes };
        tracing::info!(
            total,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "ingest batch finished"
        );
        report
    }
}

fn missing_entry(what: &str) -> IngestError {
    IngestError::Graph(GraphError::Transaction {
        attempts: 1,
        reason: format!("commit receipt missing {what} entry"),
        retryable: false,
    })
}
