//! Relationship mirroring across the two subgraphs.
//!
//! A discovered relationship is written twice in one transaction: once
//! between the original nodes and once between their abstracted twins.
//! Endpoints resolve through the session's pair index, so a mirrored
//! edge can never cross from one subgraph into the other.

use std::sync::Arc;

use doppel_graph::{
    with_retry, GraphError, GraphStore, RelDraft, RelId, RelType, RetryPolicy, WriteBatch,
};
use serde::Serialize;

use crate::descriptor::RelationshipFact;
use crate::error::IngestError;
use crate::rewrite::rewrite_identifiers;
use crate::session::ScanSession;

/// Outcome of mirroring one relationship fact.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LinkReceipt {
    /// Edge between the original nodes.
    pub original_rel: RelId,
    /// Edge between the abstracted twins.
    pub abstracted_rel: RelId,
    /// True when this write created the mirrored pair.
    pub created: bool,
}

/// Duplicates relationships so both subgraphs stay isomorphic.
pub struct RelationshipDuplicator {
    store: Arc<dyn GraphStore>,
    session: Arc<ScanSession>,
    policy: RetryPolicy,
}

impl RelationshipDuplicator {
    /// Build a duplicator over a store and an open scan session.
    pub fn new(store: Arc<dyn GraphStore>, session: Arc<ScanSession>) -> Self {
        Self {
            store,
            session,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy used for store commits.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Mirror one relationship into both subgraphs atomically.
    ///
    /// Both endpoints must already have node pairs in this session,
    /// either written by a [`DualNodeWriter`](crate::DualNodeWriter) or
    /// hydrated on resume. Identifier-bearing relationship properties
    /// are abstracted on the mirrored edge.
    ///
    /// # Errors
    ///
    /// [`IngestError::ReservedRelationshipType`] for the provenance
    /// type, [`IngestError::UnknownResource`] for an endpoint without a
    /// pair, [`IngestError::Graph`] when the commit fails.
    pub async fn link(&self, fact: RelationshipFact) -> Result<LinkReceipt, IngestError> {
        let rel_type = RelType::from(fact.rel_type.as_str());
        if rel_type.is_provenance() {
            return Err(IngestError::ReservedRelationshipType {
                rel_type: fact.rel_type,
            });
        }

        let pairs = self.session.pairs();
        let source = pairs
            .get(&fact.source_id)
            .ok_or_else(|| IngestError::UnknownResource {
                resource_id: fact.source_id.clone(),
            })?;
        let target = pairs
            .get(&fact.target_id)
            .ok_or_else(|| IngestError::UnknownResource {
                resource_id: fact.target_id.clone(),
            })?;

        let abstracted_props =
            rewrite_identifiers(self.session.abstractor(), fact.properties.clone());

        let mut batch = WriteBatch::new(self.session.tenant(), self.session.layer().clone());
        let original = batch.upsert_relationship(RelDraft::new(
            rel_type.clone(),
            source.original_node,
            target.original_node,
            fact.properties,
        ));
        let abstracted = batch.upsert_relationship(RelDraft::new(
            rel_type.clone(),
            source.abstracted_node,
            target.abstracted_node,
            abstracted_props,
        ));

        let receipt = with_retry(&self.policy, "link_relationship", || {
            let store = Arc::clone(&self.store);
            let batch = batch.clone();
            async move { store.apply(batch).await }
        })
        .await?;

        let original_rel = receipt
            .effective_relationship(original)
            .ok_or_else(|| missing_entry("original relationship"))?;
        let abstracted_rel = receipt
            .effective_relationship(abstracted)
            .ok_or_else(|| missing_entry("abstracted relationship"))?;
        let created = receipt.relationships_created() > 0;

        tracing::debug!(
            rel_type = %rel_type,
            source = %fact.source_id,
            target = %fact.target_id,
            created,
            "mirrored relationship committed"
        );

        Ok(LinkReceipt {
            original_rel,
            abstracted_rel,
            created,
        })
    }
}

fn missing_entry(what: &str) -> IngestError {
    IngestError::Graph(GraphError::Transaction {
        attempts: 1,
        reason: format!("commit receipt missing {what} entry"),
        retryable: false,
    })
}
