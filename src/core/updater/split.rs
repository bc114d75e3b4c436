//! Edits spanning both projections of a record
//!
//! The two stores have no shared transaction. Each updater commits on its own
//! and the record key ties the two rows together, so a reader may briefly see
//! one store ahead of the other. Re-running an edit is safe: an unchanged
//! projection is a no-op.
//!
//! Identifying edits delete the de-identified export marker before the
//! identifying row is written. A failed edit can leave the record invalidated
//! without the new content, never the reverse.

use super::protocol::{Payload, Updater};
use crate::domain::{CurrentRow, DemoFlag, Projection, RecordLookup, Result, SplitStoreError};
use serde_json::Value;

/// Both current rows of one logical record
#[derive(Debug, Clone, PartialEq)]
pub struct SplitRecord<I, N, D = Value> {
    /// Row in the identifying store
    pub identifying: CurrentRow<I, D>,
    /// Row in the de-identified store
    pub deidentified: CurrentRow<N, D>,
}

/// Which projections an edit actually changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SplitChange {
    pub identifying: bool,
    pub deidentified: bool,
}

impl SplitChange {
    /// True if either store was written
    pub fn any(&self) -> bool {
        self.identifying || self.deidentified
    }
}

/// Coordinates one identifying and one de-identified [`Updater`]
///
/// Also owns the cross-store part of export invalidation: an accepted edit
/// of the identifying projection deletes the export marker of the correlated
/// de-identified row.
pub struct SplitRecordEditor<I, N, D = Value> {
    identifying: Updater<I, D>,
    deidentified: Updater<N, D>,
}

impl<I: Payload, N: Payload, D: Payload> SplitRecordEditor<I, N, D> {
    /// Pairs two updaters
    ///
    /// # Errors
    ///
    /// `Configuration` if the updaters are not one identifying and one
    /// de-identified updater, in that order.
    pub fn new(identifying: Updater<I, D>, deidentified: Updater<N, D>) -> Result<Self> {
        if identifying.projection() != Projection::Identifying
            || deidentified.projection() != Projection::Deidentified
        {
            return Err(SplitStoreError::Configuration(
                "split editor needs an identifying and a de-identified updater".to_string(),
            ));
        }
        Ok(Self {
            identifying,
            deidentified,
        })
    }

    pub fn identifying(&self) -> &Updater<I, D> {
        &self.identifying
    }

    pub fn deidentified(&self) -> &Updater<N, D> {
        &self.deidentified
    }

    /// Loads both rows of the record matching `lookup`
    ///
    /// The lookup is resolved in the de-identified store; the identifying row
    /// is then found by the resolved record key.
    pub async fn load(&self, lookup: &RecordLookup) -> Result<SplitRecord<I, N, D>> {
        let deidentified = self.deidentified.load(lookup).await?;
        let identifying = self
            .identifying
            .load_by_key(&deidentified.record_key)
            .await?;
        Ok(SplitRecord {
            identifying,
            deidentified,
        })
    }

    /// Sets the demo flag on both projections
    ///
    /// The two writes run concurrently, each in its own transaction.
    pub async fn set_demo(&self, lookup: &RecordLookup, is_demo: bool) -> Result<SplitChange>
    where
        I: DemoFlag,
        N: DemoFlag,
    {
        let record = self.load(lookup).await?;
        let proposed = record.identifying.content.with_demo(is_demo)?;
        record.deidentified.content.with_demo(is_demo)?;
        if proposed != record.identifying.content {
            self.invalidate_export(&record.identifying).await?;
        }
        let (identifying, deidentified) = tokio::try_join!(
            self.identifying.set_demo(&record.identifying, is_demo),
            self.deidentified.set_demo(&record.deidentified, is_demo),
        )?;
        Ok(SplitChange {
            identifying,
            deidentified,
        })
    }

    /// Replaces the identifying content and invalidates the export
    ///
    /// The export marker lives in the other store. It is deleted first, and
    /// only if the content differs from `current`.
    pub async fn update_identifying(&self, current: &CurrentRow<I, D>, content: I) -> Result<bool> {
        if content == current.content {
            return Ok(false);
        }
        self.invalidate_export(current).await?;
        self.identifying.update_content(current, content).await
    }

    /// Replaces the de-identified content (invalidation is part of the update)
    pub async fn update_deidentified(
        &self,
        current: &CurrentRow<N, D>,
        content: N,
    ) -> Result<bool> {
        self.deidentified.update_content(current, content).await
    }

    async fn invalidate_export(&self, identifying: &CurrentRow<I, D>) -> Result<()> {
        let invalidated = self
            .deidentified
            .delete_export_marker(&identifying.record_key)
            .await?;
        tracing::info!(
            record_key = %identifying.record_key.short(),
            invalidated,
            "Identifying edit invalidated export state"
        );
        Ok(())
    }
}
