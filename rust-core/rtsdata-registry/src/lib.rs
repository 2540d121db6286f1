// SPDX-License-Identifier: PMPL-1.0-or-later
//! rtsdata Identity Registry
//!
//! A consistent snapshot of every well, tag and discrete label, resolving
//! names to identities and back. Query serving shares one snapshot behind an
//! `Arc`; a reload builds a new snapshot and swaps it in wholesale.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use rtsdata_model::{DiscreteLabel, LabelId, NewTag, NewWell, Tag, TagId, Well, WellId};
use rtsdata_storage::{MeasurementStore, StorageError};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("well not found: {0}")]
    UnknownWell(String),

    #[error("pi_tag not found: {0}")]
    UnknownTag(String),

    #[error("control_tag not found: {0}")]
    UnknownLabel(String),

    #[error("well and pi_tag mismatch: {tag} does not belong to {well}")]
    Mismatch { well: String, tag: String },

    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Name/identity maps for one session
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    wells: BTreeMap<WellId, Well>,
    well_ids: HashMap<String, WellId>,
    tags: BTreeMap<TagId, Tag>,
    tag_ids: HashMap<String, TagId>,
    labels: BTreeMap<LabelId, String>,
    label_ids: HashMap<String, LabelId>,
}

impl IdentityRegistry {
    /// Build a snapshot from every reference row in the store.
    #[instrument(skip_all)]
    pub async fn snapshot(store: &MeasurementStore) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for well in store.all_wells().await? {
            registry.add_well(well)?;
        }
        for tag in store.all_tags().await? {
            registry.add_tag(tag)?;
        }
        for label in store.all_labels().await? {
            registry.add_label(label)?;
        }

        info!(
            wells = registry.wells.len(),
            tags = registry.tags.len(),
            labels = registry.labels.len(),
            "identity snapshot built"
        );
        Ok(registry)
    }

    fn add_well(&mut self, well: Well) -> Result<(), RegistryError> {
        if self.well_ids.contains_key(&well.name) {
            return Err(duplicate("well", &well.name));
        }
        self.well_ids.insert(well.name.clone(), well.id);
        self.wells.insert(well.id, well);
        Ok(())
    }

    fn add_tag(&mut self, tag: Tag) -> Result<(), RegistryError> {
        if self.tag_ids.contains_key(&tag.name) {
            return Err(duplicate("pi_tag", &tag.name));
        }
        self.tag_ids.insert(tag.name.clone(), tag.id);
        self.tags.insert(tag.id, tag);
        Ok(())
    }

    fn add_label(&mut self, label: DiscreteLabel) -> Result<(), RegistryError> {
        if self.label_ids.contains_key(&label.name) {
            return Err(duplicate("control_tag", &label.name));
        }
        self.label_ids.insert(label.name.clone(), label.id);
        self.labels.insert(label.id, label.name);
        Ok(())
    }

    // ----- resolution -----------------------------------------------------

    pub fn resolve_well(&self, name: &str) -> Result<WellId, RegistryError> {
        self.well_ids
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownWell(name.to_string()))
    }

    /// Tag identity together with its owning well
    pub fn resolve_tag(&self, name: &str) -> Result<(TagId, WellId), RegistryError> {
        self.tag_ids
            .get(name)
            .and_then(|id| self.tags.get(id))
            .map(|tag| (tag.id, tag.well))
            .ok_or_else(|| RegistryError::UnknownTag(name.to_string()))
    }

    /// Resolve a (well, tag) pair, rejecting tags of another well.
    pub fn resolve_channel(
        &self,
        well: &str,
        tag: &str,
    ) -> Result<(WellId, TagId), RegistryError> {
        let well_id = self.resolve_well(well)?;
        let (tag_id, owner) = self.resolve_tag(tag)?;
        if owner != well_id {
            return Err(RegistryError::Mismatch {
                well: well.to_string(),
                tag: tag.to_string(),
            });
        }
        Ok((well_id, tag_id))
    }

    pub fn resolve_label(&self, name: &str) -> Result<LabelId, RegistryError> {
        self.label_ids
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownLabel(name.to_string()))
    }

    /// Return the label's identity, allocating and persisting it on first
    /// sight. Resolving the same name twice yields the same identity.
    pub async fn resolve_or_create_label(
        &mut self,
        store: &MeasurementStore,
        name: &str,
    ) -> Result<LabelId, RegistryError> {
        if let Some(id) = self.label_ids.get(name) {
            return Ok(*id);
        }
        let created = store.insert_labels(&[name.to_string()]).await?;
        let label = created
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::CorruptedData(format!("label {name} not created")))?;
        let id = label.id;
        debug!(label = name, id = id.get(), "allocated control tag");
        self.add_label(label)?;
        Ok(id)
    }

    // ----- registration during load ---------------------------------------

    /// Persist new wells and add them to this snapshot.
    pub async fn register_wells(
        &mut self,
        store: &MeasurementStore,
        wells: &[NewWell],
    ) -> Result<Vec<WellId>, RegistryError> {
        check_new_names("well", &self.well_ids, wells.iter().map(|w| w.name.as_str()))?;
        let stored = store.insert_wells(wells).await?;
        let ids = stored.iter().map(|w| w.id).collect();
        for well in stored {
            self.add_well(well)?;
        }
        Ok(ids)
    }

    /// Persist new tags and add them to this snapshot.
    pub async fn register_tags(
        &mut self,
        store: &MeasurementStore,
        tags: &[NewTag],
    ) -> Result<Vec<TagId>, RegistryError> {
        check_new_names("pi_tag", &self.tag_ids, tags.iter().map(|t| t.name.as_str()))?;
        let stored = store.insert_tags(tags).await?;
        let ids = stored.iter().map(|t| t.id).collect();
        for tag in stored {
            self.add_tag(tag)?;
        }
        Ok(ids)
    }

    // ----- reverse lookups ------------------------------------------------

    pub fn well_name(&self, id: WellId) -> Option<&str> {
        self.wells.get(&id).map(|w| w.name.as_str())
    }

    pub fn tag_name(&self, id: TagId) -> Option<&str> {
        self.tags.get(&id).map(|t| t.name.as_str())
    }

    pub fn label_name(&self, id: LabelId) -> Option<&str> {
        self.labels.get(&id).map(String::as_str)
    }

    pub fn well(&self, id: WellId) -> Option<&Well> {
        self.wells.get(&id)
    }

    pub fn tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(&id)
    }

    /// Wells in identity order
    pub fn wells(&self) -> impl Iterator<Item = &Well> {
        self.wells.values()
    }

    /// Tags of one well in identity order
    pub fn tags_of(&self, well: WellId) -> impl Iterator<Item = &Tag> {
        self.tags.values().filter(move |t| t.well == well)
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}

/// Reject names already known or repeated within the batch.
fn check_new_names<'a, V>(
    kind: &'static str,
    known: &HashMap<String, V>,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), RegistryError> {
    let mut batch = BTreeSet::new();
    for name in names {
        if known.contains_key(name) || !batch.insert(name) {
            return Err(duplicate(kind, name));
        }
    }
    Ok(())
}

fn duplicate(kind: &'static str, name: &str) -> RegistryError {
    RegistryError::DuplicateName {
        kind,
        name: name.to_string(),
    }
}

/// The snapshot currently served to queries.
///
/// Readers clone the inner `Arc` and never observe a half-built registry.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    current: RwLock<Arc<IdentityRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: IdentityRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    pub async fn current(&self) -> Arc<IdentityRegistry> {
        Arc::clone(&*self.current.read().await)
    }

    /// Rebuild from storage and replace the served snapshot.
    pub async fn reload(
        &self,
        store: &MeasurementStore,
    ) -> Result<Arc<IdentityRegistry>, RegistryError> {
        let fresh = Arc::new(IdentityRegistry::snapshot(store).await?);
        *self.current.write().await = Arc::clone(&fresh);
        Ok(fresh)
    }
}
