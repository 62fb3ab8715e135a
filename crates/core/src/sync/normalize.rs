use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::DataSource;
use crate::models::{BlessingSet, Entity, QuestProgress};

/// Last known raw payload per data source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSources {
    /// Raw roster.
    pub entities: Option<Value>,
    /// Raw quest progress.
    pub quests: Option<Value>,
    /// Raw blessings.
    pub blessings: Option<Value>,
}

impl RawSources {
    /// Payload held for `source`.
    pub fn get(&self, source: DataSource) -> Option<&Value> {
        match source {
            DataSource::Entities => self.entities.as_ref(),
            DataSource::Quests => self.quests.as_ref(),
            DataSource::Blessings => self.blessings.as_ref(),
        }
    }

    /// Mutable slot for `source`.
    pub fn slot_mut(&mut self, source: DataSource) -> &mut Option<Value> {
        match source {
            DataSource::Entities => &mut self.entities,
            DataSource::Quests => &mut self.quests,
            DataSource::Blessings => &mut self.blessings,
        }
    }
}

/// Output of one normalisation pass. `None` means "keep what you have".
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Fresh entities.
    pub entities: Option<Vec<Entity>>,
    /// Fresh blessings.
    pub blessings: Option<BlessingSet>,
    /// Secondary sources whose payload could not be decoded and were left
    /// out of this pass.
    pub rejected: Vec<DataSource>,
}

/// Turns raw upstream payloads into domain values.
///
/// Only an undecodable entity payload is an error. A bad quest or blessing
/// payload is skipped and reported in [`Normalized::rejected`].
pub trait Normalizer: Send + Sync {
    /// Normalise the merged payloads of a refresh.
    fn normalize(&self, raw: &RawSources) -> Result<Normalized>;
}

/// Normaliser for payloads already in the domain's JSON shape.
///
/// Entities and blessings may be bare arrays or wrapped in an object under
/// `entities` / `blessings`. Quests map entity ids to [`QuestProgress`] and
/// override the quest carried on the entity.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonNormalizer;

#[derive(Deserialize)]
#[serde(untagged)]
enum Listed<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "entities", alias = "blessings")]
        items: Vec<T>,
    },
}

impl<T> Listed<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { items } => items,
        }
    }
}

impl JsonNormalizer {
    fn quests(value: &Value) -> Result<HashMap<String, QuestProgress>> {
        serde_json::from_value(value.clone()).context("malformed quest payload")
    }

    fn blessings(value: &Value) -> Result<BlessingSet> {
        let listed: Listed<_> =
            serde_json::from_value(value.clone()).context("malformed blessing payload")?;
        Ok(BlessingSet {
            blessings: listed.into_vec(),
        })
    }
}

impl Normalizer for JsonNormalizer {
    fn normalize(&self, raw: &RawSources) -> Result<Normalized> {
        let mut rejected = Vec::new();

        let quests = match raw.quests.as_ref().map(Self::quests).transpose() {
            Ok(quests) => quests,
            Err(err) => {
                warn!("skipping quests: {err:#}");
                rejected.push(DataSource::Quests);
                None
            }
        };

        let blessings = match raw.blessings.as_ref().map(Self::blessings).transpose() {
            Ok(blessings) => blessings,
            Err(err) => {
                warn!("skipping blessings: {err:#}");
                rejected.push(DataSource::Blessings);
                None
            }
        };

        let entities = raw
            .entities
            .as_ref()
            .map(|value| -> Result<Vec<Entity>> {
                let mut entities = serde_json::from_value::<Listed<Entity>>(value.clone())
                    .context("malformed entity payload")?
                    .into_vec();
                if let Some(quests) = &quests {
                    for entity in &mut entities {
                        if let Some(quest) = quests.get(&entity.id) {
                            entity.quest = Some(quest.clone());
                        }
                    }
                }
                Ok(entities)
            })
            .transpose()?;

        Ok(Normalized {
            entities,
            blessings,
            rejected,
        })
    }
}
