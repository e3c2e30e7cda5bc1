//! Reference Resolver: character references to conditioning media URLs.
//!
//! References recorded on shots can be stale, so a reference whose id no
//! longer resolves inside the project is retried by name and gender.
//! Lookups are plain reads; a character being regenerated concurrently may
//! yield its previous URL.

use std::collections::HashSet;

use storyreel_core::media::MediaKind;
use storyreel_core::shot::CharacterRef;
use storyreel_core::types::DbId;
use storyreel_db::models::character::Character;
use storyreel_db::store::CharacterStore;

use crate::error::{GenerationError, MissingReference};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceResolver;

impl ReferenceResolver {
    pub fn new() -> Self {
        Self
    }

    /// Reference media URLs of `kind` for `refs`, deduplicated in order.
    ///
    /// Characters without media are logged and skipped. When `refs` is not
    /// empty and none of them yields a URL the unit cannot be generated
    /// faithfully, and [`GenerationError::ReferenceMissing`] lists every
    /// reference.
    pub async fn resolve<S: CharacterStore + ?Sized>(
        &self,
        store: &S,
        project_id: DbId,
        refs: &[CharacterRef],
        kind: MediaKind,
    ) -> Result<Vec<String>, GenerationError> {
        let mut urls = Vec::new();
        let mut seen = HashSet::new();
        let mut missing = Vec::new();

        for reference in dedupe_refs(refs) {
            let character = self.lookup(store, project_id, reference).await?;
            match character.as_ref().and_then(|c| c.media_url(kind)) {
                Some(url) => {
                    if seen.insert(url.to_string()) {
                        urls.push(url.to_string());
                    }
                }
                None => {
                    tracing::warn!(
                        character_id = reference.id,
                        name = %reference.name,
                        found = character.is_some(),
                        "Character has no reference {kind}",
                    );
                    missing.push(MissingReference {
                        id: character.as_ref().map_or(reference.id, |c| c.id),
                        name: character
                            .as_ref()
                            .map_or_else(|| reference.name.clone(), |c| c.name.clone()),
                        found: character.is_some(),
                    });
                }
            }
        }

        if urls.is_empty() && !missing.is_empty() {
            return Err(GenerationError::ReferenceMissing { characters: missing });
        }
        Ok(urls)
    }

    async fn lookup<S: CharacterStore + ?Sized>(
        &self,
        store: &S,
        project_id: DbId,
        reference: &CharacterRef,
    ) -> Result<Option<Character>, GenerationError> {
        if let Some(character) = store.find_character(reference.id).await? {
            if character.project_id == project_id {
                return Ok(Some(character));
            }
        }

        if !reference.has_identity() {
            return Ok(None);
        }
        let Some(gender) = reference.gender.as_deref() else {
            return Ok(None);
        };

        let found = store
            .find_character_by_name_and_gender(project_id, &reference.name, gender)
            .await?;
        if let Some(character) = &found {
            tracing::debug!(
                stale_id = reference.id,
                character_id = character.id,
                "Character reference matched by name and gender",
            );
        }
        Ok(found)
    }
}

/// Drop repeated references to the same id, keeping first occurrences.
fn dedupe_refs(refs: &[CharacterRef]) -> Vec<&CharacterRef> {
    let mut seen = HashSet::new();
    refs.iter().filter(|r| seen.insert(r.id)).collect()
}
