//! Round orchestration: choosing and loading the next passage.

use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::passage::{BibleVersion, Passage, PassageSource, normalize_text};
use crate::store::{LobbyRecord, LobbyStore, StoreResult};

/// Picks a reference from `pool`, avoiding `current` when the pool has
/// anything else to offer.
pub fn pick_reference<R: Rng + ?Sized>(
    pool: &[String],
    current: Option<&str>,
    rng: &mut R,
) -> Option<String> {
    let fresh: Vec<&String> = pool
        .iter()
        .filter(|r| Some(r.as_str()) != current)
        .collect();
    match fresh.choose(rng) {
        Some(reference) => Some((*reference).clone()),
        None => pool.choose(rng).cloned(),
    }
}

/// Loads `reference`, falling back to the placeholder on any failure.
pub async fn fetch_or_placeholder(
    source: &dyn PassageSource,
    reference: &str,
    version: BibleVersion,
) -> Passage {
    match source.fetch(reference, version).await {
        Ok(mut passage) => {
            passage.text = normalize_text(&passage.text);
            passage
        }
        Err(e) => {
            warn!(reference, %version, error = %e, "passage unavailable; using placeholder");
            Passage::placeholder(reference)
        }
    }
}

/// Readies `lobby` for its next race round.
///
/// Loads a new passage onto the lobby (unless `reuse_stored` and the
/// lobby already carries one) and clears every membership's round
/// fields. Live race scratch is the caller's to reset.
pub async fn prepare_race_round(
    store: &dyn LobbyStore,
    passages: &dyn PassageSource,
    config: &EngineConfig,
    lobby: &mut LobbyRecord,
    reuse_stored: bool,
) -> StoreResult<()> {
    let stored = lobby.passage_ref.is_some() && lobby.passage_text.is_some();
    if !(reuse_stored && stored) {
        let reference =
            pick_reference(&config.reference_pool, lobby.passage_ref.as_deref(), &mut rand::rng());
        let passage = match reference {
            Some(reference) => {
                fetch_or_placeholder(passages, &reference, config.passage_version).await
            }
            None => Passage::placeholder(""),
        };
        debug!(lobby_id = %lobby.id, reference = %passage.reference, "passage selected");
        lobby.passage_ref = Some(passage.reference);
        lobby.passage_text = Some(passage.text);
    }
    store.update_lobby(lobby.clone()).await?;

    for mut membership in store.members(lobby.id).await? {
        membership.reset_round();
        store.save_membership(membership).await?;
    }
    Ok(())
}
