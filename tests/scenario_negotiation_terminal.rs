//! Scenario: every answer to a replacement offer is final.
//!
//! # Invariant under test
//! An offer is answered at most once and only by the user it was made for.
//! Cancelling changes nothing. Answering twice, answering as someone else,
//! naming an occupant that was never offered or answering after the candidate
//! is already held evicts nothing. Offers nobody answers are swept.

mod common;

use chrono::{Duration, Utc};

use common::{Fixture, ALICE, BOB};
use lootpoll_bot::db::schema::{Category, Entry, VotingContext};
use lootpoll_bot::engine::error::{EngineError, Missing};
use lootpoll_bot::engine::negotiator::{ReplacementChoice, ReplacementOffer, Resolution};
use lootpoll_bot::engine::OFFER_TTL_MINUTES;
use lootpoll_bot::support::expiry::sweep_once;

const PVP: VotingContext = VotingContext::MainPvp;

async fn full_chest(f: &Fixture) -> ReplacementOffer {
    let talus = f.ballot("Talus").await;
    let cornelius = f.ballot("Cornelius").await;
    let plate = f.entry(&talus, "Plate", Category::Armor, "chest").await;
    let robe = f.entry(&cornelius, "Robe", Category::Armor, "chest").await;

    f.cast(ALICE, &plate, PVP).await;
    f.denied(ALICE, &robe, PVP).await
}

#[tokio::test]
async fn cancel_leaves_votes_unchanged() {
    let f = Fixture::new();
    let offer = full_chest(&f).await;

    let resolution = f.engine.resolve_replacement(offer.id, ALICE, ReplacementChoice::Cancel).await.unwrap();

    assert_eq!(resolution, Resolution::Cancelled);
    assert_eq!(f.held_names(ALICE, PVP).await, vec!["Plate".to_owned()]);
    assert_eq!(f.engine.pending_offers(), 0);
}

#[tokio::test]
async fn another_user_cannot_answer() {
    let f = Fixture::new();
    let offer = full_chest(&f).await;

    let result = f.engine.resolve_replacement(offer.id, BOB, ReplacementChoice::Evict(0)).await;
    assert!(matches!(result, Err(EngineError::NotFound(Missing::Offer(id))) if id == offer.id));

    // Still pending for its owner.
    assert_eq!(f.engine.pending_offers(), 1);
    f.engine.resolve_replacement(offer.id, ALICE, ReplacementChoice::Evict(0)).await.unwrap();
    assert_eq!(f.held_names(ALICE, PVP).await, vec!["Robe".to_owned()]);
}

#[tokio::test]
async fn second_answer_is_refused() {
    let f = Fixture::new();
    let offer = full_chest(&f).await;

    f.engine.resolve_replacement(offer.id, ALICE, ReplacementChoice::Evict(0)).await.unwrap();

    for choice in [ReplacementChoice::Evict(0), ReplacementChoice::Cancel] {
        let result = f.engine.resolve_replacement(offer.id, ALICE, choice).await;
        assert!(matches!(result, Err(EngineError::NotFound(Missing::Offer(_)))));
    }
    assert_eq!(f.held_names(ALICE, PVP).await, vec!["Robe".to_owned()]);
}

#[tokio::test]
async fn unknown_occupant_evicts_nothing() {
    let f = Fixture::new();
    let offer = full_chest(&f).await;

    let result = f.engine.resolve_replacement(offer.id, ALICE, ReplacementChoice::Evict(5)).await;
    assert!(matches!(result, Err(EngineError::NotFound(Missing::Occupant(5)))));

    assert_eq!(f.held_names(ALICE, PVP).await, vec!["Plate".to_owned()]);
    assert_eq!(f.engine.pending_offers(), 0);
}

#[tokio::test]
async fn unknown_offer_is_not_found() {
    let f = Fixture::new();

    let result = f.engine.resolve_replacement(42, ALICE, ReplacementChoice::Cancel).await;
    assert!(matches!(result, Err(EngineError::NotFound(Missing::Offer(42)))));
}

#[tokio::test]
async fn each_denial_gets_its_own_offer() {
    let f = Fixture::new();
    let first = full_chest(&f).await;

    let again = f.denied(ALICE, &first.candidate, PVP).await;

    assert_ne!(first.id, again.id);
    assert_eq!(f.engine.pending_offers(), 2);

    f.engine.resolve_replacement(first.id, ALICE, ReplacementChoice::Evict(0)).await.unwrap();

    // The second offer is stale: its occupant is gone and the candidate is held.
    let result = f.engine.resolve_replacement(again.id, ALICE, ReplacementChoice::Evict(0)).await;
    assert!(matches!(result, Ok(Resolution::AlreadyHeld { ref entry }) if entry.id == first.candidate.id), "{:?}", result);
    assert_eq!(f.held_names(ALICE, PVP).await, vec!["Robe".to_owned()]);
    assert_eq!(f.engine.pending_offers(), 0);
}

fn occupant_index(offer: &ReplacementOffer, entry: &Entry) -> usize {
    offer.occupants().iter()
        .position(|h| h.entry.id == entry.id)
        .unwrap()
}

#[tokio::test]
async fn stale_offer_for_held_candidate_keeps_other_occupant() {
    let f = Fixture::new();

    let ballot = f.ballot("Morokai").await;
    let e1 = f.entry(&ballot, "Earring of Bloodied Rage", Category::Accessory, "earring").await;
    let e2 = f.entry(&ballot, "Earring of Primal Ascension", Category::Accessory, "earring").await;
    let e3 = f.entry(&ballot, "Morokai's Soulfire Earring", Category::Accessory, "earring").await;

    f.cast(ALICE, &e1, PVP).await;
    f.cast(ALICE, &e2, PVP).await;

    let first = f.denied(ALICE, &e3, PVP).await;
    let second = f.denied(ALICE, &e3, PVP).await;

    let evict_e1 = ReplacementChoice::Evict(occupant_index(&first, &e1));
    match f.engine.resolve_replacement(first.id, ALICE, evict_e1).await.unwrap() {
        Resolution::Swapped { evicted, entry, .. } => {
            assert_eq!(evicted.entry.id, e1.id);
            assert_eq!(entry.id, e3.id);
        }
        other => panic!("expected Swapped, got {:?}", other),
    }

    // E3 is already held, so answering the second offer must not touch E2.
    let evict_e2 = ReplacementChoice::Evict(occupant_index(&second, &e2));
    let result = f.engine.resolve_replacement(second.id, ALICE, evict_e2).await;
    assert!(matches!(result, Ok(Resolution::AlreadyHeld { ref entry }) if entry.id == e3.id), "{:?}", result);

    assert_eq!(f.held_names(ALICE, PVP).await, vec![e2.name.clone(), e3.name.clone()]);
}

#[tokio::test]
async fn unanswered_offers_are_swept() {
    let f = Fixture::new();
    let offer = full_chest(&f).await;

    let now = Utc::now();

    let report = sweep_once(&f.engine, now).await.unwrap();
    assert_eq!(report.expired_offers, 0);
    assert_eq!(f.engine.pending_offers(), 1);

    let later = now + Duration::minutes(OFFER_TTL_MINUTES + 1);
    let report = sweep_once(&f.engine, later).await.unwrap();
    assert_eq!(report.expired_offers, 1);
    assert_eq!(f.engine.pending_offers(), 0);

    let result = f.engine.resolve_replacement(offer.id, ALICE, ReplacementChoice::Evict(0)).await;
    assert!(matches!(result, Err(EngineError::NotFound(Missing::Offer(_)))));
    assert_eq!(f.held_names(ALICE, PVP).await, vec!["Plate".to_owned()]);
}

#[tokio::test]
async fn offer_ids_do_not_repeat_across_engines() {
    // A fresh engine stands in for a restarted process.
    let before = Fixture::new();
    let after = Fixture::new();

    let old = full_chest(&before).await;
    let new = full_chest(&after).await;
    assert_ne!(old.id, new.id);

    let result = after.engine.resolve_replacement(old.id, ALICE, ReplacementChoice::Evict(0)).await;
    assert!(matches!(result, Err(EngineError::NotFound(Missing::Offer(_)))));
    assert_eq!(after.held_names(ALICE, PVP).await, vec!["Plate".to_owned()]);
}
