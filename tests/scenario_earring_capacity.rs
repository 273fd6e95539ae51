//! Scenario: accessory slots with a capacity of two.
//!
//! # Invariant under test
//! Earrings take two votes per context under the standard rules; the third is
//! denied with both holders listed. Under the legacy rules the roles swap and
//! rings take two while earrings take one.

mod common;

use common::{Fixture, ALICE};
use lootpoll_bot::db::schema::{Category, VotingContext};
use lootpoll_bot::engine::bucket::RuleSet;

const PVP: VotingContext = VotingContext::MainPvp;

#[tokio::test]
async fn third_earring_is_denied() {
    let f = Fixture::new();

    let ballot = f.ballot("Morokai").await;
    let first = f.entry(&ballot, "Earring of Bloodied Rage", Category::Accessory, "earring").await;
    let second = f.entry(&ballot, "Earring of Primal Ascension", Category::Accessory, "earring").await;
    let third = f.entry(&ballot, "Morokai's Soulfire Earring", Category::Accessory, "earring").await;

    f.cast(ALICE, &first, PVP).await;
    f.cast(ALICE, &second, PVP).await;

    let offer = f.denied(ALICE, &third, PVP).await;
    assert_eq!(offer.denial.capacity, 2);

    let mut occupants = offer.occupants().iter().map(|h| h.entry.id).collect::<Vec<_>>();
    occupants.sort();
    assert_eq!(occupants, vec![first.id, second.id]);
}

#[tokio::test]
async fn rings_and_necklaces_take_one_under_standard_rules() {
    let f = Fixture::new();

    let ballot = f.ballot("Morokai").await;
    let ring_a = f.entry(&ballot, "Ring A", Category::Accessory, "ring").await;
    let ring_b = f.entry(&ballot, "Ring B", Category::Accessory, "ring").await;
    let necklace = f.entry(&ballot, "Necklace", Category::Accessory, "neck").await;
    let pendant = f.entry(&ballot, "Pendant", Category::Accessory, "necklace").await;

    f.cast(ALICE, &ring_a, PVP).await;
    f.denied(ALICE, &ring_b, PVP).await;

    f.cast(ALICE, &necklace, PVP).await;
    f.denied(ALICE, &pendant, PVP).await;
}

#[tokio::test]
async fn legacy_rules_double_rings_instead() {
    let f = Fixture::with_rules(RuleSet::Legacy);

    let ballot = f.ballot("Morokai").await;
    let ring_a = f.entry(&ballot, "Ring A", Category::Accessory, "ring").await;
    let ring_b = f.entry(&ballot, "Ring B", Category::Accessory, "ring").await;
    let ring_c = f.entry(&ballot, "Ring C", Category::Accessory, "ring").await;
    let earring_a = f.entry(&ballot, "Earring A", Category::Accessory, "earring").await;
    let earring_b = f.entry(&ballot, "Earring B", Category::Accessory, "earring").await;

    f.cast(ALICE, &ring_a, PVP).await;
    f.cast(ALICE, &ring_b, PVP).await;
    assert_eq!(f.denied(ALICE, &ring_c, PVP).await.denial.capacity, 2);

    f.cast(ALICE, &earring_a, PVP).await;
    assert_eq!(f.denied(ALICE, &earring_b, PVP).await.denial.capacity, 1);
}
