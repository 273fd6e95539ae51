//! Scenario: the weapon cap spans every open ballot of a guild.
//!
//! # Invariant under test
//! Two weapon votes in one context fill the weapons bucket no matter which
//! ballots they were cast in. A third weapon vote, in a third ballot, is
//! denied and the denial lists both held votes. Other contexts, other users
//! and other guilds keep their own buckets.

mod common;

use common::{Fixture, ALICE, BOB, OTHER_GUILD};
use lootpoll_bot::db::schema::{Category, VotingContext};
use lootpoll_bot::engine::bucket::{BucketKey, RuleSet};
use lootpoll_bot::engine::store::BallotStore;
use lootpoll_bot::engine::VoteOutcome;

const PVP: VotingContext = VotingContext::MainPvp;

#[tokio::test]
async fn third_weapon_across_ballots_is_denied_with_both_occupants() {
    let f = Fixture::new();

    let kowazan = f.ballot("Kowazan").await;
    let adentus = f.ballot("Adentus").await;
    let ahzreil = f.ballot("Ahzreil").await;

    let sword = f.entry(&kowazan, "Kowazan's Sword", Category::Weapon, "sns").await;
    let greatsword = f.entry(&adentus, "Adentus's Gargantuan Greatsword", Category::Weapon, "gs").await;
    let siphon = f.entry(&ahzreil, "Ahzreil's Siphoning Sword", Category::Weapon, "sns").await;

    f.cast(ALICE, &sword, PVP).await;
    f.cast(ALICE, &greatsword, PVP).await;

    let offer = f.denied(ALICE, &siphon, PVP).await;

    assert_eq!(offer.denial.bucket, BucketKey { category: Category::Weapon, slot: None });
    assert_eq!(offer.denial.capacity, 2);
    assert_eq!(offer.candidate.id, siphon.id);

    let mut occupants = offer.occupants().iter().map(|h| h.entry.id).collect::<Vec<_>>();
    occupants.sort();
    assert_eq!(occupants, vec![sword.id, greatsword.id]);

    // Denial writes nothing.
    assert_eq!(f.held_names(ALICE, PVP).await.len(), 2);
    assert_eq!(f.engine.pending_offers(), 1);
}

#[tokio::test]
async fn buckets_are_per_context_and_per_user() {
    let f = Fixture::new();

    let ballot = f.ballot("Kowazan").await;
    let a = f.entry(&ballot, "Sword A", Category::Weapon, "sns").await;
    let b = f.entry(&ballot, "Bow B", Category::Weapon, "lb").await;
    let c = f.entry(&ballot, "Staff C", Category::Weapon, "staff").await;

    f.cast(ALICE, &a, PVP).await;
    f.cast(ALICE, &b, PVP).await;

    // Same entries, another context.
    f.cast(ALICE, &a, VotingContext::MainPve).await;
    f.cast(ALICE, &c, VotingContext::Offspec).await;

    // Another user starts from an empty bucket.
    f.cast(BOB, &a, PVP).await;
    f.cast(BOB, &c, PVP).await;

    f.denied(ALICE, &c, PVP).await;
    f.denied(BOB, &b, PVP).await;
}

#[tokio::test]
async fn other_guilds_do_not_count() {
    let f = Fixture::new();

    let home = f.ballot("Kowazan").await;
    let away = f.ballot_in(OTHER_GUILD, "Kowazan").await;

    let a = f.entry(&away, "Sword A", Category::Weapon, "sns").await;
    let b = f.entry(&away, "Bow B", Category::Weapon, "lb").await;
    let c = f.entry(&home, "Staff C", Category::Weapon, "staff").await;

    f.cast(ALICE, &a, PVP).await;
    f.cast(ALICE, &b, PVP).await;
    f.cast(ALICE, &c, PVP).await;

    assert_eq!(f.held_names(ALICE, PVP).await, vec!["Staff C".to_owned()]);
    assert_eq!(f.store.list_open_votes_for_user(OTHER_GUILD, ALICE, PVP).await.unwrap().len(), 2);
}

#[tokio::test]
async fn legacy_rules_allow_one_of_each_weapon_type() {
    let f = Fixture::with_rules(RuleSet::Legacy);

    let ballot = f.ballot("Kowazan").await;
    let first = f.entry(&ballot, "Sword A", Category::Weapon, "sns").await;
    let second = f.entry(&ballot, "Sword B", Category::Weapon, "sns").await;
    let bow = f.entry(&ballot, "Bow", Category::Weapon, "lb").await;

    f.cast(ALICE, &first, PVP).await;

    let offer = f.denied(ALICE, &second, PVP).await;
    assert_eq!(offer.denial.bucket, BucketKey { category: Category::Weapon, slot: Some("sns".to_owned()) });
    assert_eq!(offer.denial.capacity, 1);
    assert_eq!(offer.occupants().len(), 1);

    match f.vote(ALICE, &bow, PVP).await.unwrap() {
        VoteOutcome::Recorded(v) => assert_eq!(v.id_entry, bow.id),
        other => panic!("expected bow to be recorded, got {:?}", other),
    }
}
