//! Two invocations simulated against the same snapshot: the first to commit
//! wins, the second is rejected and leaves nothing behind.

mod common;

use common::{at, Ledger};
use hashlock_contracts::{execute, Invocation, TransactionContext};
use hashlock_protocol::crypto::hash_lock;
use hashlock_protocol::identity::ClientIdentity;
use hashlock_protocol::storage::{CommitError, ReadWriteSet, TxSimulator, WorldState};

fn simulate(ledger: &Ledger, who: &ClientIdentity, tx_id: &str, inv: Invocation) -> ReadWriteSet {
    let world = ledger.committer.world();
    let mut sim = TxSimulator::new(world.as_ref(), tx_id);
    {
        let mut ctx = TransactionContext::new(&mut sim, who, at(10), tx_id);
        execute(&mut ctx, &inv).unwrap();
    }
    sim.into_rwset()
}

fn funded_ledger() -> (Ledger, ClientIdentity) {
    let mut ledger = Ledger::new();
    let alice = ClientIdentity::minter("alice");
    ledger.invoke(&alice, at(0), Invocation::Mint { amount: 100 }).unwrap();
    ledger
        .invoke(&alice, at(0), Invocation::Approve { receiver: "bob".into(), amount: 100 })
        .unwrap();
    (ledger, alice)
}

#[test]
fn double_spend_from_one_snapshot_is_rejected() {
    let (ledger, alice) = funded_ledger();

    // Both transfers read alice's balance at the same version.
    let first = simulate(
        &ledger,
        &alice,
        "tx-a",
        Invocation::Transfer { receiver: "bob".into(), amount: 80 },
    );
    let second = simulate(
        &ledger,
        &alice,
        "tx-b",
        Invocation::Transfer { receiver: "bob".into(), amount: 80 },
    );

    ledger.committer.commit(&first).unwrap();
    let err = ledger.committer.commit(&second).unwrap_err();
    assert!(matches!(err, CommitError::MvccReadConflict { .. }), "{err:?}");

    assert_eq!(ledger.balance("alice"), Some(20));
    assert_eq!(ledger.balance("bob"), Some(80));
    assert_eq!(ledger.supply(), 100);
}

#[test]
fn racing_redeem_and_refund_settle_once() {
    let (mut ledger, alice) = funded_ledger();
    let out = ledger
        .invoke(
            &alice,
            at(0),
            Invocation::Lock {
                receiver: "bob".into(),
                amount: 40,
                expiry: at(5),
                hash_lock: hex::encode(hash_lock(b"s")),
            },
        )
        .unwrap();
    let id: hashlock_contracts::htlc::LockId =
        serde_json::from_value(out["lock_id"].clone()).unwrap();

    // Refund is valid at t=10; so is a second refund simulated from the same
    // snapshot.
    let a = simulate(&ledger, &alice, "tx-a", Invocation::Refund { lock_id: id.clone() });
    let b = simulate(&ledger, &alice, "tx-b", Invocation::Refund { lock_id: id });

    let version = ledger.committer.commit(&a).unwrap();
    assert!(ledger.committer.commit(&b).is_err());
    assert_eq!(ledger.world().latest_version().unwrap(), version);
    assert_eq!(ledger.balance("alice"), Some(100));
}

#[test]
fn independent_accounts_do_not_conflict() {
    let mut ledger = Ledger::new();
    let alice = ClientIdentity::minter("alice");
    let bob = ClientIdentity::minter("bob");
    ledger.invoke(&alice, at(0), Invocation::Mint { amount: 1 }).unwrap();
    ledger.invoke(&bob, at(0), Invocation::Mint { amount: 1 }).unwrap();

    let a = simulate(&ledger, &alice, "tx-a", Invocation::BalanceOf);
    let b = simulate(&ledger, &bob, "tx-b", Invocation::BalanceOf);
    let c = simulate(&ledger, &alice, "tx-c", Invocation::Mint { amount: 5 });

    // Minting touches the supply record, which neither balance query read.
    ledger.committer.commit(&c).unwrap();
    ledger.committer.commit(&b).unwrap();
    // alice's query read her balance, which the mint changed.
    assert!(ledger.committer.commit(&a).is_err());
}
