use super::*;
use crate::crypto::{hash_data, Keypair};
use crate::error::ErrorKind;
use crate::types::{Difficulty, Timestamp, DAY_MS};

const NOW: Timestamp = 1_700_000_000_000;

fn admin() -> Address {
    Address::from_label("admin")
}

fn institution() -> Address {
    Address::from_label("mit")
}

fn reviewer() -> Address {
    Address::from_label("reviewer")
}

fn learner_key() -> Keypair {
    Keypair::from_seed([7u8; 32])
}

fn learner() -> Address {
    Address::from_public_key(learner_key().public_key())
}

fn course() -> NewTask {
    NewTask {
        metadata_locator: "ipfs://course/rust-101".to_string(),
        reward_kind: RewardKind::Fungible,
        difficulty: Difficulty::Intermediate,
        verifier: reviewer(),
        base_reward: TokenAmount::from_tokens(100),
        max_completions: 10,
        expires_at: NOW + 30 * DAY_MS,
    }
}

/// Deployed protocol with a verified institution allowed to publish and a
/// reviewer holding the proof-verifier role
async fn setup() -> Coordinator {
    let coordinator = Coordinator::deploy(&ProtocolConfig::default(), admin()).unwrap();
    let c = coordinator.components().clone();

    let mut tx = TxContext::new(admin(), NOW);
    c.tasks.write().await.grant_task_creator_role(&mut tx, institution()).unwrap();
    c.proofs.write().await.grant_verifier_role(&mut tx, reviewer()).unwrap();
    c.institutions.write().await.grant_verifier_role(&mut tx, admin()).unwrap();
    coordinator.commit(tx).await;

    let mut tx = TxContext::new(institution(), NOW);
    c.institutions
        .write()
        .await
        .register_institution(&mut tx, "MIT", "ipfs://mit")
        .unwrap();
    coordinator.commit(tx).await;

    let mut tx = TxContext::new(admin(), NOW);
    c.institutions
        .write()
        .await
        .verify_institution(&mut tx, institution())
        .unwrap();
    coordinator.commit(tx).await;

    coordinator
}

async fn publish(coordinator: &Coordinator) -> TaskId {
    coordinator
        .publish_task(TxContext::new(institution(), NOW), course())
        .await
        .unwrap()
}

async fn submit(coordinator: &Coordinator, task_id: TaskId) {
    let domain = coordinator.components().proofs.read().await.domain().clone();
    let proof_hash = hash_data(b"fn main() {}");
    let signature =
        ProofSignature::sign(&learner_key(), &domain, task_id, proof_hash, 0, NOW + DAY_MS);
    coordinator
        .submit_proof(TxContext::new(learner(), NOW + 1), task_id, proof_hash, &signature)
        .await
        .unwrap();
}

async fn approve(coordinator: &Coordinator, task_id: TaskId) {
    coordinator
        .verify_proof(TxContext::new(reviewer(), NOW + 2), task_id, learner(), true, "")
        .await
        .unwrap();
}

async fn event_count(coordinator: &Coordinator) -> usize {
    coordinator.events().read().await.len()
}

#[tokio::test]
async fn test_deploy_wires_roles_and_funding() {
    let coordinator = setup().await;
    let c = coordinator.components();

    assert!(c
        .tasks
        .read()
        .await
        .access()
        .has_role(Role::TaskVerifier, &coordinator.address()));
    assert!(c
        .rewards
        .read()
        .await
        .access()
        .has_role(Role::Distributor, &coordinator.address()));

    let ledger = c.rewards.read().await.address();
    assert_eq!(
        coordinator.balance_of(&ledger).await,
        TokenAmount::from_tokens(10_000_000)
    );
    assert_eq!(
        coordinator.balance_of(&admin()).await,
        TokenAmount::from_tokens(90_000_000)
    );
}

#[tokio::test]
async fn test_deploy_rejects_invalid_config() {
    let mut config = ProtocolConfig::default();
    config.chain_id = 0;
    let err = Coordinator::deploy(&config, admin()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let mut config = ProtocolConfig::default();
    config.event_capacity = usize::MAX;
    let err = Coordinator::deploy(&config, admin()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_learn_prove_earn() {
    let coordinator = setup().await;
    let task_id = publish(&coordinator).await;
    assert_eq!(task_id, 0);
    assert_eq!(
        coordinator.get_institution_stats(&institution()).await.tasks_created,
        1
    );

    submit(&coordinator, task_id).await;
    approve(&coordinator, task_id).await;

    let receipt = coordinator
        .complete_learning(
            TxContext::new(reviewer(), NOW + 3),
            task_id,
            learner(),
            "ipfs://credential/0",
        )
        .await
        .unwrap();
    assert_eq!(receipt.credential_id, 0);
    assert_eq!(receipt.reward, TokenAmount::from_tokens(100));
    assert_eq!(receipt.kind, RewardKind::Fungible);
    assert_eq!(receipt.event_sequences.len(), 3);

    let stats = coordinator.get_learner_stats(&learner()).await;
    assert_eq!(
        stats,
        LearnerStats {
            completed_tasks: 1,
            credentials_earned: 1,
            pending_rewards: TokenAmount::from_tokens(100),
        }
    );
    assert_eq!(
        coordinator.get_institution_stats(&institution()).await,
        InstitutionStats {
            is_verified: true,
            tasks_created: 1,
            credentials_issued: 1,
        }
    );

    let claimed = coordinator
        .claim_rewards(TxContext::new(learner(), NOW + 4))
        .await
        .unwrap();
    assert_eq!(claimed, TokenAmount::from_tokens(100));
    assert_eq!(coordinator.balance_of(&learner()).await, TokenAmount::from_tokens(100));
    assert!(coordinator.get_learner_stats(&learner()).await.pending_rewards.is_zero());

    let err = coordinator
        .claim_rewards(TxContext::new(learner(), NOW + 5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoOp);
}

#[tokio::test]
async fn test_completion_events_are_attributed() {
    let coordinator = setup().await;
    let task_id = publish(&coordinator).await;
    submit(&coordinator, task_id).await;
    approve(&coordinator, task_id).await;

    let receipt = coordinator
        .complete_learning(TxContext::new(reviewer(), NOW + 3), task_id, learner(), "ipfs://c")
        .await
        .unwrap();

    let log = coordinator.events().read().await;
    let c = coordinator.components();
    let emitters: Vec<Address> = receipt
        .event_sequences
        .iter()
        .map(|seq| log.records()[usize::try_from(*seq).unwrap()].emitter)
        .collect();
    assert_eq!(
        emitters,
        vec![
            c.tasks.read().await.address(),
            c.credentials.read().await.address(),
            c.rewards.read().await.address(),
        ]
    );
}

#[tokio::test]
async fn test_completion_requires_approved_proof() {
    let coordinator = setup().await;
    let task_id = publish(&coordinator).await;
    submit(&coordinator, task_id).await;
    let before = event_count(&coordinator).await;

    let err = coordinator
        .complete_learning(TxContext::new(reviewer(), NOW + 3), task_id, learner(), "ipfs://c")
        .await
        .unwrap_err();
    assert_eq!(err, ProtocolError::conflict("proof not verified"));
    assert_eq!(event_count(&coordinator).await, before);
    assert_eq!(
        coordinator.get_learner_stats(&learner()).await,
        LearnerStats::default()
    );
}

#[tokio::test]
async fn test_completion_caller_checks() {
    let coordinator = setup().await;
    let task_id = publish(&coordinator).await;
    submit(&coordinator, task_id).await;
    approve(&coordinator, task_id).await;

    let err = coordinator
        .complete_learning(TxContext::new(learner(), NOW + 3), task_id, learner(), "ipfs://c")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let err = coordinator
        .complete_learning(TxContext::new(reviewer(), NOW + 3), 42, learner(), "ipfs://c")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_completion_is_once_only() {
    let coordinator = setup().await;
    let task_id = publish(&coordinator).await;
    submit(&coordinator, task_id).await;
    approve(&coordinator, task_id).await;

    coordinator
        .complete_learning(TxContext::new(reviewer(), NOW + 3), task_id, learner(), "ipfs://c")
        .await
        .unwrap();
    let err = coordinator
        .complete_learning(TxContext::new(reviewer(), NOW + 4), task_id, learner(), "ipfs://c")
        .await
        .unwrap_err();
    assert_eq!(err, ProtocolError::conflict("task already completed"));
    assert_eq!(
        coordinator.get_learner_stats(&learner()).await.pending_rewards,
        TokenAmount::from_tokens(100)
    );
}

#[tokio::test]
async fn test_failed_completion_rolls_back_every_component() {
    let coordinator = setup().await;
    let task_id = publish(&coordinator).await;
    submit(&coordinator, task_id).await;
    approve(&coordinator, task_id).await;

    // A credential minted out of band makes the second step fail.
    let c = coordinator.components().clone();
    let mut tx = TxContext::new(admin(), NOW + 3);
    {
        let mut credentials = c.credentials.write().await;
        credentials.grant_role(&mut tx, Role::Minter, admin()).unwrap();
        credentials
            .mint_credential(&mut tx, learner(), task_id, "ipfs://manual")
            .unwrap();
    }
    coordinator.commit(tx).await;

    let before_events = event_count(&coordinator).await;
    let before_root = coordinator.snapshot().await.unwrap().state_root;

    let err = coordinator
        .complete_learning(TxContext::new(reviewer(), NOW + 4), task_id, learner(), "ipfs://c")
        .await
        .unwrap_err();
    assert_eq!(err, ProtocolError::conflict("credential already minted for this task"));

    assert!(!c.tasks.read().await.has_completed(task_id, &learner()));
    assert!(coordinator.get_learner_stats(&learner()).await.pending_rewards.is_zero());
    assert_eq!(event_count(&coordinator).await, before_events);
    assert_eq!(coordinator.snapshot().await.unwrap().state_root, before_root);
}

#[tokio::test]
async fn test_publish_failure_records_nothing() {
    let coordinator = setup().await;
    let before = event_count(&coordinator).await;

    let mut params = course();
    params.max_completions = 0;
    let err = coordinator
        .publish_task(TxContext::new(institution(), NOW), params)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(event_count(&coordinator).await, before);
    assert_eq!(
        coordinator.get_institution_stats(&institution()).await.tasks_created,
        0
    );
}

#[tokio::test]
async fn test_unregistered_institution_stats() {
    let coordinator = setup().await;
    assert_eq!(
        coordinator
            .get_institution_stats(&Address::from_label("nobody"))
            .await,
        InstitutionStats::default()
    );
}

#[tokio::test]
async fn test_update_contracts() {
    let mut coordinator = setup().await;
    let replacement = TaskRegistry::new(Address::from_label("task-registry-v2"), admin());
    let update = ContractUpdate {
        tasks: Some(handle(replacement)),
        ..ContractUpdate::default()
    };

    let err = coordinator
        .update_contracts(TxContext::new(institution(), NOW), update.clone())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    coordinator
        .update_contracts(TxContext::new(admin(), NOW), update)
        .await
        .unwrap();
    assert_eq!(
        coordinator.components().tasks.read().await.address(),
        Address::from_label("task-registry-v2")
    );

    let log = coordinator.events().read().await;
    let last = log.records().last().unwrap();
    assert_eq!(last.emitter, coordinator.address());
    assert!(matches!(
        last.event,
        Event::ContractsUpdated { tasks, .. } if tasks == Address::from_label("task-registry-v2")
    ));
}

#[tokio::test]
async fn test_snapshot_root_tracks_state() {
    let coordinator = setup().await;
    let first = coordinator.snapshot().await.unwrap();
    let second = coordinator.snapshot().await.unwrap();
    assert_eq!(first.state_root, second.state_root);

    publish(&coordinator).await;
    let third = coordinator.snapshot().await.unwrap();
    assert_ne!(first.state_root, third.state_root);
    assert_eq!(third.tasks.total_tasks(), 1);
    assert!(third.event_count > first.event_count);

    let json = serde_json::to_string(&third).unwrap();
    let decoded: ProtocolSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded.state_root, third.state_root);
}

#[tokio::test]
async fn test_concurrent_publishes_get_dense_ids() {
    let coordinator = Arc::new(setup().await);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { publish(&coordinator).await })
        })
        .collect();

    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap());
    }
    ids.sort_unstable();
    assert_eq!(ids, (0..8).collect::<Vec<_>>());
    assert_eq!(
        coordinator.get_institution_stats(&institution()).await.tasks_created,
        8
    );
}
