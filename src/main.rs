//! LearnChain Node - learn, prove, earn
//!
//! Deploys every protocol component in-process and walks one learner through
//! the full workflow: publish, prove, approve, complete, claim.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use learnchain::{
    config::ProtocolConfig,
    coordinator::Coordinator,
    crypto::{hash_data, Keypair, ProofSignature},
    events::TxContext,
    tasks::NewTask,
    types::{
        now_millis, timestamp_to_datetime, Address, Difficulty, RewardKind, TokenAmount, DAY_MS,
        HOUR_MS,
    },
};

/// Node configuration
#[derive(Clone, Debug)]
struct NodeConfig {
    /// Protocol configuration file
    config_path: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("learnchain.json"),
        }
    }
}

/// Participants of the walkthrough
struct Actors {
    admin: Keypair,
    institution: Keypair,
    reviewer: Keypair,
    learner: Keypair,
}

impl Actors {
    fn generate() -> Self {
        Self {
            admin: Keypair::generate(),
            institution: Keypair::generate(),
            reviewer: Keypair::generate(),
            learner: Keypair::generate(),
        }
    }
}

fn address_of(keypair: &Keypair) -> Address {
    Address::from_public_key(keypair.public_key())
}

/// The LearnChain node
struct LearnChainNode {
    actors: Actors,
    coordinator: Arc<Coordinator>,
}

impl LearnChainNode {
    /// Deploy the protocol under a fresh administrator key
    fn new(config: &ProtocolConfig) -> anyhow::Result<Self> {
        let actors = Actors::generate();
        let coordinator = Coordinator::deploy(config, address_of(&actors.admin))?;
        info!(
            admin = %address_of(&actors.admin),
            coordinator = %coordinator.address(),
            "Node initialized"
        );
        Ok(Self {
            actors,
            coordinator: Arc::new(coordinator),
        })
    }

    /// Grant roles and onboard the institution
    async fn onboard(&self) -> anyhow::Result<()> {
        let admin = address_of(&self.actors.admin);
        let institution = address_of(&self.actors.institution);
        let components = self.coordinator.components();

        let mut tx = TxContext::now(admin);
        components
            .tasks
            .write()
            .await
            .grant_task_creator_role(&mut tx, institution)?;
        components
            .proofs
            .write()
            .await
            .grant_verifier_role(&mut tx, address_of(&self.actors.reviewer))?;
        components
            .institutions
            .write()
            .await
            .grant_verifier_role(&mut tx, admin)?;
        self.coordinator.commit(tx).await;

        let mut tx = TxContext::now(institution);
        components
            .institutions
            .write()
            .await
            .register_institution(&mut tx, "Open Rust Academy", "ipfs://academy/profile")?;
        self.coordinator.commit(tx).await;

        let mut tx = TxContext::now(admin);
        components
            .institutions
            .write()
            .await
            .verify_institution(&mut tx, institution)?;
        self.coordinator.commit(tx).await;

        info!(institution = %institution, "Institution onboarded");
        Ok(())
    }

    /// Publish a task and take the learner through it
    async fn run_workflow(&self) -> anyhow::Result<()> {
        let institution = address_of(&self.actors.institution);
        let reviewer = address_of(&self.actors.reviewer);
        let learner = address_of(&self.actors.learner);

        let task_id = self
            .coordinator
            .publish_task(
                TxContext::now(institution),
                NewTask {
                    metadata_locator: "ipfs://academy/courses/ownership".to_string(),
                    reward_kind: RewardKind::Fungible,
                    difficulty: Difficulty::Intermediate,
                    verifier: reviewer,
                    base_reward: TokenAmount::from_tokens(100),
                    max_completions: 100,
                    expires_at: now_millis() + 30 * DAY_MS,
                },
            )
            .await?;
        info!(task_id, "Task published");

        let (domain, nonce) = {
            let proofs = self.coordinator.components().proofs.read().await;
            (proofs.domain().clone(), proofs.get_nonce(&learner))
        };
        let proof_hash = hash_data(b"borrow checker exercises: all passing");
        let signature = ProofSignature::sign(
            &self.actors.learner,
            &domain,
            task_id,
            proof_hash,
            nonce,
            now_millis() + HOUR_MS,
        );
        self.coordinator
            .submit_proof(TxContext::now(learner), task_id, proof_hash, &signature)
            .await?;
        info!(task_id, learner = %learner, proof = %proof_hash, "Proof submitted");

        self.coordinator
            .verify_proof(TxContext::now(reviewer), task_id, learner, true, "")
            .await?;

        let receipt = self
            .coordinator
            .complete_learning(
                TxContext::now(reviewer),
                task_id,
                learner,
                "ipfs://academy/credentials/ownership",
            )
            .await?;
        info!(
            credential_id = receipt.credential_id,
            reward = %receipt.reward,
            "Completion finalized"
        );

        let claimed = self
            .coordinator
            .claim_rewards(TxContext::now(learner))
            .await?;
        info!(learner = %learner, amount = %claimed, "Rewards claimed");
        Ok(())
    }

    /// Print the committed log, statistics and snapshot root
    async fn report(&self) -> anyhow::Result<()> {
        let learner = address_of(&self.actors.learner);
        let institution = address_of(&self.actors.institution);

        println!();
        println!("Committed events:");
        for record in self.coordinator.events().read().await.records() {
            let at = timestamp_to_datetime(record.timestamp)
                .map_or_else(|| record.timestamp.to_string(), |t| t.to_rfc3339());
            println!(
                "  #{:<3} {at} {} {:?}",
                record.sequence, record.emitter, record.event
            );
        }

        let learner_stats = self.coordinator.get_learner_stats(&learner).await;
        let institution_stats = self.coordinator.get_institution_stats(&institution).await;
        println!();
        println!("Learner {learner}:");
        println!("  completed tasks:    {}", learner_stats.completed_tasks);
        println!("  credentials earned: {}", learner_stats.credentials_earned);
        println!("  pending rewards:    {}", learner_stats.pending_rewards);
        println!("  token balance:      {}", self.coordinator.balance_of(&learner).await);
        println!();
        println!("Institution {institution}:");
        println!("  verified:           {}", institution_stats.is_verified);
        println!("  tasks created:      {}", institution_stats.tasks_created);
        println!("  credentials issued: {}", institution_stats.credentials_issued);

        let snapshot = self.coordinator.snapshot().await?;
        println!();
        println!("State root: {}", snapshot.state_root);
        println!("Events:     {}", snapshot.event_count);
        Ok(())
    }

    /// Run the node
    async fn run(&self) -> anyhow::Result<()> {
        let mut live = self.coordinator.events().read().await.subscribe();
        let watcher = tokio::spawn(async move {
            while let Ok(record) = live.recv().await {
                debug!(sequence = record.sequence, emitter = %record.emitter, "Event committed");
            }
        });

        self.onboard().await?;
        self.run_workflow().await?;
        self.report().await?;

        watcher.abort();
        Ok(())
    }
}

fn parse_args() -> NodeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = NodeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if let Some(path) = args.get(i) {
                    config.config_path = PathBuf::from(path);
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn print_help() {
    println!("LearnChain Node");
    println!();
    println!("USAGE:");
    println!("    learnchain-node [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>   Protocol config file (default: learnchain.json)");
    println!("    -h, --help            Print help");
    println!();
    println!("ENVIRONMENT:");
    println!("    LEARNCHAIN_CHAIN_ID   Override the configured chain id");
    println!("    RUST_LOG              Log filter (default: info)");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    println!();
    println!("   LearnChain Protocol v{}", learnchain::VERSION);
    println!("   \"Learn. Prove. Earn.\"");
    println!();

    let node_config = parse_args();
    let config = ProtocolConfig::load(&node_config.config_path)?;
    info!(chain_id = config.chain_id, "Configuration loaded");

    let node = LearnChainNode::new(&config)?;
    node.run().await?;

    Ok(())
}
