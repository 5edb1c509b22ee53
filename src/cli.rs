//! LearnChain CLI - keys, proof hashes and signing digests

use std::io::{self, Write};
use std::path::Path;

use learnchain::{
    config::ProtocolConfig,
    crypto::{hash_data, Keypair, ProofMessage, ProofSignature, SigningDomain},
    types::{now_millis, Address, TaskId, HOUR_MS},
};

fn print_help() {
    println!("Commands:");
    println!("  keygen                 - Generate a new keypair");
    println!("  hash <data>            - BLAKE3 proof hash of <data>");
    println!("  domain                 - Show the signing domain and its separator");
    println!("  sign <task_id> <data>  - Sign a proof of <data> with the session key");
    println!("  help                   - Show this help");
    println!("  quit                   - Exit");
}

/// Public details of a generated keypair; the secret seed is never shown
fn describe_keypair(keypair: &Keypair) -> Vec<String> {
    vec![
        format!(
            "  Address:    {}",
            Address::from_public_key(keypair.public_key())
        ),
        format!("  Public Key: {}", keypair.public_key()),
    ]
}

/// Domain of the proof verifier as `learnchain-node` deploys it
fn deployed_domain(config: &ProtocolConfig) -> SigningDomain {
    SigningDomain {
        name: config.domain_name.clone(),
        version: config.domain_version.clone(),
        chain_id: config.chain_id,
        verifying_contract: Address::from_label("proof-verifier"),
    }
}

fn main() -> anyhow::Result<()> {
    let config = ProtocolConfig::load(Path::new("learnchain.json"))?;
    let domain = deployed_domain(&config);

    println!("LearnChain CLI v{}", learnchain::VERSION);
    println!();

    let keypair = Keypair::generate();
    let address = Address::from_public_key(keypair.public_key());
    println!("Session address: {address}");
    println!();
    print_help();
    println!();

    loop {
        print!("learn> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some(command) = parts.first() else {
            continue;
        };

        match *command {
            "keygen" => {
                let new_keypair = Keypair::generate();
                println!("Generated new keypair:");
                for line in describe_keypair(&new_keypair) {
                    println!("{line}");
                }
            }

            "hash" => {
                if parts.len() < 2 {
                    println!("Usage: hash <data>");
                    continue;
                }
                let data = parts[1..].join(" ");
                println!("{}", hash_data(data.as_bytes()));
            }

            "domain" => {
                println!("Name:               {}", domain.name);
                println!("Version:            {}", domain.version);
                println!("Chain id:           {}", domain.chain_id);
                println!("Verifying contract: {}", domain.verifying_contract);
                println!("Separator:          {}", domain.separator());
            }

            "sign" => {
                let task_id = parts.get(1).and_then(|s| s.parse::<TaskId>().ok());
                let (Some(task_id), true) = (task_id, parts.len() > 2) else {
                    println!("Usage: sign <task_id> <data>");
                    continue;
                };
                let proof_hash = hash_data(parts[2..].join(" ").as_bytes());
                let deadline = now_millis() + HOUR_MS;
                let message = ProofMessage {
                    task_id,
                    learner: address,
                    proof_hash,
                    nonce: 0,
                    deadline,
                };
                let signature =
                    ProofSignature::sign(&keypair, &domain, task_id, proof_hash, 0, deadline);
                println!("Proof hash: {proof_hash}");
                println!("Digest:     {}", message.digest(&domain));
                println!("Deadline:   {deadline}");
                println!("Signature:  {}", signature.signature.to_hex());
            }

            "help" => print_help(),

            "quit" | "exit" | "q" => {
                println!("Goodbye!");
                break;
            }

            other => {
                println!("Unknown command: {other}. Type 'help' for available commands.");
            }
        }

        println!();
    }

    Ok(())
}
