// Path: crates/execution/src/contexts/proposal.rs
//! Ballot creation, vote accretion and threshold execution.
//!
//! Ballots are content-addressed, so identical proposals converge on one
//! entry and votes accrete onto it. Once the voted power reaches 2/3 of
//! total bonded power the embedded batch executes and the ballot becomes
//! terminal either way.

use arbor_state::{AccountWriter, ProposalReader, ProposalWriter};
use arbor_types::error::ExecutionError;
use arbor_types::{
    Ballot, BallotState, Event, PayloadKind, PermFlag, ProposalTx, TxExecution, Vote,
};

use super::{execute_payload, require_permission, validate_input, ContextEnv};

/// Pass threshold numerator: a ballot passes at `voted * 3 >= total * 2`.
pub const PROPOSAL_PASS_NUMERATOR: u64 = 2;
/// Pass threshold denominator.
pub const PROPOSAL_PASS_DENOMINATOR: u64 = 3;

pub fn execute(
    env: &ContextEnv<'_>,
    txe: &mut TxExecution,
    tx: &ProposalTx,
) -> Result<(), ExecutionError> {
    if env.depth > 0 {
        return Err(ExecutionError::Invalid(
            "proposals cannot nest inside ballot batches".to_string(),
        ));
    }
    let account = validate_input(env, txe, &tx.input)?;
    require_permission(env, &account, PermFlag::Propose)?;

    let hash = match (&tx.proposal, tx.proposal_hash) {
        (Some(proposal), maybe_hash) => {
            let computed = proposal.proposal.hash();
            if maybe_hash.is_some_and(|h| h != computed) {
                return Err(ExecutionError::Invalid(
                    "proposal hash does not match proposal contents".to_string(),
                ));
            }
            computed
        }
        (None, Some(hash)) => hash,
        (None, None) => {
            return Err(ExecutionError::Invalid(
                "proposal transaction carries neither ballot nor hash".to_string(),
            ));
        }
    };

    let mut ballot = match env.state.proposals.get_proposal(&hash)? {
        Some(ballot) => {
            if ballot.state != BallotState::Proposed {
                return Err(ExecutionError::ProposalExecuted(hex::encode(hash)));
            }
            ballot
        }
        None => {
            let proposal = tx.proposal.clone().ok_or_else(|| {
                ExecutionError::Invalid(format!("no ballot under hash {}", hex::encode(hash)))
            })?;
            for envelope in &proposal.proposal.batch {
                if envelope.payload.kind() == PayloadKind::Proposal {
                    return Err(ExecutionError::Invalid(
                        "proposals cannot nest inside ballot batches".to_string(),
                    ));
                }
            }
            Ballot::new(proposal.proposal)
        }
    };

    if ballot.has_voted(&account.address) {
        return Err(ExecutionError::Invalid(format!(
            "{} has already voted on {}",
            account.address,
            hex::encode(hash)
        )));
    }

    let public_key = account
        .public_key
        .clone()
        .ok_or(ExecutionError::UnknownAccount(account.address))?;
    let power = env.state.validators.power(&public_key)?;
    let signature = txe
        .envelope
        .signatories
        .iter()
        .find(|s| s.address == account.address)
        .map(|s| s.signature.clone())
        .ok_or_else(|| ExecutionError::InvalidSignature("voter did not sign".to_string()))?;

    ballot.votes.push(Vote {
        address: account.address,
        public_key,
        signature,
        power,
    });
    env.state.accounts.update_account(account)?;
    txe.push_event(Event::ProposalVoted {
        proposal: hash,
        voter: tx.input.address,
        power,
    });

    let total = env.state.validators.total_power()?;
    let passed = total > 0
        && ballot.voted_power().saturating_mul(PROPOSAL_PASS_DENOMINATOR)
            >= total.saturating_mul(PROPOSAL_PASS_NUMERATOR);
    if passed {
        ballot.state = execute_batch(env, txe, &ballot)?;
        txe.push_event(Event::ProposalExecuted { proposal: hash });
    }
    env.state.proposals.update_proposal(hash, ballot)?;
    Ok(())
}

// Runs the ballot batch one recursion level deep. Each embedded envelope
// gets its own child record and nested cache; a failing envelope marks the
// ballot failed but leaves the vote record intact.
fn execute_batch(
    env: &ContextEnv<'_>,
    txe: &mut TxExecution,
    ballot: &Ballot,
) -> Result<BallotState, ExecutionError> {
    let mut state = BallotState::Executed;
    for (offset, envelope) in ballot.proposal.batch.iter().enumerate() {
        let mut envelope = envelope.clone();
        envelope.rehash();
        let mut child = TxExecution::new(env.height, offset as u32, envelope.clone());
        let nested = env.state.child();
        let child_env = ContextEnv {
            state: &nested,
            height: env.height,
            vm: env.vm,
            depth: env.depth + 1,
        };
        match execute_payload(&child_env, &mut child, &envelope.payload) {
            Ok(()) => {
                env.state.absorb(&nested)?;
            }
            Err(err) => {
                child.set_exception(&err);
                state = BallotState::Failed;
            }
        }
        txe.children.push(child);
    }
    Ok(state)
}
