// Path: crates/types/src/proposal.rs
//! Content-addressed governance ballots.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::crypto::{sha256, Address, PublicKey, Signature};
use crate::envelope::Envelope;

/// The immutable body of a proposal: a human description plus the batch of
/// envelopes to execute if it passes.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Proposal {
    /// Short name of the proposal.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// The transaction batch executed when the ballot passes.
    pub batch: Vec<Envelope>,
}

impl Proposal {
    /// The content address of the proposal: sha256 over its canonical
    /// encoding. Identical proposals share a ballot.
    pub fn hash(&self) -> [u8; 32] {
        sha256(&crate::codec::to_bytes_canonical(self))
    }
}

/// A recorded vote: who, with what key, over which power.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Vote {
    /// The voting account.
    pub address: Address,
    /// The voter's public key.
    pub public_key: PublicKey,
    /// Signature over the proposal hash.
    pub signature: Signature,
    /// Voting power at the time of the vote.
    pub power: u64,
}

/// Lifecycle of a ballot. `Executed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum BallotState {
    /// Accepting votes.
    Proposed,
    /// Passed threshold and its batch was applied.
    Executed,
    /// Batch execution failed; the ballot cannot be retried.
    Failed,
}

/// A proposal under vote. Mutations are additive: votes accrete until the
/// threshold passes, after which the ballot is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Ballot {
    /// The immutable proposal body.
    pub proposal: Proposal,
    /// Accreted votes, one per voter.
    pub votes: Vec<Vote>,
    /// Current lifecycle state.
    pub state: BallotState,
}

impl Ballot {
    /// A fresh ballot with no votes.
    pub fn new(proposal: Proposal) -> Self {
        Ballot {
            proposal,
            votes: Vec::new(),
            state: BallotState::Proposed,
        }
    }

    /// Total power behind the ballot.
    pub fn voted_power(&self) -> u64 {
        self.votes.iter().map(|v| v.power).sum()
    }

    /// Whether `address` has already voted.
    pub fn has_voted(&self, address: &Address) -> bool {
        self.votes.iter().any(|v| &v.address == address)
    }
}
