use crate::{
    constants::POW_DIFFICULTY,
    primitives::{
        SpecId,
        U256,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown fork identifier: {0}")]
pub struct UnknownFork(pub String);

/// Consensus profile a fork runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusType {
    ProofOfWork,
    ProofOfStake,
}

/// Hardforks the sandbox can be bootstrapped with.
///
/// The two legacy forks run under proof-of-work, everything newer under
/// proof-of-stake. Selected once at context creation and immutable for the
/// context's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkSpec {
    Berlin,
    London,
    #[default]
    Merge,
    Shanghai,
    Cancun,
    Prague,
}

impl ForkSpec {
    pub fn consensus_type(self) -> ConsensusType {
        match self {
            ForkSpec::Berlin | ForkSpec::London => ConsensusType::ProofOfWork,
            _ => ConsensusType::ProofOfStake,
        }
    }

    /// Block difficulty under this fork. Derived from the consensus type and
    /// never configurable on its own: zero under proof-of-stake, a fixed
    /// constant under proof-of-work.
    pub fn difficulty(self) -> U256 {
        match self.consensus_type() {
            ConsensusType::ProofOfWork => U256::from(POW_DIFFICULTY),
            ConsensusType::ProofOfStake => U256::ZERO,
        }
    }

    /// The revm spec the execution engine runs under this fork.
    pub fn spec_id(self) -> SpecId {
        match self {
            ForkSpec::Berlin => SpecId::BERLIN,
            ForkSpec::London => SpecId::LONDON,
            ForkSpec::Merge => SpecId::MERGE,
            ForkSpec::Shanghai => SpecId::SHANGHAI,
            ForkSpec::Cancun => SpecId::CANCUN,
            ForkSpec::Prague => SpecId::PRAGUE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ForkSpec::Berlin => "berlin",
            ForkSpec::London => "london",
            ForkSpec::Merge => "merge",
            ForkSpec::Shanghai => "shanghai",
            ForkSpec::Cancun => "cancun",
            ForkSpec::Prague => "prague",
        }
    }
}

impl FromStr for ForkSpec {
    type Err = UnknownFork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "berlin" => Ok(ForkSpec::Berlin),
            "london" => Ok(ForkSpec::London),
            "merge" | "paris" => Ok(ForkSpec::Merge),
            "shanghai" => Ok(ForkSpec::Shanghai),
            "cancun" => Ok(ForkSpec::Cancun),
            "prague" => Ok(ForkSpec::Prague),
            other => Err(UnknownFork(other.to_string())),
        }
    }
}

impl fmt::Display for ForkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_forks_are_proof_of_work() {
        assert_eq!(ForkSpec::Berlin.consensus_type(), ConsensusType::ProofOfWork);
        assert_eq!(ForkSpec::London.consensus_type(), ConsensusType::ProofOfWork);
    }

    #[test]
    fn post_merge_forks_are_proof_of_stake() {
        for fork in [
            ForkSpec::Merge,
            ForkSpec::Shanghai,
            ForkSpec::Cancun,
            ForkSpec::Prague,
        ] {
            assert_eq!(fork.consensus_type(), ConsensusType::ProofOfStake);
        }
    }

    #[test]
    fn difficulty_is_paired_with_consensus_type() {
        for fork in [
            ForkSpec::Berlin,
            ForkSpec::London,
            ForkSpec::Merge,
            ForkSpec::Shanghai,
            ForkSpec::Cancun,
            ForkSpec::Prague,
        ] {
            match fork.consensus_type() {
                ConsensusType::ProofOfWork => {
                    assert_eq!(fork.difficulty(), U256::from(POW_DIFFICULTY));
                }
                ConsensusType::ProofOfStake => assert_eq!(fork.difficulty(), U256::ZERO),
            }
        }
    }

    #[test]
    fn parse_round_trips_through_name() {
        for fork in [
            ForkSpec::Berlin,
            ForkSpec::London,
            ForkSpec::Merge,
            ForkSpec::Shanghai,
            ForkSpec::Cancun,
            ForkSpec::Prague,
        ] {
            assert_eq!(fork.name().parse::<ForkSpec>(), Ok(fork));
        }
    }

    #[test]
    fn paris_is_an_alias_for_merge() {
        assert_eq!("paris".parse::<ForkSpec>(), Ok(ForkSpec::Merge));
    }

    #[test]
    fn unknown_fork_is_a_configuration_error() {
        let err = "homestead".parse::<ForkSpec>().unwrap_err();
        assert_eq!(err, UnknownFork("homestead".to_string()));
    }
}
