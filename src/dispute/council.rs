//! Level-3 review council
//!
//! A council is exactly three distinct champions. It decides when two of
//! the three agree on the same `(resolution, sanction)` pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::outcome::{DisputeResolution, DisputeSanction};
use crate::error::{PolicyError, Result};
use crate::trust::TrustTier;

pub const COUNCIL_SIZE: usize = 3;

/// Votes needed for a council decision
pub const COUNCIL_MAJORITY: usize = COUNCIL_SIZE / 2 + 1;

/// A candidate council member and the tier they currently hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouncilSeat {
    pub participant_id: String,
    pub tier: TrustTier,
}

impl CouncilSeat {
    pub fn new(participant_id: &str, tier: TrustTier) -> Self {
        Self {
            participant_id: participant_id.to_string(),
            tier,
        }
    }
}

/// Validated council membership
///
/// Deserialized councils are re-checked for cardinality and distinctness.
/// Tiers are not part of the wire form, so eligibility is only enforced by
/// `Council::new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCouncil")]
pub struct Council {
    members: Vec<String>,
}

#[derive(Deserialize)]
struct RawCouncil {
    members: Vec<String>,
}

impl TryFrom<RawCouncil> for Council {
    type Error = PolicyError;

    fn try_from(raw: RawCouncil) -> Result<Self> {
        check_membership(&raw.members)?;
        Ok(Self {
            members: raw.members,
        })
    }
}

fn check_membership(members: &[String]) -> Result<()> {
    if members.len() != COUNCIL_SIZE {
        return Err(PolicyError::InvalidCouncil(format!(
            "council needs exactly {} members, got {}",
            COUNCIL_SIZE,
            members.len()
        )));
    }

    let distinct: BTreeSet<&str> = members.iter().map(String::as_str).collect();
    if distinct.len() != members.len() {
        return Err(PolicyError::InvalidCouncil(
            "council members must be distinct".to_string(),
        ));
    }
    Ok(())
}

impl Council {
    pub fn new(seats: &[CouncilSeat], required_tier: TrustTier) -> Result<Self> {
        let members: Vec<String> = seats.iter().map(|s| s.participant_id.clone()).collect();
        check_membership(&members)?;

        if let Some(seat) = seats.iter().find(|s| s.tier < required_tier) {
            return Err(PolicyError::InvalidCouncil(format!(
                "{} is {}, council requires {}",
                seat.participant_id, seat.tier, required_tier
            )));
        }

        Ok(Self { members })
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn contains(&self, participant_id: &str) -> bool {
        self.members.iter().any(|m| m == participant_id)
    }
}

/// One reviewer's decision on a level-3 dispute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilVote {
    pub champion_id: String,
    pub resolution: DisputeResolution,
    pub sanction: DisputeSanction,
    /// Proposed credits when voting `partial_credit`
    #[serde(default)]
    pub credit_adjustment: Option<f64>,
    pub reasoning: String,
    pub voted_at: DateTime<Utc>,
}

/// The `(resolution, sanction)` pair at least `COUNCIL_MAJORITY` votes share
pub fn majority_decision(votes: &[CouncilVote]) -> Option<(DisputeResolution, DisputeSanction)> {
    let mut counts: HashMap<(DisputeResolution, DisputeSanction), usize> = HashMap::new();
    for vote in votes {
        *counts.entry((vote.resolution, vote.sanction)).or_default() += 1;
    }
    counts
        .into_iter()
        .find(|(_, count)| *count >= COUNCIL_MAJORITY)
        .map(|(pair, _)| pair)
}

/// Mean credit adjustment proposed by the votes backing `decision`
pub fn majority_credit_adjustment(
    votes: &[CouncilVote],
    decision: (DisputeResolution, DisputeSanction),
) -> Option<f64> {
    let amounts: Vec<f64> = votes
        .iter()
        .filter(|v| (v.resolution, v.sanction) == decision)
        .filter_map(|v| v.credit_adjustment)
        .collect();
    if amounts.is_empty() {
        return None;
    }
    Some(amounts.iter().sum::<f64>() / amounts.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn champions(n: usize) -> Vec<CouncilSeat> {
        (0..n)
            .map(|i| CouncilSeat::new(&format!("champ{}", i), TrustTier::Champion))
            .collect()
    }

    fn vote(id: &str, resolution: DisputeResolution, sanction: DisputeSanction) -> CouncilVote {
        CouncilVote {
            champion_id: id.to_string(),
            resolution,
            sanction,
            credit_adjustment: None,
            reasoning: String::new(),
            voted_at: Utc::now(),
        }
    }

    #[test]
    fn test_council_cardinality() {
        assert!(Council::new(&champions(3), TrustTier::Champion).is_ok());
        for n in [0, 2, 4] {
            assert!(matches!(
                Council::new(&champions(n), TrustTier::Champion),
                Err(PolicyError::InvalidCouncil(_))
            ));
        }
    }

    #[test]
    fn test_council_eligibility() {
        let mut seats = champions(3);
        seats[1].tier = TrustTier::Verified;
        assert!(matches!(
            Council::new(&seats, TrustTier::Champion),
            Err(PolicyError::InvalidCouncil(_))
        ));

        let mut seats = champions(3);
        seats[2].participant_id = "champ0".to_string();
        assert!(Council::new(&seats, TrustTier::Champion).is_err());
    }

    #[test]
    fn test_majority() {
        use DisputeResolution::*;
        use DisputeSanction as S;

        let votes = vec![
            vote("a", FullCredit, S::None),
            vote("b", PartialCredit, S::Warning),
            vote("c", FullCredit, S::None),
        ];
        assert_eq!(majority_decision(&votes), Some((FullCredit, S::None)));

        let split = vec![
            vote("a", FullCredit, S::None),
            vote("b", FullCredit, S::Warning),
            vote("c", Voided, S::None),
        ];
        assert_eq!(majority_decision(&split), None);
        assert_eq!(majority_decision(&split[..1]), None);
    }

    #[test]
    fn test_deserialized_council_is_checked() {
        let council: Council =
            serde_json::from_str(r#"{"members":["champ0","champ1","champ2"]}"#).unwrap();
        assert_eq!(council.members().len(), COUNCIL_SIZE);

        for json in [
            r#"{"members":["only_one"]}"#,
            r#"{"members":["champ0","champ1"]}"#,
            r#"{"members":["a","b","c","d"]}"#,
            r#"{"members":["a","b","a"]}"#,
        ] {
            assert!(serde_json::from_str::<Council>(json).is_err(), "{}", json);
        }
    }

    #[test]
    fn test_majority_credit_adjustment() {
        use DisputeResolution::*;
        use DisputeSanction as S;

        let mut votes = vec![
            vote("a", PartialCredit, S::None),
            vote("b", PartialCredit, S::None),
            vote("c", FullCredit, S::None),
        ];
        votes[0].credit_adjustment = Some(2.0);
        votes[1].credit_adjustment = Some(3.0);
        votes[2].credit_adjustment = None;

        assert_eq!(
            majority_credit_adjustment(&votes, (PartialCredit, S::None)),
            Some(2.5)
        );
        assert_eq!(majority_credit_adjustment(&votes, (FullCredit, S::None)), None);
    }
}
