//! Gossip (epidemic) consensus.
//!
//! Each participant starts with its own seeded vote and repeatedly samples
//! `fanout` random peers, adopting the majority option across what it
//! receives, until the leading option holds a `convergence_threshold`
//! fraction of the swarm or `max_rounds` is exhausted.

use crate::domain::{ConsensusDecision, ConsensusResult, ParticipantVote, Proposal};
use crate::error::ConsensusError;
use crate::ports::consensus_strategy::{intended_vote, DEFAULT_VOTE};
use crate::ports::ConsensusStrategy;
use async_trait::async_trait;
use rand::seq::IteratorRandom;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Gossip/epidemic strategy; tunable via `fanout`, `max_rounds`, and
/// `convergence_threshold` (defaults: `k=3`, `r=5`, `θ=0.95`).
pub struct GossipStrategy {
    fanout: usize,
    max_rounds: u32,
    convergence_threshold: f64,
}

impl GossipStrategy {
    /// A strategy with explicit tuning parameters.
    #[must_use]
    pub const fn new(fanout: usize, max_rounds: u32, convergence_threshold: f64) -> Self {
        Self {
            fanout,
            max_rounds,
            convergence_threshold,
        }
    }
}

impl Default for GossipStrategy {
    fn default() -> Self {
        Self::new(3, 5, 0.95)
    }
}

/// Majority option among `values`, ties broken by lexicographic ordering
/// (one pairwise gossip exchange).
fn majority_option(values: &[&String]) -> String {
    let mut counts: HashMap<&String, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_opt, a_count), (b_opt, b_count)| {
            a_count.cmp(b_count).then_with(|| b_opt.cmp(a_opt))
        })
        .map(|(opt, _)| opt.clone())
        .unwrap_or_else(|| DEFAULT_VOTE.to_string())
}

/// Leading option and the fraction of the swarm currently holding it.
fn leading_fraction(tally: &HashMap<String, String>) -> (String, f64) {
    let mut counts: HashMap<&String, usize> = HashMap::new();
    for v in tally.values() {
        *counts.entry(v).or_insert(0) += 1;
    }
    let total = tally.len().max(1);
    let (option, count) = counts
        .into_iter()
        .max_by(|(a_opt, a_count), (b_opt, b_count)| {
            a_count.cmp(b_count).then_with(|| b_opt.cmp(a_opt))
        })
        .map_or_else(|| (DEFAULT_VOTE.to_string(), 0), |(opt, count)| (opt.clone(), count));
    (option, count as f64 / total as f64)
}

#[async_trait]
impl ConsensusStrategy for GossipStrategy {
    fn name(&self) -> &'static str {
        "gossip"
    }

    #[instrument(skip(self, proposal, participants), fields(proposal_id = %proposal.proposal_id))]
    async fn propose(
        &self,
        proposal: &Proposal,
        participants: &[String],
        _timeout: Duration,
    ) -> Result<ConsensusResult, ConsensusError> {
        let mut sorted: Vec<String> = participants.to_vec();
        sorted.sort();

        if sorted.is_empty() {
            return Ok(ConsensusResult {
                proposal_id: proposal.proposal_id.clone(),
                decision: ConsensusDecision::NoQuorum,
                votes_for: 0,
                votes_against: 0,
                abstain: 0,
                participants: sorted,
                vote_detail: Vec::new(),
                threshold: self.convergence_threshold,
                metadata: HashMap::new(),
            });
        }

        let mut tally: HashMap<String, String> = sorted
            .iter()
            .map(|id| (id.clone(), intended_vote(proposal, id)))
            .collect();

        if sorted.len() == 1 {
            let only = &sorted[0];
            let vote = tally[only].clone();
            return Ok(single_agent_result(proposal, only, &vote));
        }

        let effective_fanout = self.fanout.min(sorted.len() - 1);
        let mut rounds_executed = 0u32;
        let mut converged = false;
        let mut rng = rand::thread_rng();

        let (mut leading_option, mut leading_frac) = leading_fraction(&tally);
        if leading_frac >= self.convergence_threshold {
            converged = true;
        }

        while !converged && rounds_executed < self.max_rounds {
            let mut next_tally = tally.clone();
            for agent_id in &sorted {
                let peers: Vec<&String> = sorted
                    .iter()
                    .filter(|id| *id != agent_id)
                    .choose_multiple(&mut rng, effective_fanout);
                let mut received: Vec<&String> = peers.iter().map(|id| &tally[id.as_str()]).collect();
                received.push(&tally[agent_id]);
                next_tally.insert(agent_id.clone(), majority_option(&received));
            }
            tally = next_tally;
            rounds_executed += 1;

            let (opt, frac) = leading_fraction(&tally);
            leading_option = opt;
            leading_frac = frac;
            if leading_frac >= self.convergence_threshold {
                converged = true;
            }
            debug!(rounds_executed, leading_frac, %leading_option, "gossip round complete");
        }

        let has_plurality = {
            let mut counts: HashMap<&String, usize> = HashMap::new();
            for v in tally.values() {
                *counts.entry(v).or_insert(0) += 1;
            }
            let mut sorted_counts: Vec<usize> = counts.values().copied().collect();
            sorted_counts.sort_unstable_by(|a, b| b.cmp(a));
            sorted_counts.len() == 1 || sorted_counts.first() != sorted_counts.get(1)
        };

        let decision = if converged || has_plurality {
            ConsensusDecision::Approved
        } else {
            ConsensusDecision::Timeout
        };

        let vote_detail: Vec<ParticipantVote> = sorted
            .iter()
            .map(|id| ParticipantVote {
                agent_id: id.clone(),
                vote: tally[id].clone(),
            })
            .collect();
        let votes_for = vote_detail.iter().filter(|v| v.vote == leading_option).count();
        let votes_against = vote_detail.len() - votes_for;

        info!(?decision, rounds_executed, converged, %leading_option, leading_frac, "gossip consensus complete");

        let mut metadata = HashMap::new();
        metadata.insert("rounds_executed".to_string(), json!(rounds_executed));
        metadata.insert("converged".to_string(), json!(converged));
        metadata.insert("winning_option".to_string(), json!(leading_option));
        metadata.insert("convergence_ratio".to_string(), json!(leading_frac));
        metadata.insert(
            "total_messages".to_string(),
            json!(sorted.len() * effective_fanout * rounds_executed as usize),
        );
        metadata.insert(
            "final_distribution".to_string(),
            json!(distribution(&tally)),
        );

        Ok(ConsensusResult {
            proposal_id: proposal.proposal_id.clone(),
            decision,
            votes_for,
            votes_against,
            abstain: 0,
            participants: sorted,
            vote_detail,
            threshold: self.convergence_threshold,
            metadata,
        })
    }
}

fn distribution(tally: &HashMap<String, String>) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for v in tally.values() {
        *counts.entry(v.clone()).or_insert(0) += 1;
    }
    counts
}

fn single_agent_result(proposal: &Proposal, agent_id: &str, vote: &str) -> ConsensusResult {
    let mut metadata = HashMap::new();
    metadata.insert("rounds_executed".to_string(), json!(0));
    metadata.insert("converged".to_string(), json!(true));
    metadata.insert("winning_option".to_string(), json!(vote));
    metadata.insert("convergence_ratio".to_string(), json!(1.0));
    metadata.insert("total_messages".to_string(), json!(0));
    ConsensusResult {
        proposal_id: proposal.proposal_id.clone(),
        decision: ConsensusDecision::Approved,
        votes_for: 1,
        votes_against: 0,
        abstain: 0,
        participants: vec![agent_id.to_string()],
        vote_detail: vec![ParticipantVote {
            agent_id: agent_id.to_string(),
            vote: vote.to_string(),
        }],
        threshold: 1.0,
        metadata,
    }
}
