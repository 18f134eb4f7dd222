//! Implementation of the `veer vote` command.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::Args;

use crate::adapters::sqlite::{SqliteConfigRepository, SqlitePollRepository};
use crate::cli::id_resolver::resolve_poll_id;
use crate::cli::identity::{Identity, IdentityArgs};
use crate::cli::output::{format_percent, output, CommandOutput};
use crate::domain::models::{Ballot, Poll, PollKind, SettlementOutcome, Side};
use crate::domain::ports::PollRepository;
use crate::services::{MessageResolver, MetricsService, SettlementService};

#[derive(Args, Debug)]
pub struct VoteArgs {
    /// Poll ID (any unique prefix); alternative to --stage/--level/--order
    #[arg(long)]
    pub poll: Option<String>,

    /// Stage of the poll
    #[arg(long)]
    pub stage: Option<u32>,
    /// Level of the poll within the stage
    #[arg(long)]
    pub level: Option<u32>,
    /// Order of the poll within the level
    #[arg(long)]
    pub order: Option<u32>,

    /// Placement of the first option (binary polls): left or right
    #[arg(long, value_parser = parse_side)]
    pub side: Option<Side>,
    /// Option ordinal grouped with option 1 (grouping polls): 2, 3 or 4
    #[arg(long)]
    pub pair_with: Option<u32>,
    /// Chosen option ordinal (choice and consensus polls)
    #[arg(long)]
    pub option: Option<u32>,

    #[command(flatten)]
    pub identity: IdentityArgs,
}

fn parse_side(s: &str) -> Result<Side, String> {
    Side::from_str(s).ok_or_else(|| format!("invalid side '{s}': use left or right"))
}

#[derive(Debug, serde::Serialize)]
pub struct VoteOutput {
    #[serde(flatten)]
    pub outcome: SettlementOutcome,
}

impl CommandOutput for VoteOutput {
    fn to_human(&self) -> String {
        let outcome = &self.outcome;
        if !outcome.success {
            return format!(
                "Rejected: {}",
                outcome.message.as_deref().unwrap_or("settlement failed")
            );
        }

        let mut lines = vec![format!(
            "{}: {} point(s) earned (change {:+}, total {})",
            if outcome.correct { "Correct" } else { "Incorrect" },
            outcome.points_earned,
            outcome.score_delta,
            outcome.total_score
        )];
        if !outcome.feedback.is_empty() {
            lines.push(outcome.feedback.clone());
        }

        if let Some(consensus) = &outcome.consensus {
            let counts = consensus
                .counts
                .iter()
                .map(|c| format!("option {}: {}", c.ordinal, c.count))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!(
                "Consensus so far ({} vote(s)): {} [majority share {}]",
                consensus.total,
                counts,
                format_percent(consensus.majority_share)
            ));
        }

        if let Some(completion) = &outcome.completion {
            lines.push(format!(
                "Level {} of stage {} complete: {} point(s), bonus {}",
                completion.level, completion.stage, completion.points_earned, completion.bonus
            ));
            if completion.stage_bonus > 0 {
                lines.push(format!("Stage bonus: {}", completion.stage_bonus));
            }
            if let Some(tier) = &completion.tier {
                lines.push(format!("Tier {}: {}", tier.label, tier.title));
                if !tier.message.is_empty() {
                    lines.push(tier.message.clone());
                }
            }
            if completion.level_up {
                lines.push(format!(
                    "Next up: stage {}, level {} (run 'veer advance' to move on)",
                    completion.next.stage, completion.next.level
                ));
            }
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

async fn find_poll(
    args: &VoteArgs,
    polls: &SqlitePollRepository,
    pool: &sqlx::SqlitePool,
) -> Result<Poll> {
    if let Some(prefix) = &args.poll {
        let id = resolve_poll_id(pool, prefix).await?;
        return polls
            .get(id)
            .await?
            .ok_or_else(|| anyhow!("Poll not found: {prefix}"));
    }

    match (args.stage, args.level, args.order) {
        (Some(stage), Some(level), Some(order)) => polls
            .get_by_position(stage, level, order)
            .await?
            .ok_or_else(|| anyhow!("No poll at stage {stage}, level {level}, order {order}")),
        _ => bail!("Specify --poll or all of --stage, --level and --order"),
    }
}

fn build_ballot(args: &VoteArgs, poll: &Poll) -> Result<Ballot> {
    match poll.kind {
        PollKind::BinaryPlacement => {
            let first_side = args
                .side
                .ok_or_else(|| anyhow!("This poll needs --side left|right"))?;
            Ok(Ballot::BinaryPlacement { first_side })
        }
        PollKind::QuadGrouping => {
            let partner = args
                .pair_with
                .ok_or_else(|| anyhow!("This poll needs --pair-with 2|3|4"))?;
            if !(2..=4).contains(&partner) {
                bail!("--pair-with must be 2, 3 or 4");
            }
            let rest: Vec<u32> = (2..=4).filter(|o| *o != partner).collect();
            Ok(Ballot::QuadGrouping {
                groups: [[1, partner], [rest[0], rest[1]]],
            })
        }
        PollKind::MultiChoice | PollKind::ConsensusVote => {
            let ordinal = args
                .option
                .ok_or_else(|| anyhow!("This poll needs --option <ordinal>"))?;
            let option = poll
                .option_by_ordinal(ordinal)
                .ok_or_else(|| anyhow!("Poll has no option {ordinal}"))?;
            if poll.kind == PollKind::MultiChoice {
                Ok(Ballot::MultiChoice { option_id: option.id })
            } else {
                Ok(Ballot::ConsensusVote { option_id: option.id })
            }
        }
    }
}

pub async fn execute(args: VoteArgs, json_mode: bool) -> Result<()> {
    let (config, pool) = super::open_pool().await?;

    let polls = Arc::new(SqlitePollRepository::new(pool.clone()));
    let configs = Arc::new(SqliteConfigRepository::new(pool.clone()));

    let poll = find_poll(&args, &polls, &pool).await?;
    let ballot = build_ballot(&args, &poll)?;

    let identity = Identity::open(&args.identity, &pool).await?;
    let service = SettlementService::new(polls.clone(), configs.clone(), &config.scoring);
    let mut outcome = service.settle(identity.store(), poll.id, ballot).await;

    // Feedback may carry placeholders; resolve them against this identity's
    // history before it reaches the player.
    if outcome.success && !outcome.feedback.is_empty() {
        let resolver = MessageResolver::new(polls, MetricsService::new(configs));
        outcome.feedback = resolver.resolve(identity.store(), &outcome.feedback).await?;
    }

    identity.persist().await?;

    output(&VoteOutput { outcome }, json_mode);
    Ok(())
}
