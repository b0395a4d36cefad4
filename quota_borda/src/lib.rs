mod config;

pub mod builder;
pub mod manual;

use log::{debug, info, warn};

use std::collections::{HashMap, HashSet};
use std::ops::{Add, AddAssign};

pub use crate::config::*;

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
struct CandidateId(u32);

// An accumulated fractional score. Scores are only ever built up from
// non-negative contributions, so they stay finite and comparable.
#[derive(PartialEq, PartialOrd, Debug, Clone, Copy)]
struct Score(f64);

impl Score {
    const ZERO: Score = Score(0.0);
}

impl std::iter::Sum for Score {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Score(iter.map(|s| s.0).sum())
    }
}

impl AddAssign for Score {
    fn add_assign(&mut self, rhs: Score) {
        self.0 += rhs.0;
    }
}

impl Add for Score {
    type Output = Score;
    fn add(self: Score, rhs: Score) -> Score {
        Score(self.0 + rhs.0)
    }
}

// Invariant: entries are sorted by rank and hold no duplicate rank or
// candidate. Ranks are the original ballot positions (gaps allowed).
#[derive(Eq, PartialEq, Debug, Clone)]
struct CheckedBallot {
    entries: Vec<(u32, CandidateId)>,
}

// Invariant: a total order over the registry. `position` maps every
// candidate to its place in the group order, lower = more preferred.
#[derive(Eq, PartialEq, Debug, Clone)]
struct CheckedGroup {
    position: HashMap<CandidateId, usize>,
    weight: u64,
}

// The candidate registry for one run: names in registration order with
// their interned ids.
#[derive(Eq, PartialEq, Debug, Clone)]
struct Registry {
    ordered: Vec<(String, CandidateId)>,
    by_name: HashMap<String, CandidateId>,
}

fn build_registry(reg_candidates: &[Candidate]) -> Result<Registry, TallyErrors> {
    let mut ordered: Vec<(String, CandidateId)> = Vec::new();
    let mut by_name: HashMap<String, CandidateId> = HashMap::new();
    for c in reg_candidates.iter().filter(|c| !c.excluded) {
        let cid = CandidateId((ordered.len() + 1) as u32);
        if by_name.insert(c.name.clone(), cid).is_some() {
            return Err(TallyErrors::DuplicateRegistryCandidate {
                name: c.name.clone(),
            });
        }
        ordered.push((c.name.clone(), cid));
    }
    if ordered.is_empty() {
        return Err(TallyErrors::EmptyRegistry);
    }
    Ok(Registry { ordered, by_name })
}

fn check_rules(rules: &TallyRules) -> Result<(), TallyErrors> {
    if rules.max_preferences == 0 {
        return Err(TallyErrors::InvalidMaxPreferences {
            max_preferences: rules.max_preferences,
        });
    }
    Ok(())
}

// **** Score table ****

/// The accumulated scores of one tally run.
///
/// Created zeroed for every registered candidate by the scoring pass and
/// mutated in place by the seat allocator, so callers can inspect the table
/// before and after allocation. A run owns its table; nothing leaks into the
/// next run.
#[derive(PartialEq, Debug, Clone)]
pub struct ScoreTable {
    candidates: Vec<(String, CandidateId)>,
    scores: HashMap<CandidateId, Score>,
}

impl ScoreTable {
    fn new(registry: &Registry) -> ScoreTable {
        let scores: HashMap<CandidateId, Score> = registry
            .ordered
            .iter()
            .map(|(_, cid)| (*cid, Score::ZERO))
            .collect();
        ScoreTable {
            candidates: registry.ordered.clone(),
            scores,
        }
    }

    fn add(&mut self, cid: CandidateId, delta: Score) {
        if let Some(s) = self.scores.get_mut(&cid) {
            *s += delta;
        }
    }

    fn get(&self, cid: CandidateId) -> Score {
        self.scores.get(&cid).copied().unwrap_or(Score::ZERO)
    }

    fn reset(&mut self, cid: CandidateId) {
        if let Some(s) = self.scores.get_mut(&cid) {
            *s = Score::ZERO;
        }
    }

    fn name_of(&self, cid: CandidateId) -> &str {
        self.candidates
            .iter()
            .find(|(_, c)| *c == cid)
            .map(|(n, _)| n.as_str())
            .unwrap_or("")
    }

    /// Total of all current scores.
    pub fn total(&self) -> f64 {
        self.scores.values().copied().sum::<Score>().0
    }

    /// The current score of a candidate, if it is registered.
    pub fn score(&self, name: &str) -> Option<f64> {
        self.candidates
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cid)| self.get(*cid).0)
    }

    /// All scores in descending order. Candidates with equal scores keep
    /// their registry order.
    pub fn sorted_scores(&self) -> Vec<(String, f64)> {
        let mut res: Vec<(String, f64)> = self
            .candidates
            .iter()
            .map(|(name, cid)| (name.clone(), self.get(*cid).0))
            .collect();
        res.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        res
    }
}

// **** Ballot validation ****

fn check_ballot(
    ballot: &Ballot,
    registry: &Registry,
    rules: &TallyRules,
) -> Result<CheckedBallot, RejectionReason> {
    if ballot.rankings.is_empty() {
        return Err(RejectionReason::EmptyBallot);
    }

    // Sorting by rank is an explicit step: the order of the input pairs
    // carries no meaning.
    let mut sorted = ballot.rankings.clone();
    sorted.sort_by_key(|(rank, _)| *rank);

    let mut entries: Vec<(u32, CandidateId)> = Vec::with_capacity(sorted.len());
    let mut seen_ranks: HashSet<u32> = HashSet::new();
    let mut seen_cids: HashSet<CandidateId> = HashSet::new();
    for (rank, name) in sorted.iter() {
        if *rank == 0 || *rank > rules.max_preferences {
            return Err(RejectionReason::RankOutOfRange { rank: *rank });
        }
        let cid = match registry.by_name.get(name) {
            Some(cid) => *cid,
            None => {
                return Err(RejectionReason::UnknownCandidate { name: name.clone() });
            }
        };
        if !seen_ranks.insert(*rank) {
            return Err(RejectionReason::DuplicateRank { rank: *rank });
        }
        if !seen_cids.insert(cid) {
            return Err(RejectionReason::DuplicateCandidate { name: name.clone() });
        }
        entries.push((*rank, cid));
    }
    Ok(CheckedBallot { entries })
}

// Rejections are not fatal to the batch: the offending ballot is skipped
// with a diagnostic and processing continues.
fn check_ballots(
    coll: &[Ballot],
    registry: &Registry,
    rules: &TallyRules,
) -> (Vec<CheckedBallot>, Vec<BallotRejection>) {
    let mut checked: Vec<CheckedBallot> = Vec::with_capacity(coll.len());
    let mut rejections: Vec<BallotRejection> = Vec::new();
    for (idx, ballot) in coll.iter().enumerate() {
        match check_ballot(ballot, registry, rules) {
            Ok(cb) => checked.push(cb),
            Err(reason) => {
                warn!("Ballot {}: {}. Skipping.", idx, reason);
                rejections.push(BallotRejection {
                    ballot_index: idx,
                    reason,
                });
            }
        }
    }
    (checked, rejections)
}

// **** Normalized Borda scoring ****

fn positional_weight(rules: &TallyRules, rank: u32) -> f64 {
    let m = rules.max_preferences as f64;
    match rules.weighting {
        BordaWeighting::Classic => m - rank as f64,
        BordaWeighting::Corrected => m - rank as f64 + 1.0,
    }
}

// Adds one ballot's contributions to the table. A ballot ranking k of m
// possible preferences is scaled by the normalization factor k / m so that
// partial ballots remain comparable with full ones.
fn score_ballot(table: &mut ScoreTable, ballot: &CheckedBallot, rules: &TallyRules) {
    let nf = ballot.entries.len() as f64 / rules.max_preferences as f64;
    for (rank, cid) in ballot.entries.iter() {
        table.add(*cid, Score(nf * positional_weight(rules, *rank)));
    }
}

/// Runs the normalized Borda count over a batch of ballots.
///
/// Malformed ballots are skipped and reported in the result; they never
/// abort the batch. Ballots are scored independently, so the outcome does
/// not depend on their order.
///
/// Arguments:
/// * `coll` the ballots to process
/// * `rules` the rules that govern this election
/// * `candidates` the registered candidates, in registry order
pub fn run_borda_count(
    coll: &[Ballot],
    rules: &TallyRules,
    candidates: &[Candidate],
) -> Result<BordaResult, TallyErrors> {
    check_rules(rules)?;
    let registry = build_registry(candidates)?;
    info!(
        "run_borda_count: processing {} ballots, {} candidates, rules: {:?}",
        coll.len(),
        registry.ordered.len(),
        rules
    );
    for (name, cid) in registry.ordered.iter() {
        info!("Candidate: {}: {}", cid.0, name);
    }

    let (checked, rejections) = check_ballots(coll, &registry, rules);
    debug!(
        "run_borda_count: {} ballots validated, {} rejected",
        checked.len(),
        rejections.len()
    );

    let mut table = ScoreTable::new(&registry);
    for ballot in checked.iter() {
        score_ballot(&mut table, ballot, rules);
    }
    Ok(BordaResult {
        counted_ballots: checked.len(),
        rejections,
        table,
    })
}

// **** Quota-based seat allocation ****

/// Generates a deterministic permutation of the candidates that is hard to
/// guess in advance. The order is obtained by sorting a SHA-256 digest of
/// the seed, the allocation round and the candidate name.
fn candidate_permutation_crypto(
    candidates: &[(String, CandidateId)],
    seed: u32,
    round: u32,
) -> Vec<CandidateId> {
    let mut data: Vec<(CandidateId, String)> = candidates
        .iter()
        .map(|(name, cid)| (*cid, sha256::digest(format!("{:08}{:08}{}", seed, round, name))))
        .collect();
    data.sort_by(|a, b| a.1.cmp(&b.1));
    data.iter().map(|p| p.0).collect()
}

// The candidate holding the strictly highest current score. Ties are
// resolved by the configured tie-break order.
fn leading_candidate(
    table: &ScoreTable,
    rules: &TallyRules,
    round: u32,
) -> Option<(CandidateId, Score)> {
    let order: Vec<CandidateId> = match rules.tiebreak_mode {
        TieBreakMode::UseCandidateOrder => {
            table.candidates.iter().map(|(_, cid)| *cid).collect()
        }
        TieBreakMode::Random(seed) => {
            candidate_permutation_crypto(&table.candidates, seed, round)
        }
    };
    let mut best: Option<(CandidateId, Score)> = None;
    for cid in order {
        let score = table.get(cid);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((cid, score)),
        }
    }
    best
}

// Proportional transfer of a winner's surplus. The share denominator is the
// table total at the moment of the transfer, winner included, matching the
// original tabulator arithmetic. The transfer is skipped when the total is
// zero; the winner's entry is reset to zero either way, which removes it
// from further rounds.
fn redistribute_surplus(table: &mut ScoreTable, winner: CandidateId, surplus: f64) {
    let total = table.total();
    if total > 0.0 {
        let shares: Vec<(CandidateId, f64)> = table
            .candidates
            .iter()
            .filter_map(|(_, cid)| {
                let score = table.get(*cid);
                if *cid != winner && score.0 > 0.0 {
                    Some((*cid, score.0 / total))
                } else {
                    None
                }
            })
            .collect();
        for (cid, ratio) in shares {
            table.add(cid, Score(surplus * ratio));
        }
    } else {
        debug!("redistribute_surplus: total score is zero, skipping transfer");
    }
    table.reset(winner);
}

/// Allocates up to `rules.seats` seats from an already-populated score
/// table, using the Droop quota with proportional surplus redistribution.
///
/// The quota is fixed from the table total at the moment this function
/// starts. Allocation stops early when no remaining candidate reaches the
/// quota; the result then holds fewer winners than requested seats. The
/// table is left in its post-redistribution state on purpose, so callers
/// can compare it with the pre-allocation scores.
pub fn run_seat_allocation(
    table: &mut ScoreTable,
    rules: &TallyRules,
) -> Result<AllocationResult, TallyErrors> {
    if rules.seats == 0 {
        return Err(TallyErrors::InvalidSeatCount { seats: rules.seats });
    }
    let total = table.total();
    let quota = total / (rules.seats as f64 + 1.0) + 1.0;
    info!(
        "run_seat_allocation: total score {:.4}, quota {:.4} for {} seats",
        total, quota, rules.seats
    );

    let mut elected: Vec<String> = Vec::new();
    let mut seat_stats: Vec<SeatStat> = Vec::new();
    for round in 1..=rules.seats {
        let (cid, score) = match leading_candidate(table, rules, round) {
            Some(p) => p,
            None => break,
        };
        if score.0 < quota {
            info!(
                "run_seat_allocation: round {}: leading score {:.4} is below quota, stopping",
                round, score.0
            );
            break;
        }
        let name = table.name_of(cid).to_string();
        let surplus = score.0 - quota;
        info!(
            "run_seat_allocation: round {}: {} wins a seat with {:.4} points, surplus {:.4}",
            round, name, score.0, surplus
        );
        redistribute_surplus(table, cid, surplus);
        seat_stats.push(SeatStat {
            round,
            name: name.clone(),
            score: score.0,
            surplus,
        });
        elected.push(name);
    }
    Ok(AllocationResult {
        elected,
        quota,
        seat_stats,
    })
}

/// Runs the full Quota Borda System: normalized Borda scoring followed by
/// quota-based seat allocation.
pub fn run_quota_borda(
    coll: &[Ballot],
    rules: &TallyRules,
    candidates: &[Candidate],
) -> Result<QuotaBordaResult, TallyErrors> {
    let BordaResult {
        mut table,
        rejections,
        counted_ballots,
    } = run_borda_count(coll, rules, candidates)?;
    let scores_before = table.sorted_scores();
    let allocation = run_seat_allocation(&mut table, rules)?;
    Ok(QuotaBordaResult {
        scores_before,
        table,
        rejections,
        counted_ballots,
        allocation,
    })
}

// **** Pairwise analysis and Dodgson repair ****

fn check_groups(
    groups: &[RankingGroup],
    registry: &Registry,
) -> Result<Vec<CheckedGroup>, TallyErrors> {
    let mut res: Vec<CheckedGroup> = Vec::with_capacity(groups.len());
    for (group_index, group) in groups.iter().enumerate() {
        let mut position: HashMap<CandidateId, usize> = HashMap::new();
        for (pos, name) in group.order.iter().enumerate() {
            let cid = match registry.by_name.get(name) {
                Some(cid) => *cid,
                None => {
                    return Err(TallyErrors::IncompleteRanking {
                        group_index,
                        detail: format!("unknown candidate {:?}", name),
                    });
                }
            };
            if position.insert(cid, pos).is_some() {
                return Err(TallyErrors::IncompleteRanking {
                    group_index,
                    detail: format!("candidate {:?} is listed twice", name),
                });
            }
        }
        if position.len() != registry.ordered.len() {
            return Err(TallyErrors::IncompleteRanking {
                group_index,
                detail: format!(
                    "only {} of {} candidates ranked",
                    position.len(),
                    registry.ordered.len()
                ),
            });
        }
        res.push(CheckedGroup {
            position,
            weight: group.weight,
        });
    }
    Ok(res)
}

// Weighted head-to-head counts for every unordered candidate pair, in
// registry order. Preference is decided by comparing positions within each
// group's order; membership alone says nothing when every group lists every
// candidate exactly once.
fn compute_pairwise(
    groups: &[CheckedGroup],
    registry: &Registry,
) -> Vec<(CandidateId, CandidateId, u64, u64)> {
    let n = registry.ordered.len();
    let mut res: Vec<(CandidateId, CandidateId, u64, u64)> = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let c1 = registry.ordered[i].1;
            let c2 = registry.ordered[j].1;
            let mut c1_count: u64 = 0;
            let mut c2_count: u64 = 0;
            for g in groups.iter() {
                if g.position[&c1] < g.position[&c2] {
                    c1_count += g.weight;
                } else {
                    c2_count += g.weight;
                }
            }
            res.push((c1, c2, c1_count, c2_count));
        }
    }
    res
}

// Minimum number of voters that must invert this one pairwise preference
// for the loser to strictly overtake the winner: each inverted voter moves
// the margin by two.
fn swap_cost(winner_count: u64, loser_count: u64) -> u64 {
    (winner_count - loser_count) / 2 + 1
}

/// Runs the Dodgson method over weighted ranking groups.
///
/// Every group must provide a total order over the registry; the pairwise
/// position comparison is undefined otherwise and the run aborts with
/// [`TallyErrors::IncompleteRanking`]. A Condorcet winner, when one exists,
/// has zero losses and therefore zero swap cost, so it is always the
/// Dodgson winner. Ties on the minimum cost go to the earliest registry
/// position.
pub fn run_dodgson(
    groups: &[RankingGroup],
    candidates: &[Candidate],
) -> Result<DodgsonResult, TallyErrors> {
    let registry = build_registry(candidates)?;
    if groups.is_empty() {
        return Err(TallyErrors::EmptyElection);
    }
    let checked = check_groups(groups, &registry)?;
    info!(
        "run_dodgson: {} ranking groups, {} candidates",
        checked.len(),
        registry.ordered.len()
    );

    let pairwise = compute_pairwise(&checked, &registry);

    let mut swap_table: HashMap<CandidateId, u64> = registry
        .ordered
        .iter()
        .map(|(_, cid)| (*cid, 0u64))
        .collect();
    let mut win_counts: HashMap<CandidateId, usize> = HashMap::new();
    let mut contests: Vec<PairwiseContest> = Vec::new();

    for (c1, c2, c1_count, c2_count) in pairwise.iter() {
        let winner_cid = if c1_count > c2_count {
            Some(*c1)
        } else if c2_count > c1_count {
            Some(*c2)
        } else {
            None
        };
        if let Some(w) = winner_cid {
            let (loser, w_count, l_count) = if w == *c1 {
                (*c2, *c1_count, *c2_count)
            } else {
                (*c1, *c2_count, *c1_count)
            };
            let cost = swap_cost(w_count, l_count);
            if let Some(entry) = swap_table.get_mut(&loser) {
                *entry += cost;
            }
            *win_counts.entry(w).or_insert(0) += 1;
            debug!(
                "run_dodgson: {} beats {} {}:{}, repair cost {}",
                table_name(&registry, w),
                table_name(&registry, loser),
                w_count.max(l_count),
                w_count.min(l_count),
                cost
            );
        }
        contests.push(PairwiseContest {
            first: table_name(&registry, *c1).to_string(),
            second: table_name(&registry, *c2).to_string(),
            first_count: *c1_count,
            second_count: *c2_count,
            winner: winner_cid.map(|cid| table_name(&registry, cid).to_string()),
        });
    }

    // Minimum total swap cost; ties go to the earliest registry position.
    let mut best: (CandidateId, u64) = (
        registry.ordered[0].1,
        swap_table[&registry.ordered[0].1],
    );
    for (_, cid) in registry.ordered.iter().skip(1) {
        let cost = swap_table[cid];
        if cost < best.1 {
            best = (*cid, cost);
        }
    }

    let pair_count = registry.ordered.len() - 1;
    let condorcet_winner = registry
        .ordered
        .iter()
        .find(|(_, cid)| win_counts.get(cid).copied().unwrap_or(0) == pair_count)
        .map(|(name, _)| name.clone());

    let winner = table_name(&registry, best.0).to_string();
    info!(
        "run_dodgson: winner {} with {} swaps (condorcet winner: {:?})",
        winner, best.1, condorcet_winner
    );

    let swap_counts: Vec<(String, u64)> = registry
        .ordered
        .iter()
        .map(|(name, cid)| (name.clone(), swap_table[cid]))
        .collect();

    Ok(DodgsonResult {
        winner,
        condorcet_winner,
        swap_counts,
        contests,
    })
}

fn table_name(registry: &Registry, cid: CandidateId) -> &str {
    registry
        .ordered
        .iter()
        .find(|(_, c)| *c == cid)
        .map(|(n, _)| n.as_str())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn reg(names: &[&str]) -> Vec<Candidate> {
        names
            .iter()
            .map(|n| Candidate {
                name: n.to_string(),
                code: None,
                excluded: false,
            })
            .collect()
    }

    fn ballot(pairs: &[(u32, &str)]) -> Ballot {
        Ballot {
            rankings: pairs
                .iter()
                .map(|(rank, name)| (*rank, name.to_string()))
                .collect(),
        }
    }

    fn group(order: &[&str], weight: u64) -> RankingGroup {
        RankingGroup {
            order: order.iter().map(|n| n.to_string()).collect(),
            weight,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {} but got {}",
            expected,
            actual
        );
    }

    #[test]
    fn single_ballot_contribution() {
        init_logs();
        let candidates = reg(&["A", "B", "C", "D"]);
        let ballots = vec![ballot(&[(1, "A"), (2, "B"), (3, "C")])];
        let res = run_borda_count(&ballots, &TallyRules::DEFAULT_RULES, &candidates).unwrap();
        assert_eq!(res.counted_ballots, 1);
        assert!(res.rejections.is_empty());
        assert_close(res.table.score("A").unwrap(), 2.5);
        assert_close(res.table.score("B").unwrap(), 2.0);
        assert_close(res.table.score("C").unwrap(), 1.5);
        assert_close(res.table.score("D").unwrap(), 0.0);
    }

    #[test]
    fn corrected_weighting_contribution() {
        let candidates = reg(&["A", "B", "C"]);
        let ballots = vec![ballot(&[(1, "A"), (2, "B"), (3, "C")])];
        let rules = TallyRules {
            weighting: BordaWeighting::Corrected,
            ..TallyRules::DEFAULT_RULES
        };
        let res = run_borda_count(&ballots, &rules, &candidates).unwrap();
        assert_close(res.table.score("A").unwrap(), 3.0);
        assert_close(res.table.score("B").unwrap(), 2.5);
        assert_close(res.table.score("C").unwrap(), 2.0);
    }

    #[test]
    fn full_ballot_is_not_scaled() {
        // k == max_preferences means a normalization factor of exactly 1.
        let candidates = reg(&["A", "B", "C"]);
        let ballots = vec![ballot(&[(1, "A"), (2, "B"), (3, "C")])];
        let rules = TallyRules {
            max_preferences: 3,
            ..TallyRules::DEFAULT_RULES
        };
        let res = run_borda_count(&ballots, &rules, &candidates).unwrap();
        assert_close(res.table.score("A").unwrap(), 2.0);
        assert_close(res.table.score("B").unwrap(), 1.0);
        assert_close(res.table.score("C").unwrap(), 0.0);
    }

    #[test]
    fn ballot_contribution_total_matches_weights() {
        // One k-ranked ballot contributes nf * sum of its positional
        // weights in total.
        let candidates = reg(&["A", "B", "C", "D"]);
        let ballots = vec![ballot(&[(1, "A"), (2, "B"), (3, "C")])];
        let res = run_borda_count(&ballots, &TallyRules::DEFAULT_RULES, &candidates).unwrap();
        let nf = 3.0 / 6.0;
        assert_close(res.table.total(), nf * (5.0 + 4.0 + 3.0));
    }

    #[test]
    fn sparse_ranks_use_the_rank_value() {
        let candidates = reg(&["A", "B"]);
        let ballots = vec![ballot(&[(5, "B"), (2, "A")])];
        let res = run_borda_count(&ballots, &TallyRules::DEFAULT_RULES, &candidates).unwrap();
        let nf = 2.0 / 6.0;
        assert_close(res.table.score("A").unwrap(), nf * 4.0);
        assert_close(res.table.score("B").unwrap(), nf * 1.0);
    }

    #[test]
    fn empty_ballot_is_rejected() {
        let candidates = reg(&["A", "B"]);
        let ballots = vec![ballot(&[]), ballot(&[(1, "A")])];
        let res = run_borda_count(&ballots, &TallyRules::DEFAULT_RULES, &candidates).unwrap();
        assert_eq!(res.counted_ballots, 1);
        assert_eq!(
            res.rejections,
            vec![BallotRejection {
                ballot_index: 0,
                reason: RejectionReason::EmptyBallot,
            }]
        );
    }

    #[test]
    fn unknown_candidate_is_rejected() {
        let candidates = reg(&["A", "B"]);
        let ballots = vec![ballot(&[(1, "A"), (2, "Z")])];
        let res = run_borda_count(&ballots, &TallyRules::DEFAULT_RULES, &candidates).unwrap();
        assert_eq!(res.counted_ballots, 0);
        assert_eq!(
            res.rejections[0].reason,
            RejectionReason::UnknownCandidate {
                name: "Z".to_string()
            }
        );
        // A rejected ballot contributes nothing at all.
        assert_close(res.table.total(), 0.0);
    }

    #[test]
    fn duplicate_candidate_is_rejected() {
        let candidates = reg(&["A", "B", "C"]);
        let ballots = vec![ballot(&[(1, "A"), (2, "B"), (3, "A")])];
        let res = run_borda_count(&ballots, &TallyRules::DEFAULT_RULES, &candidates).unwrap();
        assert_eq!(res.counted_ballots, 0);
        assert_eq!(
            res.rejections[0].reason,
            RejectionReason::DuplicateCandidate {
                name: "A".to_string()
            }
        );
        assert_close(res.table.total(), 0.0);
    }

    #[test]
    fn duplicate_rank_is_rejected() {
        let candidates = reg(&["A", "B"]);
        let ballots = vec![ballot(&[(1, "A"), (1, "B")])];
        let res = run_borda_count(&ballots, &TallyRules::DEFAULT_RULES, &candidates).unwrap();
        assert_eq!(
            res.rejections[0].reason,
            RejectionReason::DuplicateRank { rank: 1 }
        );
    }

    #[test]
    fn rank_out_of_range_is_rejected() {
        let candidates = reg(&["A", "B"]);
        let ballots = vec![ballot(&[(7, "A")]), ballot(&[(0, "B")])];
        let res = run_borda_count(&ballots, &TallyRules::DEFAULT_RULES, &candidates).unwrap();
        assert_eq!(res.counted_ballots, 0);
        assert_eq!(
            res.rejections,
            vec![
                BallotRejection {
                    ballot_index: 0,
                    reason: RejectionReason::RankOutOfRange { rank: 7 },
                },
                BallotRejection {
                    ballot_index: 1,
                    reason: RejectionReason::RankOutOfRange { rank: 0 },
                },
            ]
        );
    }

    #[test]
    fn rejections_do_not_abort_the_batch() {
        let candidates = reg(&["A", "B", "C"]);
        let ballots = vec![
            ballot(&[(1, "A")]),
            ballot(&[(1, "A"), (2, "A")]),
            ballot(&[(1, "B")]),
        ];
        let res = run_borda_count(&ballots, &TallyRules::DEFAULT_RULES, &candidates).unwrap();
        assert_eq!(res.counted_ballots, 2);
        assert_eq!(res.rejections.len(), 1);
        assert_eq!(res.rejections[0].ballot_index, 1);
    }

    #[test]
    fn excluded_candidates_leave_the_registry() {
        let mut candidates = reg(&["A", "B"]);
        candidates[1].excluded = true;
        let ballots = vec![ballot(&[(1, "B")])];
        let res = run_borda_count(&ballots, &TallyRules::DEFAULT_RULES, &candidates).unwrap();
        assert_eq!(res.counted_ballots, 0);
        assert_eq!(
            res.rejections[0].reason,
            RejectionReason::UnknownCandidate {
                name: "B".to_string()
            }
        );
    }

    #[test]
    fn empty_registry_is_an_error() {
        let res = run_borda_count(&[], &TallyRules::DEFAULT_RULES, &[]);
        assert_eq!(res, Err(TallyErrors::EmptyRegistry));
    }

    #[test]
    fn duplicate_registry_candidate_is_an_error() {
        let res = run_borda_count(&[], &TallyRules::DEFAULT_RULES, &reg(&["A", "A"]));
        assert_eq!(
            res,
            Err(TallyErrors::DuplicateRegistryCandidate {
                name: "A".to_string()
            })
        );
    }

    #[test]
    fn scores_sort_descending_with_registry_order_ties() {
        let candidates = reg(&["A", "B", "C"]);
        let ballots = vec![ballot(&[(1, "C")])];
        let res = run_borda_count(&ballots, &TallyRules::DEFAULT_RULES, &candidates).unwrap();
        let sorted = res.table.sorted_scores();
        assert_eq!(sorted[0].0, "C");
        // A and B are tied at zero and keep their registry order.
        assert_eq!(sorted[1].0, "A");
        assert_eq!(sorted[2].0, "B");
    }

    // Builds a populated table directly, bypassing the scoring pass.
    fn table_with(names: &[&str], scores: &[f64]) -> ScoreTable {
        let registry = build_registry(&reg(names)).unwrap();
        let mut table = ScoreTable::new(&registry);
        for ((_, cid), s) in registry.ordered.iter().zip(scores.iter()) {
            table.add(*cid, Score(*s));
        }
        table
    }

    #[test]
    fn droop_quota_value() {
        init_logs();
        let mut table = table_with(&["A", "B", "C", "D"], &[10.0, 6.0, 5.0, 0.0]);
        let rules = TallyRules {
            seats: 3,
            ..TallyRules::DEFAULT_RULES
        };
        let res = run_seat_allocation(&mut table, &rules).unwrap();
        assert_close(res.quota, 21.0 / 4.0 + 1.0);
        assert_close(res.quota, 6.25);
    }

    #[test]
    fn surplus_redistribution_walkthrough() {
        // Hand-computed: quota 6.25.
        // Round 1: A wins with 10, surplus 3.75 split 6:5 between B and C.
        // Round 2: B wins with 7.0714..., C picks up its share.
        // Round 3: C crosses the quota with 6.2662...
        let mut table = table_with(&["A", "B", "C", "D"], &[10.0, 6.0, 5.0, 0.0]);
        let rules = TallyRules {
            seats: 3,
            ..TallyRules::DEFAULT_RULES
        };
        let res = run_seat_allocation(&mut table, &rules).unwrap();
        assert_eq!(res.elected, vec!["A", "B", "C"]);
        assert_eq!(res.seat_stats.len(), 3);
        assert_close(res.seat_stats[0].score, 10.0);
        assert_close(res.seat_stats[0].surplus, 3.75);
        assert_close(res.seat_stats[1].score, 6.0 + 3.75 * 6.0 / 21.0);
        // Elected candidates end at exactly zero.
        assert_close(table.score("A").unwrap(), 0.0);
        assert_close(table.score("B").unwrap(), 0.0);
        assert_close(table.score("C").unwrap(), 0.0);
        assert_close(table.score("D").unwrap(), 0.0);
    }

    #[test]
    fn no_candidate_ever_wins_below_quota() {
        let mut table = table_with(&["A", "B", "C", "D"], &[10.0, 2.0, 1.0, 0.0]);
        let rules = TallyRules {
            seats: 2,
            ..TallyRules::DEFAULT_RULES
        };
        let res = run_seat_allocation(&mut table, &rules).unwrap();
        for stat in res.seat_stats.iter() {
            assert!(stat.score >= res.quota);
        }
        // B ends below quota, so only one of the two seats is filled.
        assert_eq!(res.elected, vec!["A"]);
        assert!(table.score("B").unwrap() > 2.0);
    }

    #[test]
    fn allocation_on_empty_scores_fills_nothing() {
        let mut table = table_with(&["A", "B"], &[0.0, 0.0]);
        let res = run_seat_allocation(&mut table, &TallyRules::DEFAULT_RULES).unwrap();
        assert!(res.elected.is_empty());
        assert!(res.seat_stats.is_empty());
    }

    #[test]
    fn zero_total_redistribution_is_a_noop() {
        let mut table = table_with(&["A", "B"], &[0.0, 0.0]);
        let cid = table.candidates[0].1;
        redistribute_surplus(&mut table, cid, 1.0);
        assert_close(table.total(), 0.0);
    }

    #[test]
    fn invalid_seat_count_is_an_error() {
        let mut table = table_with(&["A"], &[1.0]);
        let rules = TallyRules {
            seats: 0,
            ..TallyRules::DEFAULT_RULES
        };
        assert_eq!(
            run_seat_allocation(&mut table, &rules),
            Err(TallyErrors::InvalidSeatCount { seats: 0 })
        );
    }

    #[test]
    fn invalid_max_preferences_is_an_error() {
        let rules = TallyRules {
            max_preferences: 0,
            ..TallyRules::DEFAULT_RULES
        };
        assert_eq!(
            run_borda_count(&[], &rules, &reg(&["A"])),
            Err(TallyErrors::InvalidMaxPreferences { max_preferences: 0 })
        );
    }

    #[test]
    fn tied_leaders_resolve_by_registry_order() {
        let mut table = table_with(&["A", "B", "C"], &[15.0, 15.0, 6.0]);
        let rules = TallyRules {
            seats: 2,
            ..TallyRules::DEFAULT_RULES
        };
        let res = run_seat_allocation(&mut table, &rules).unwrap();
        // Quota is 13; A and B are tied at 15 and A is registered first.
        assert_eq!(res.elected[0], "A");
        assert_eq!(res.elected, vec!["A", "B"]);
    }

    #[test]
    fn random_tiebreak_is_deterministic() {
        let rules = TallyRules {
            seats: 2,
            tiebreak_mode: TieBreakMode::Random(42),
            ..TallyRules::DEFAULT_RULES
        };
        let run = || {
            let mut table = table_with(&["A", "B", "C"], &[15.0, 15.0, 6.0]);
            run_seat_allocation(&mut table, &rules).unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first, second);
        assert_eq!(first.elected.len(), 2);
        assert!(first.elected.contains(&"A".to_string()));
        assert!(first.elected.contains(&"B".to_string()));
    }

    #[test]
    fn quota_borda_end_to_end() {
        init_logs();
        let candidates = reg(&["A", "B", "C", "D"]);
        // Three identical full-strength blocs and one partial ballot.
        let ballots = vec![
            ballot(&[(1, "A"), (2, "B"), (3, "C"), (4, "D")]),
            ballot(&[(1, "A"), (2, "B"), (3, "C"), (4, "D")]),
            ballot(&[(1, "A"), (2, "C"), (3, "B")]),
            ballot(&[(1, "B"), (2, "A")]),
        ];
        let rules = TallyRules {
            max_preferences: 4,
            seats: 2,
            ..TallyRules::DEFAULT_RULES
        };
        let res = run_quota_borda(&ballots, &rules, &candidates).unwrap();
        assert_eq!(res.counted_ballots, 4);
        assert_eq!(res.scores_before.len(), 4);
        assert_eq!(res.scores_before[0].0, "A");
        // The table was mutated by the allocation pass.
        for name in res.allocation.elected.iter() {
            assert_close(res.table.score(name).unwrap(), 0.0);
        }
    }

    #[test]
    fn condorcet_winner_has_zero_cost() {
        init_logs();
        // 10x A>B>C, 5x C>A>B, 4x B>C>A: A wins every head-to-head contest.
        let candidates = reg(&["A", "B", "C"]);
        let groups = vec![
            group(&["A", "B", "C"], 10),
            group(&["C", "A", "B"], 5),
            group(&["B", "C", "A"], 4),
        ];
        let res = run_dodgson(&groups, &candidates).unwrap();
        assert_eq!(res.condorcet_winner, Some("A".to_string()));
        assert_eq!(res.winner, "A");
        assert_eq!(
            res.swap_counts,
            vec![
                ("A".to_string(), 0),
                ("B".to_string(), 6),
                ("C".to_string(), 6),
            ]
        );
    }

    #[test]
    fn dodgson_walkthrough_cycle() {
        init_logs();
        // 6x A>B>C, 5x C>A>B, 4x B>C>A: a preference cycle with no
        // Condorcet winner. A beats B 11:4, C beats A 9:6, B beats C 10:5.
        // Repairs: A needs 2 inverted voters against C, B needs 4 against
        // A, C needs 3 against B. A wins with the cheapest repair.
        let candidates = reg(&["A", "B", "C"]);
        let groups = vec![
            group(&["A", "B", "C"], 6),
            group(&["C", "A", "B"], 5),
            group(&["B", "C", "A"], 4),
        ];
        let res = run_dodgson(&groups, &candidates).unwrap();
        assert_eq!(res.condorcet_winner, None);
        assert_eq!(res.winner, "A");
        assert_eq!(
            res.swap_counts,
            vec![
                ("A".to_string(), 2),
                ("B".to_string(), 4),
                ("C".to_string(), 3),
            ]
        );
        let ab = res
            .contests
            .iter()
            .find(|c| c.first == "A" && c.second == "B")
            .unwrap();
        assert_eq!((ab.first_count, ab.second_count), (11, 4));
        assert_eq!(ab.winner, Some("A".to_string()));
    }

    #[test]
    fn pairwise_uses_positions_not_membership() {
        // Every candidate appears exactly once per group, so a membership
        // count would see 1:1 everywhere; positions decide.
        let candidates = reg(&["A", "B"]);
        let groups = vec![group(&["B", "A"], 3), group(&["A", "B"], 1)];
        let res = run_dodgson(&groups, &candidates).unwrap();
        let contest = &res.contests[0];
        assert_eq!((contest.first_count, contest.second_count), (1, 3));
        assert_eq!(res.winner, "B");
    }

    #[test]
    fn tied_pair_has_no_winner() {
        let candidates = reg(&["A", "B"]);
        let groups = vec![group(&["B", "A"], 2), group(&["A", "B"], 2)];
        let res = run_dodgson(&groups, &candidates).unwrap();
        assert_eq!(res.contests[0].winner, None);
        assert_eq!(res.condorcet_winner, None);
        // Neither side lost, both cost zero; the registry order decides.
        assert_eq!(res.winner, "A");
    }

    #[test]
    fn incomplete_ranking_aborts_the_run() {
        let candidates = reg(&["A", "B", "C"]);
        let groups = vec![group(&["A", "B", "C"], 1), group(&["A", "B"], 1)];
        let res = run_dodgson(&groups, &candidates);
        match res {
            Err(TallyErrors::IncompleteRanking { group_index, .. }) => {
                assert_eq!(group_index, 1)
            }
            other => panic!("expected IncompleteRanking, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_in_group_aborts_the_run() {
        let candidates = reg(&["A", "B"]);
        let groups = vec![group(&["A", "A"], 1)];
        let res = run_dodgson(&groups, &candidates);
        assert!(matches!(
            res,
            Err(TallyErrors::IncompleteRanking { group_index: 0, .. })
        ));
    }

    #[test]
    fn no_groups_is_an_error() {
        let res = run_dodgson(&[], &reg(&["A"]));
        assert_eq!(res, Err(TallyErrors::EmptyElection));
    }
}
