// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// A registered candidate.
///
/// Candidates marked as excluded are left out of the registry: ballots that
/// rank them are rejected with [`RejectionReason::UnknownCandidate`].
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub code: Option<String>,
    pub excluded: bool,
}

/// One voter's ballot: a mapping from rank position to candidate name.
///
/// The pairs may be given in any order; ranking positions start at 1 and may
/// leave gaps. Sorting by rank is performed explicitly by the tally, the
/// order of the pairs carries no meaning.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Ballot {
    pub rankings: Vec<(u32, String)>,
}

/// A bloc of voters sharing one exact preference order, most preferred
/// first. A group with `weight == 1` is a single voter.
///
/// The Dodgson path requires every group to order every registered candidate
/// exactly once.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RankingGroup {
    pub order: Vec<String>,
    pub weight: u64,
}

// ******** Output data structures *********

/// Why a ballot was skipped by the validator.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RejectionReason {
    /// The ballot ranks no candidate at all.
    EmptyBallot,
    /// A rank position is zero or larger than `max_preferences`.
    RankOutOfRange { rank: u32 },
    /// A ranked name is not in the candidate registry.
    UnknownCandidate { name: String },
    /// Two entries claim the same rank position.
    DuplicateRank { rank: u32 },
    /// The same candidate appears at two rank positions.
    DuplicateCandidate { name: String },
}

impl Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::EmptyBallot => write!(f, "empty ballot"),
            RejectionReason::RankOutOfRange { rank } => {
                write!(f, "rank {} is out of range", rank)
            }
            RejectionReason::UnknownCandidate { name } => {
                write!(f, "unknown candidate {:?}", name)
            }
            RejectionReason::DuplicateRank { rank } => {
                write!(f, "rank {} is used twice", rank)
            }
            RejectionReason::DuplicateCandidate { name } => {
                write!(f, "candidate {:?} is ranked twice", name)
            }
        }
    }
}

/// One skipped ballot: its position in the input batch and the reason.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BallotRejection {
    pub ballot_index: usize,
    pub reason: RejectionReason,
}

/// Outcome of the normalized Borda count.
#[derive(PartialEq, Debug, Clone)]
pub struct BordaResult {
    /// Final accumulated scores. The table is an owned value so it can be
    /// handed to the seat allocator afterwards.
    pub table: crate::ScoreTable,
    pub rejections: Vec<BallotRejection>,
    pub counted_ballots: usize,
}

/// One allocated seat.
#[derive(PartialEq, Debug, Clone)]
pub struct SeatStat {
    pub round: u32,
    pub name: String,
    /// The winning score before redistribution.
    pub score: f64,
    pub surplus: f64,
}

/// Outcome of the quota-based seat allocation.
#[derive(PartialEq, Debug, Clone)]
pub struct AllocationResult {
    /// Seat winners in allocation order. May hold fewer entries than the
    /// requested number of seats.
    pub elected: Vec<String>,
    pub quota: f64,
    pub seat_stats: Vec<SeatStat>,
}

/// Outcome of the combined score-then-allocate run.
#[derive(PartialEq, Debug, Clone)]
pub struct QuotaBordaResult {
    /// Scores in descending order as they stood when allocation started.
    pub scores_before: Vec<(String, f64)>,
    /// The score table in its post-redistribution state.
    pub table: crate::ScoreTable,
    pub rejections: Vec<BallotRejection>,
    pub counted_ballots: usize,
    pub allocation: AllocationResult,
}

/// One head-to-head contest, with weighted voter counts on each side.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PairwiseContest {
    pub first: String,
    pub second: String,
    pub first_count: u64,
    pub second_count: u64,
    /// The side with the strictly greater count; a tied pair has no winner.
    pub winner: Option<String>,
}

/// Outcome of the Dodgson method.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DodgsonResult {
    pub winner: String,
    /// Set when a candidate wins every pairwise contest outright.
    pub condorcet_winner: Option<String>,
    /// Total swap cost per candidate, in registry order.
    pub swap_counts: Vec<(String, u64)>,
    /// All pairwise contests, for audit.
    pub contests: Vec<PairwiseContest>,
}

/// Errors that prevent a tally operation from completing.
///
/// Ballot-scoped problems are not errors: they surface as
/// [`BallotRejection`] records and the batch continues.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TallyErrors {
    EmptyRegistry,
    DuplicateRegistryCandidate { name: String },
    EmptyElection,
    InvalidMaxPreferences { max_preferences: u32 },
    InvalidSeatCount { seats: u32 },
    /// A ranking group does not provide a total order over the registry:
    /// pairwise position comparison is undefined for it.
    IncompleteRanking { group_index: usize, detail: String },
}

impl Error for TallyErrors {}

impl Display for TallyErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TallyErrors::EmptyRegistry => write!(f, "the candidate registry is empty"),
            TallyErrors::DuplicateRegistryCandidate { name } => {
                write!(f, "candidate {:?} is registered twice", name)
            }
            TallyErrors::EmptyElection => write!(f, "no ranking groups were provided"),
            TallyErrors::InvalidMaxPreferences { max_preferences } => {
                write!(f, "invalid maximum preference count {}", max_preferences)
            }
            TallyErrors::InvalidSeatCount { seats } => {
                write!(f, "invalid seat count {}", seats)
            }
            TallyErrors::IncompleteRanking {
                group_index,
                detail,
            } => {
                write!(
                    f,
                    "ranking group {} is not a total order: {}",
                    group_index, detail
                )
            }
        }
    }
}

// ********* Configuration **********

/// Positional weight assigned to rank `j` out of a maximum of `m` ranks.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum BordaWeighting {
    /// `w(j) = m - j`. The historical tabulator arithmetic: the first choice
    /// on a full ballot receives `m - 1` points and rank `m` receives zero.
    Classic,
    /// `w(j) = m - j + 1`: the first choice receives the full `m` points.
    Corrected,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TieBreakMode {
    /// Earliest registry position wins the tie.
    UseCandidateOrder,
    // Note: implemented with a cryptographic hash on the candidate names,
    // so the order is deterministic for a given seed but hard to guess.
    Random(u32),
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct TallyRules {
    /// The largest rank position a ballot may use. Must be at least 1.
    pub max_preferences: u32,
    /// Number of seats for quota-based allocation. Must be at least 1.
    pub seats: u32,
    pub weighting: BordaWeighting,
    pub tiebreak_mode: TieBreakMode,
}

impl TallyRules {
    pub const DEFAULT_RULES: TallyRules = TallyRules {
        max_preferences: 6,
        seats: 1,
        weighting: BordaWeighting::Classic,
        tiebreak_mode: TieBreakMode::UseCandidateOrder,
    };
}
