pub use crate::config::*;
use crate::{
    run_borda_count, run_dodgson, run_quota_borda, BordaResult, DodgsonResult, QuotaBordaResult,
};

/// A builder for assembling an election.
///
/// Ballots and ranking groups are given as plain candidate-name lists in
/// preference order; the builder turns them into rank mappings.
///
/// ```
/// pub use quota_borda::builder::Builder;
/// pub use quota_borda::TallyRules;
/// # use quota_borda::TallyErrors;
///
/// let mut builder = Builder::new(&TallyRules::DEFAULT_RULES)?
///     .candidates(&["Anna".to_string(), "Bob".to_string(), "Clara".to_string()])?;
///
/// builder.add_ballot(&["Anna".to_string(), "Clara".to_string()])?;
/// builder.add_ballot(&["Bob".to_string()])?;
///
/// let result = builder.borda_count()?;
/// assert_eq!(result.counted_ballots, 2);
///
/// # Ok::<(), TallyErrors>(())
/// ```
pub struct Builder {
    pub(crate) _rules: TallyRules,
    pub(crate) _candidates: Option<Vec<Candidate>>,
    pub(crate) _ballots: Vec<Ballot>,
    pub(crate) _groups: Vec<RankingGroup>,
}

impl Builder {
    pub fn new(rules: &TallyRules) -> Result<Builder, TallyErrors> {
        Ok(Builder {
            _rules: *rules,
            _candidates: None,
            _ballots: Vec::new(),
            _groups: Vec::new(),
        })
    }

    pub fn candidates(self, cands: &[String]) -> Result<Builder, TallyErrors> {
        Ok(Builder {
            _candidates: Some(
                cands
                    .iter()
                    .map(|name| Candidate {
                        name: name.clone(),
                        code: None,
                        excluded: false,
                    })
                    .collect(),
            ),
            ..self
        })
    }

    /// Adds a ballot from an ordered list of names: the first entry becomes
    /// rank 1, the second rank 2, and so on.
    ///
    /// The names do not need to be valid; a malformed ballot is rejected
    /// with a diagnostic when the tally runs.
    pub fn add_ballot(&mut self, ordered_names: &[String]) -> Result<(), TallyErrors> {
        let rankings: Vec<(u32, String)> = ordered_names
            .iter()
            .enumerate()
            .map(|(idx, name)| ((idx + 1) as u32, name.clone()))
            .collect();
        self.add_ballot_ranked(&Ballot { rankings })
    }

    /// Adds a ballot with explicit rank positions.
    pub fn add_ballot_ranked(&mut self, ballot: &Ballot) -> Result<(), TallyErrors> {
        self._ballots.push(ballot.clone());
        Ok(())
    }

    /// Adds a bloc of `weight` voters sharing one preference order, most
    /// preferred first.
    pub fn add_ranking_group(&mut self, order: &[String], weight: u64) -> Result<(), TallyErrors> {
        self._groups.push(RankingGroup {
            order: order.to_vec(),
            weight,
        });
        Ok(())
    }

    /// Runs the normalized Borda count over the collected ballots.
    pub fn borda_count(&self) -> Result<BordaResult, TallyErrors> {
        run_borda_count(&self._ballots, &self._rules, self.registry()?)
    }

    /// Runs Borda scoring followed by quota-based seat allocation.
    pub fn quota_borda(&self) -> Result<QuotaBordaResult, TallyErrors> {
        run_quota_borda(&self._ballots, &self._rules, self.registry()?)
    }

    /// Runs the Dodgson method over the collected ranking groups.
    pub fn dodgson(&self) -> Result<DodgsonResult, TallyErrors> {
        run_dodgson(&self._groups, self.registry()?)
    }

    fn registry(&self) -> Result<&[Candidate], TallyErrors> {
        self._candidates
            .as_deref()
            .ok_or(TallyErrors::EmptyRegistry)
    }
}
