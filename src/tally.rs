use log::{debug, info, warn};

use quota_borda::*;
use snafu::{prelude::*, Snafu};

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Reader, Xlsx};

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::tally::config_reader::*;

#[derive(Debug, Snafu)]
pub enum TallyCliError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No usable worksheet in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Error opening JSON file"))]
    OpeningJson { source: std::io::Error },
    #[snafu(display("Error parsing JSON content"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error parsing a JSON number"))]
    ParsingJsonNumber {},
    #[snafu(display("Error opening CSV file"))]
    CsvOpen { source: csv::Error },
    #[snafu(display("Error reading a CSV record"))]
    CsvLineParse { source: csv::Error },
    #[snafu(display("Line {lineno} is too short"))]
    CsvLineTooShort { lineno: usize },
    #[snafu(display("Cannot parse a number at line {lineno}"))]
    CsvNumberParse { lineno: usize },
    #[snafu(display("Error writing the summary"))]
    WritingSummary { source: std::io::Error },
    #[snafu(display(""))]
    MissingParentDir {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type CliResult<T> = Result<T, TallyCliError>;

pub mod config_reader {
    use crate::tally::*;

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct OutputSettings {
        #[serde(rename = "contestName")]
        pub contest_name: String,
        #[serde(rename = "outputDirectory")]
        pub output_directory: Option<String>,
        #[serde(rename = "contestDate")]
        pub contest_date: Option<String>,
        #[serde(rename = "contestJurisdiction")]
        pub contest_jurisdiction: Option<String>,
        #[serde(rename = "contestOffice")]
        pub contest_office: Option<String>,
    }

    // The election header echoed back at the top of the JSON summary.
    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct OutputConfig {
        pub contest: String,
        pub date: Option<String>,
        pub jurisdiction: Option<String>,
        pub office: Option<String>,
        pub method: String,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct FileSource {
        pub provider: String,
        #[serde(rename = "filePath")]
        pub file_path: String,
        #[serde(rename = "firstVoteColumnIndex")]
        _first_vote_column_index: Option<JSValue>,
        #[serde(rename = "firstVoteRowIndex")]
        _first_vote_row_index: Option<JSValue>,
        #[serde(rename = "idColumnIndex")]
        _id_column_index: Option<JSValue>,
        #[serde(rename = "excelWorksheetName")]
        pub excel_worksheet_name: Option<String>,
    }

    impl FileSource {
        pub fn simple(provider: &str, path: &str) -> FileSource {
            FileSource {
                provider: provider.to_string(),
                file_path: path.to_string(),
                _first_vote_column_index: None,
                _first_vote_row_index: None,
                _id_column_index: None,
                excel_worksheet_name: None,
            }
        }

        /// 0-based column of the first choice. The configuration indexes
        /// columns starting at 1, following spreadsheet conventions.
        pub fn first_vote_column_index(&self) -> CliResult<usize> {
            match &self._first_vote_column_index {
                None => Ok(0),
                Some(v) => {
                    let x = read_js_int(v)?;
                    if x < 1 {
                        whatever!("firstVoteColumnIndex must be at least 1");
                    }
                    Ok(x - 1)
                }
            }
        }

        /// 1-based row where the ballots start.
        pub fn first_vote_row_index(&self) -> CliResult<usize> {
            match &self._first_vote_row_index {
                None => Ok(1),
                Some(v) => {
                    let x = read_js_int(v)?;
                    if x < 1 {
                        whatever!("firstVoteRowIndex must be at least 1");
                    }
                    Ok(x)
                }
            }
        }

        /// 0-based column holding the ballot identifier, if configured.
        pub fn id_column_index(&self) -> CliResult<Option<usize>> {
            match &self._id_column_index {
                None => Ok(None),
                Some(v) => {
                    let x = read_js_int(v)?;
                    if x < 1 {
                        whatever!("idColumnIndex must be at least 1");
                    }
                    Ok(Some(x - 1))
                }
            }
        }
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct QbCandidate {
        pub name: String,
        pub code: Option<String>,
        pub excluded: Option<bool>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct QbRules {
        pub method: String,
        #[serde(rename = "maxPreferences")]
        pub max_preferences: Option<JSValue>,
        pub seats: Option<JSValue>,
        #[serde(rename = "tiebreakMode")]
        pub tiebreak_mode: Option<String>,
        #[serde(rename = "randomSeed")]
        pub random_seed: Option<String>,
        #[serde(rename = "bordaWeighting")]
        pub borda_weighting: Option<String>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct QbConfig {
        #[serde(rename = "outputSettings")]
        pub output_settings: OutputSettings,
        #[serde(rename = "ballotFileSources", default)]
        pub ballot_file_sources: Vec<FileSource>,
        #[serde(rename = "groupFileSources", default)]
        pub group_file_sources: Vec<FileSource>,
        #[serde(default)]
        pub candidates: Vec<QbCandidate>,
        pub rules: QbRules,
    }

    pub fn read_summary(path: String) -> CliResult<JSValue> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
        debug!("read content: {:?}", contents);
        let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(js)
    }

    pub fn read_js_int(x: &JSValue) -> CliResult<usize> {
        match x {
            JSValue::Number(n) => n
                .as_u64()
                .map(|x| x as usize)
                .context(ParsingJsonNumberSnafu {}),
            JSValue::String(s) => s.parse::<usize>().ok().context(ParsingJsonNumberSnafu {}),
            _ => None.context(ParsingJsonNumberSnafu {}),
        }
    }
}

/// A ballot as parsed by the readers, before rank mapping and validation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParsedBallot {
    pub id: Option<String>,
    /// Choices by rank order; an empty string leaves that rank blank.
    pub choices: Vec<String>,
}

// Column order becomes rank order; blank cells leave a rank gap.
pub fn parsed_to_ballot(pb: &ParsedBallot) -> Ballot {
    debug!("parsed_to_ballot: ballot {:?}", pb.id);
    let rankings: Vec<(u32, String)> = pb
        .choices
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.trim().is_empty())
        .map(|(idx, s)| ((idx + 1) as u32, s.trim().to_string()))
        .collect();
    Ballot { rankings }
}

// A csv_ranks row: one cell per candidate holding that candidate's rank.
pub fn ranks_row_to_ballot(
    header: &[String],
    cells: &[String],
    lineno: usize,
) -> CliResult<Ballot> {
    let mut rankings: Vec<(u32, String)> = Vec::new();
    for (name, cell) in header.iter().zip(cells.iter()) {
        let c = cell.trim();
        if c.is_empty() {
            continue;
        }
        let rank = c
            .parse::<u32>()
            .ok()
            .context(CsvNumberParseSnafu { lineno })?;
        rankings.push((rank, name.clone()));
    }
    Ok(Ballot { rankings })
}

// A group row: the voter count in the first column, then the preference
// order.
pub fn group_row(cells: &[String], lineno: usize) -> CliResult<RankingGroup> {
    let weight_cell = cells.first().context(CsvLineTooShortSnafu { lineno })?;
    let weight = weight_cell
        .trim()
        .parse::<u64>()
        .ok()
        .context(CsvNumberParseSnafu { lineno })?;
    let order: Vec<String> = cells[1..]
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Ok(RankingGroup { order, weight })
}

// Registry order is the order of first appearance when no explicit
// candidate list is configured.
pub fn infer_candidates(ballots: &[Ballot], groups: &[RankingGroup]) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut res: Vec<Candidate> = Vec::new();
    for b in ballots.iter() {
        let mut sorted = b.rankings.clone();
        sorted.sort_by_key(|(rank, _)| *rank);
        for (_, name) in sorted {
            if seen.insert(name.clone()) {
                res.push(Candidate {
                    name,
                    code: None,
                    excluded: false,
                });
            }
        }
    }
    for g in groups.iter() {
        for name in g.order.iter() {
            if seen.insert(name.clone()) {
                res.push(Candidate {
                    name: name.clone(),
                    code: None,
                    excluded: false,
                });
            }
        }
    }
    res
}

pub mod csv_reader {
    use crate::tally::*;

    pub fn read_csv_ballots(path: String, cfs: &FileSource) -> CliResult<Vec<ParsedBallot>> {
        let start_col = cfs.first_vote_column_index()?;
        let id_idx = cfs.id_column_index()?;
        let (records, row_offset) = get_records(&path, cfs)?;

        let mut res: Vec<ParsedBallot> = Vec::new();
        for (idx, line_r) in records.enumerate() {
            let lineno = idx + row_offset;
            let line = line_r.context(CsvLineParseSnafu {})?;
            debug!("read_csv_ballots: line {}: {:?}", lineno, line);
            let id = match id_idx {
                Some(i) => Some(
                    line.get(i)
                        .context(CsvLineTooShortSnafu { lineno })?
                        .to_string(),
                ),
                None => None,
            };
            let choices: Vec<String> = line.iter().skip(start_col).map(|s| s.to_string()).collect();
            res.push(ParsedBallot { id, choices });
        }
        Ok(res)
    }

    // The header row gives the candidate names; each following row holds
    // rank numbers. Returns the header and one ballot per row.
    pub fn read_csv_ranks(path: String, cfs: &FileSource) -> CliResult<(Vec<String>, Vec<Ballot>)> {
        let start_col = cfs.first_vote_column_index()?;
        let rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .context(CsvOpenSnafu {})?;
        let mut records = rdr.into_records();
        let header_rec = match records.next() {
            Some(r) => r.context(CsvLineParseSnafu {})?,
            None => whatever!("The file {} has no header row", path),
        };
        let header: Vec<String> = header_rec
            .iter()
            .skip(start_col)
            .map(|s| s.trim().to_string())
            .collect();

        let mut res: Vec<Ballot> = Vec::new();
        for (idx, line_r) in records.enumerate() {
            let lineno = idx + 2;
            let line = line_r.context(CsvLineParseSnafu {})?;
            debug!("read_csv_ranks: line {}: {:?}", lineno, line);
            let cells: Vec<String> = line.iter().skip(start_col).map(|s| s.to_string()).collect();
            res.push(ranks_row_to_ballot(&header, &cells, lineno)?);
        }
        Ok((header, res))
    }

    pub fn read_csv_groups(path: String) -> CliResult<Vec<RankingGroup>> {
        let rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .context(CsvOpenSnafu {})?;
        let mut res: Vec<RankingGroup> = Vec::new();
        for (idx, line_r) in rdr.into_records().enumerate() {
            let lineno = idx + 1;
            let line = line_r.context(CsvLineParseSnafu {})?;
            let cells: Vec<String> = line.iter().map(|s| s.to_string()).collect();
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            res.push(group_row(&cells, lineno)?);
        }
        Ok(res)
    }

    fn get_records(
        path: &String,
        cfs: &FileSource,
    ) -> CliResult<(csv::StringRecordsIntoIter<std::fs::File>, usize)> {
        let first_row = cfs.first_vote_row_index()?;
        let rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .context(CsvOpenSnafu {})?;
        let mut records = rdr.into_records();
        // The index starts at 1 to respect most conventions in the excel world
        for _ in 1..first_row {
            _ = records.next();
        }
        Ok((records, first_row))
    }
}

pub mod xlsx_reader {
    use crate::tally::*;

    pub fn read_excel_ballots(path: String, cfs: &FileSource) -> CliResult<Vec<ParsedBallot>> {
        let mut workbook: Xlsx<_> =
            open_workbook(path.clone()).context(OpeningExcelSnafu { path: path.clone() })?;
        let wrange = match cfs.excel_worksheet_name.clone() {
            Some(name) => workbook
                .worksheet_range(name.as_str())
                .context(EmptyExcelSnafu { path: path.clone() })?
                .context(OpeningExcelSnafu { path: path.clone() })?,
            None => workbook
                .worksheet_range_at(0)
                .context(EmptyExcelSnafu { path: path.clone() })?
                .context(OpeningExcelSnafu { path: path.clone() })?,
        };

        let start_col = cfs.first_vote_column_index()?;
        let first_row = cfs.first_vote_row_index()?;

        let mut res: Vec<ParsedBallot> = Vec::new();
        for (idx, row) in wrange.rows().enumerate() {
            if idx + 1 < first_row {
                continue;
            }
            debug!("read_excel_ballots: row {:?}", row);
            if start_col >= row.len() {
                continue;
            }
            let mut choices: Vec<String> = Vec::new();
            for elt in &row[start_col..] {
                choices.push(read_choice_calamine(elt)?);
            }
            res.push(ParsedBallot { id: None, choices });
        }
        Ok(res)
    }

    fn read_choice_calamine(cell: &calamine::DataType) -> CliResult<String> {
        match cell {
            calamine::DataType::String(s) => Ok(s.clone()),
            calamine::DataType::Empty => Ok("".to_string()),
            _ => whatever!(
                "read_choice_calamine: could not understand cell {:?}",
                cell
            ),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Method {
    Borda,
    QuotaBorda,
    Dodgson,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Borda => "borda",
            Method::QuotaBorda => "quotaBorda",
            Method::Dodgson => "dodgson",
        }
    }
}

pub fn validate_rules(qb_rules: &QbRules) -> CliResult<(Method, TallyRules)> {
    let method = match qb_rules.method.as_str() {
        "borda" => Method::Borda,
        "quotaBorda" => Method::QuotaBorda,
        "dodgson" => Method::Dodgson,
        x => {
            whatever!("Cannot use method {:?} (currently not implemented)", x)
        }
    };
    let tiebreak_mode = match qb_rules.tiebreak_mode.as_deref() {
        None | Some("useCandidateOrder") => TieBreakMode::UseCandidateOrder,
        Some("random") => {
            let seed = match qb_rules.random_seed.clone().map(|s| s.parse::<u32>()) {
                Some(Result::Ok(x)) => x,
                x => {
                    whatever!("Cannot use tiebreak mode random with seed {:?}", x)
                }
            };
            TieBreakMode::Random(seed)
        }
        Some(x) => {
            whatever!("Cannot use tiebreak mode {:?} (currently not implemented)", x)
        }
    };
    let weighting = match qb_rules.borda_weighting.as_deref() {
        None | Some("classic") => BordaWeighting::Classic,
        Some("corrected") => BordaWeighting::Corrected,
        Some(x) => {
            whatever!("Cannot use borda weighting {:?}", x)
        }
    };
    let max_preferences = match &qb_rules.max_preferences {
        None => 6,
        Some(v) => config_reader::read_js_int(v)? as u32,
    };
    if max_preferences == 0 {
        whatever!("maxPreferences must be at least 1");
    }
    let seats = match &qb_rules.seats {
        None => 1,
        Some(v) => config_reader::read_js_int(v)? as u32,
    };
    if seats == 0 {
        whatever!("seats must be at least 1");
    }
    Ok((
        method,
        TallyRules {
            max_preferences,
            seats,
            weighting,
            tiebreak_mode,
        },
    ))
}

fn scores_to_js(scores: &[(String, f64)]) -> Vec<JSValue> {
    scores
        .iter()
        .map(|(name, score)| json!({"candidate": name, "score": format!("{:.4}", score)}))
        .collect()
}

fn rejections_to_js(rejections: &[BallotRejection]) -> Vec<JSValue> {
    rejections
        .iter()
        .map(|r| json!({"ballot": r.ballot_index, "reason": r.reason.to_string()}))
        .collect()
}

fn borda_results_js(res: &BordaResult) -> JSValue {
    json!({
        "method": "borda",
        "countedBallots": res.counted_ballots,
        "skippedBallots": rejections_to_js(&res.rejections),
        "scores": scores_to_js(&res.table.sorted_scores()),
    })
}

fn quota_borda_results_js(res: &QuotaBordaResult) -> JSValue {
    let rounds: Vec<JSValue> = res
        .allocation
        .seat_stats
        .iter()
        .map(|s| {
            json!({
                "round": s.round,
                "candidate": s.name,
                "score": format!("{:.4}", s.score),
                "surplus": format!("{:.4}", s.surplus),
            })
        })
        .collect();
    json!({
        "method": "quotaBorda",
        "countedBallots": res.counted_ballots,
        "skippedBallots": rejections_to_js(&res.rejections),
        "quota": format!("{:.4}", res.allocation.quota),
        "elected": res.allocation.elected,
        "rounds": rounds,
        "scoresBeforeAllocation": scores_to_js(&res.scores_before),
        "scoresAfterAllocation": scores_to_js(&res.table.sorted_scores()),
    })
}

fn dodgson_results_js(res: &DodgsonResult) -> JSValue {
    let swaps: Vec<JSValue> = res
        .swap_counts
        .iter()
        .map(|(name, count)| json!({"candidate": name, "swaps": count}))
        .collect();
    let contests: Vec<JSValue> = res
        .contests
        .iter()
        .map(|c| {
            json!({
                "first": c.first,
                "second": c.second,
                "firstCount": c.first_count,
                "secondCount": c.second_count,
                "winner": c.winner,
            })
        })
        .collect();
    json!({
        "method": "dodgson",
        "winner": res.winner,
        "condorcetWinner": res.condorcet_winner,
        "swaps": swaps,
        "contests": contests,
    })
}

fn build_summary_js(config: &QbConfig, method: Method, results: JSValue) -> JSValue {
    let c = OutputConfig {
        contest: config.output_settings.contest_name.clone(),
        date: config.output_settings.contest_date.clone(),
        jurisdiction: config.output_settings.contest_jurisdiction.clone(),
        office: config.output_settings.contest_office.clone(),
        method: method.as_str().to_string(),
    };
    json!({
        "config": c,
        "results": results })
}

fn log_scores(scores: &[(String, f64)]) {
    info!("Final scores:");
    for (name, score) in scores.iter() {
        info!("    {:.4} {}", score, name);
    }
}

fn load_config(args: &crate::args::Args) -> CliResult<(QbConfig, Option<PathBuf>)> {
    if let Some(config_path) = args.config.clone() {
        let config_p = Path::new(config_path.as_str());
        let config_str = fs::read_to_string(config_path.clone()).context(OpeningJsonSnafu {})?;
        let config: QbConfig = serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
        info!("config: {:?}", config);
        let root_p = config_p.parent().context(MissingParentDirSnafu {})?;
        return Ok((config, Some(root_p.to_path_buf())));
    }

    // Quick path: assemble a configuration from the command line only.
    let input = match args.input.clone() {
        Some(i) => i,
        None => {
            whatever!("Either --config or --input must be provided")
        }
    };
    let provider = args.input_type.clone().unwrap_or_else(|| "csv".to_string());
    let method = args.method.clone().unwrap_or_else(|| "borda".to_string());

    let mut ballot_file_sources: Vec<FileSource> = Vec::new();
    let mut group_file_sources: Vec<FileSource> = Vec::new();
    if method == "dodgson" {
        let gpath = args.groups.clone().unwrap_or(input);
        group_file_sources.push(FileSource::simple("csv_groups", gpath.as_str()));
    } else {
        ballot_file_sources.push(FileSource::simple(provider.as_str(), input.as_str()));
    }

    let config = QbConfig {
        output_settings: OutputSettings {
            contest_name: "Election".to_string(),
            output_directory: None,
            contest_date: None,
            contest_jurisdiction: None,
            contest_office: None,
        },
        ballot_file_sources,
        group_file_sources,
        candidates: Vec::new(),
        rules: QbRules {
            method,
            max_preferences: args.max_preferences.map(JSValue::from),
            seats: args.seats.map(JSValue::from),
            tiebreak_mode: None,
            random_seed: None,
            borda_weighting: None,
        },
    };
    Ok((config, None))
}

fn resolve_path(root: &Option<PathBuf>, file_path: &str) -> String {
    match root {
        Some(r) => r.join(file_path).as_path().display().to_string(),
        None => file_path.to_string(),
    }
}

pub fn run_tally(args: &crate::args::Args) -> CliResult<()> {
    let (config, root_path) = load_config(args)?;
    let (method, rules) = validate_rules(&config.rules)?;

    let mut ballots: Vec<Ballot> = Vec::new();
    let mut header_candidates: Vec<String> = Vec::new();
    for cfs in config.ballot_file_sources.iter() {
        let p = resolve_path(&root_path, &cfs.file_path);
        info!("Attempting to read ballot file {:?}", p);
        match cfs.provider.as_str() {
            "csv" => {
                let parsed = csv_reader::read_csv_ballots(p, cfs)?;
                ballots.extend(parsed.iter().map(parsed_to_ballot));
            }
            "csv_ranks" => {
                let (header, bs) = csv_reader::read_csv_ranks(p, cfs)?;
                if header_candidates.is_empty() {
                    header_candidates = header;
                }
                ballots.extend(bs);
            }
            "xlsx" => {
                let parsed = xlsx_reader::read_excel_ballots(p, cfs)?;
                ballots.extend(parsed.iter().map(parsed_to_ballot));
            }
            x => {
                whatever!("Provider not implemented {:?}", x)
            }
        }
    }

    let mut groups: Vec<RankingGroup> = Vec::new();
    for cfs in config.group_file_sources.iter() {
        let p = resolve_path(&root_path, &cfs.file_path);
        info!("Attempting to read ranking group file {:?}", p);
        match cfs.provider.as_str() {
            "csv_groups" | "csv" => groups.extend(csv_reader::read_csv_groups(p)?),
            x => {
                whatever!("Provider not implemented for groups {:?}", x)
            }
        }
    }

    let candidates: Vec<Candidate> = if !config.candidates.is_empty() {
        config
            .candidates
            .iter()
            .map(|c| Candidate {
                name: c.name.clone(),
                code: match c.code.clone() {
                    Some(x) if x.is_empty() => None,
                    x => x,
                },
                excluded: c.excluded.unwrap_or(false),
            })
            .collect()
    } else if !header_candidates.is_empty() {
        header_candidates
            .iter()
            .map(|name| Candidate {
                name: name.clone(),
                code: None,
                excluded: false,
            })
            .collect()
    } else {
        infer_candidates(&ballots, &groups)
    };

    let results_js = match method {
        Method::Borda => {
            let res = match run_borda_count(&ballots, &rules, &candidates) {
                Result::Ok(x) => x,
                Result::Err(x) => {
                    whatever!("Tally error: {:?}", x)
                }
            };
            log_scores(&res.table.sorted_scores());
            borda_results_js(&res)
        }
        Method::QuotaBorda => {
            let res = match run_quota_borda(&ballots, &rules, &candidates) {
                Result::Ok(x) => x,
                Result::Err(x) => {
                    whatever!("Tally error: {:?}", x)
                }
            };
            info!("Allocated seats: {:?}", res.allocation.elected);
            log_scores(&res.table.sorted_scores());
            quota_borda_results_js(&res)
        }
        Method::Dodgson => {
            let res = match run_dodgson(&groups, &candidates) {
                Result::Ok(x) => x,
                Result::Err(x) => {
                    whatever!("Tally error: {:?}", x)
                }
            };
            dodgson_results_js(&res)
        }
    };

    let result_js = build_summary_js(&config, method, results_js);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    match args.out.as_deref() {
        Some("stdout") | None => println!("stats:{}", pretty_js_stats),
        Some(out_path) => {
            fs::write(out_path, &pretty_js_stats).context(WritingSummarySnafu {})?;
            info!("Summary written to {}", out_path);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = args.reference.clone() {
        let summary_ref = config_reader::read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn choice_rows_become_rank_mappings() {
        let pb = ParsedBallot {
            id: None,
            choices: strs(&["A", "", "C"]),
        };
        let b = parsed_to_ballot(&pb);
        assert_eq!(b.rankings, vec![(1, "A".to_string()), (3, "C".to_string())]);
    }

    #[test]
    fn ranks_rows_become_rank_mappings() {
        let header = strs(&["A", "B", "C"]);
        let b = ranks_row_to_ballot(&header, &strs(&["2", "", "1"]), 2).unwrap();
        assert_eq!(b.rankings, vec![(2, "A".to_string()), (1, "C".to_string())]);
    }

    #[test]
    fn ranks_rows_with_garbage_fail() {
        let header = strs(&["A"]);
        let res = ranks_row_to_ballot(&header, &strs(&["x"]), 3);
        assert!(matches!(
            res,
            Err(TallyCliError::CsvNumberParse { lineno: 3 })
        ));
    }

    #[test]
    fn group_rows_carry_their_weight() {
        let g = group_row(&strs(&["6", "A", "B", "C"]), 1).unwrap();
        assert_eq!(g.weight, 6);
        assert_eq!(g.order, strs(&["A", "B", "C"]));
    }

    #[test]
    fn group_rows_without_a_weight_fail() {
        let res = group_row(&strs(&["A", "B"]), 4);
        assert!(matches!(
            res,
            Err(TallyCliError::CsvNumberParse { lineno: 4 })
        ));
    }

    #[test]
    fn candidates_are_inferred_in_first_appearance_order() {
        let ballots = vec![
            parsed_to_ballot(&ParsedBallot {
                id: None,
                choices: strs(&["B", "A"]),
            }),
            parsed_to_ballot(&ParsedBallot {
                id: None,
                choices: strs(&["C"]),
            }),
        ];
        let cands = infer_candidates(&ballots, &[]);
        let names: Vec<String> = cands.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, strs(&["B", "A", "C"]));
    }

    fn rules(method: &str) -> QbRules {
        QbRules {
            method: method.to_string(),
            max_preferences: None,
            seats: None,
            tiebreak_mode: None,
            random_seed: None,
            borda_weighting: None,
        }
    }

    #[test]
    fn default_rules_from_a_minimal_config() {
        let (method, tr) = validate_rules(&rules("borda")).unwrap();
        assert_eq!(method, Method::Borda);
        assert_eq!(tr, TallyRules::DEFAULT_RULES);
    }

    #[test]
    fn rules_accept_strings_and_numbers() {
        let qb = QbRules {
            method: "quotaBorda".to_string(),
            max_preferences: Some(json!("4")),
            seats: Some(json!(3)),
            tiebreak_mode: Some("random".to_string()),
            random_seed: Some("17".to_string()),
            borda_weighting: Some("corrected".to_string()),
        };
        let (method, tr) = validate_rules(&qb).unwrap();
        assert_eq!(method, Method::QuotaBorda);
        assert_eq!(tr.max_preferences, 4);
        assert_eq!(tr.seats, 3);
        assert_eq!(tr.tiebreak_mode, TieBreakMode::Random(17));
        assert_eq!(tr.weighting, BordaWeighting::Corrected);
    }

    #[test]
    fn unknown_method_is_refused() {
        assert!(validate_rules(&rules("irv")).is_err());
    }

    #[test]
    fn zero_seats_is_refused() {
        let qb = QbRules {
            seats: Some(json!(0)),
            ..rules("quotaBorda")
        };
        assert!(validate_rules(&qb).is_err());
    }
}
