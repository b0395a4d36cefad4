use clap::Parser;

/// This is a ranked ballot tabulation program for Borda-family methods.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The file containing the election description in JSON format.
    /// For more information about the file format, read the manual module of the
    /// quota_borda crate.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference file containing the outcome of an election in JSON format. If provided, qbtally will
    /// check that the tabulated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the election will be written in JSON format to the given
    /// location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) The ballot file to tabulate. A lightweight alternative to --config: the
    /// candidates are inferred from the input where the format permits.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default csv) The type of the input. One of csv, csv_ranks, xlsx.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (file path or empty) The ranking-group file for the dodgson method: one group per row,
    /// the first column holding the voter count.
    #[clap(long, value_parser)]
    pub groups: Option<String>,

    /// (default borda) The tallying method. One of borda, quotaBorda, dodgson.
    #[clap(long, value_parser)]
    pub method: Option<String>,

    /// (default 1) The number of seats to fill with the quotaBorda method.
    #[clap(long, value_parser)]
    pub seats: Option<u32>,

    /// (default 6) The largest rank position a ballot may use.
    #[clap(long, value_parser)]
    pub max_preferences: Option<u32>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
