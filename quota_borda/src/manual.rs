/*!

This is the long-form manual for `quota_borda` and `qbtally`.

## Methods

Three related tallying methods are provided:

* `borda` Normalized Borda count. Each ballot ranks up to `maxPreferences`
  candidates; rank `j` is worth `maxPreferences - j` points (or
  `maxPreferences - j + 1` with the `corrected` weighting), scaled by the
  normalization factor `k / maxPreferences` for a ballot ranking `k`
  candidates. The candidate scores are reported in descending order.
* `quotaBorda` Quota Borda System for multi-winner elections. Scores are
  accumulated as above, then seats are allocated against the Droop quota
  `total / (seats + 1) + 1`; each winner's surplus is redistributed
  proportionally to the remaining candidates and the winner's score is reset
  to zero.
* `dodgson` Dodgson winner selection over weighted ranking groups. Pairwise
  head-to-head counts are derived from rank positions; when no Condorcet
  winner exists, the candidate needing the fewest voter inversions to beat
  every rival is selected.

## Input formats

The following formats are supported by `qbtally`:

### `csv`

One ballot per row; the columns are choices in rank order (the first choice
column is rank 1). An empty cell leaves that rank blank.

```text
id,choice 1,choice 2,choice 3
id1,A,B,C
id2,C,,A
```

The `id` column is optional, see the `idColumnIndex` and
`firstVoteColumnIndex` file-source options.

### `csv_ranks`

Columns are candidate names, declared in the mandatory header row; each cell
holds the rank that ballot assigns to the candidate, or is left empty for an
unranked candidate. This is the layout produced by most polling exports
sorted by candidate.

```text
A,B,C,D
1,2,3,
1,3,2,4
```

### `xlsx`

The same row-of-choices layout as `csv`, read from the first worksheet of an
Excel workbook.

### Ranking groups (Dodgson)

A CSV file with one group per row: the first column is the number of voters
sharing the order, the remaining columns are the candidates, most preferred
first. Every registered candidate must appear exactly once per row.

```text
6,A,B,C
5,C,A,B
4,B,C,A
```

## Configuration

`qbtally` accepts a configuration file in JSON with the following blocks:

```json
{
    "outputSettings": {
        "contestName": "Board election 2024",
        "contestDate": "2024-05-12",
        "contestJurisdiction": "Appleton",
        "contestOffice": "Board"
    },
    "ballotFileSources": [
        {
            "provider": "csv",
            "filePath": "ballots.csv",
            "firstVoteColumnIndex": 2,
            "idColumnIndex": 1
        }
    ],
    "groupFileSources": [
        { "provider": "csv_groups", "filePath": "groups.csv" }
    ],
    "candidates": [
        { "name": "A", "code": null, "excluded": false },
        { "name": "B", "code": null, "excluded": false }
    ],
    "rules": {
        "method": "quotaBorda",
        "maxPreferences": 6,
        "seats": 3,
        "tiebreakMode": "useCandidateOrder",
        "bordaWeighting": "classic"
    }
}
```

Notes on the file-source options:

- `firstVoteColumnIndex` (string or number, optional): the 1-based column of
  the first choice. Defaults to 1.
- `firstVoteRowIndex` (string or number, optional): the 1-based row where
  ballots start, for skipping header rows. Defaults to 1 (`csv_ranks` always
  consumes the first row as its header).
- `idColumnIndex` (string or number, optional): the column holding a ballot
  identifier, only used in diagnostics.

Notes on the rules:

- `method`: one of `borda`, `quotaBorda`, `dodgson`.
- `maxPreferences` (default 6) and `seats` (default 1) accept strings or
  numbers.
- `tiebreakMode`: `useCandidateOrder` (default) resolves score ties by
  registry order; `random` uses a permutation derived from `randomSeed`.
- `bordaWeighting`: `classic` (default) gives the first choice
  `maxPreferences - 1` points, matching the historical tabulator;
  `corrected` gives it the full `maxPreferences`.

*/
