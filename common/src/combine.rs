use thiserror::Error;

#[derive(Error, Debug)]
pub enum CombineError {
    #[error("{file} row {row}: need at least 2 fields, found {found}")]
    ShortRow {
        file: &'static str,
        row: usize,
        found: usize,
    },
    #[error("Counts row {row}: cannot parse '{token}' as an integer")]
    BadCount { row: usize, token: String },
    #[error("Mismatched inputs: {times} time rows vs {counts} count rows")]
    LengthMismatch { times: usize, counts: usize },
}

fn two_fields(
    line: &str,
    file: &'static str,
    row: usize,
) -> Result<(String, String), CombineError> {
    let mut tokens = line.split(',');
    match (tokens.next(), tokens.next()) {
        (Some(a), Some(b)) => Ok((a.trim().to_owned(), b.trim().to_owned())),
        _ => Err(CombineError::ShortRow {
            file,
            row,
            found: 1,
        }),
    }
}

/// Merges a per-block `block,time` file with a per-block `write,read`
/// counts file into one table row per block. `TotalCount` is the integer
/// sum of the two counts; `IsWrite`/`IsRead` flag whether the respective
/// count is positive. Neither input carries a header.
pub fn combine_counts(times: &str, counts: &str) -> Result<Vec<String>, CombineError> {
    let mut blocks = Vec::new();
    for (i, line) in times.lines().filter(|l| !l.trim().is_empty()).enumerate() {
        blocks.push(two_fields(line, "Times", i + 1)?);
    }

    let mut totals = Vec::new();
    for (i, line) in counts.lines().filter(|l| !l.trim().is_empty()).enumerate() {
        let (write, read) = two_fields(line, "Counts", i + 1)?;
        let parse = |token: &str| {
            token.parse::<i64>().map_err(|_| CombineError::BadCount {
                row: i + 1,
                token: token.to_owned(),
            })
        };
        totals.push((parse(&write)?, parse(&read)?));
    }

    if blocks.len() != totals.len() {
        return Err(CombineError::LengthMismatch {
            times: blocks.len(),
            counts: totals.len(),
        });
    }

    let mut out = vec!["Block,WriteCount,ReadCount,TotalCount,BlockTime,IsWrite,IsRead".to_owned()];
    for ((block, time), (write, read)) in blocks.into_iter().zip(totals) {
        let is_write = u8::from(write > 0);
        let is_read = u8::from(read > 0);
        out.push(format!(
            "{block},{write},{read},{},{time},{is_write},{is_read}",
            write + read
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_times_and_counts_per_block() {
        let times = "101,0.52\n102,0.61\n103,0.47";
        let counts = "3,0\n0,2\n1,4";
        let out = combine_counts(times, counts).unwrap();
        assert_eq!(
            out,
            vec![
                "Block,WriteCount,ReadCount,TotalCount,BlockTime,IsWrite,IsRead".to_owned(),
                "101,3,0,3,0.52,1,0".to_owned(),
                "102,0,2,2,0.61,0,1".to_owned(),
                "103,1,4,5,0.47,1,1".to_owned(),
            ]
        );
    }

    #[test]
    fn trims_carriage_returns_from_fields() {
        let out = combine_counts("101,0.52\r\n", "1,1\r\n").unwrap();
        assert_eq!(out[1], "101,1,1,2,0.52,1,1");
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = combine_counts("101,0.52\n102,0.61", "1,1").unwrap_err();
        assert!(matches!(
            err,
            CombineError::LengthMismatch {
                times: 2,
                counts: 1
            }
        ));
    }

    #[test]
    fn rejects_non_numeric_count() {
        let err = combine_counts("101,0.52", "one,2").unwrap_err();
        match err {
            CombineError::BadCount { row, token } => {
                assert_eq!(row, 1);
                assert_eq!(token, "one");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_short_times_row() {
        let err = combine_counts("101", "1,2").unwrap_err();
        assert!(matches!(
            err,
            CombineError::ShortRow { file: "Times", .. }
        ));
    }
}
