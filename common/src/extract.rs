use crate::reshape::ReshapeError;

// The simulation emits a single aggregate row per run, so both selectors
// here only ever look at the header plus the first data row.

fn first_round(input: &str) -> Result<(Vec<&str>, Vec<&str>), ReshapeError> {
    let mut lines = input.lines();
    let header = lines
        .next()
        .filter(|l| !l.trim().is_empty())
        .ok_or(ReshapeError::MissingHeader)?;
    let row = lines
        .find(|l| !l.trim().is_empty())
        .ok_or(ReshapeError::MissingData)?;
    Ok((
        header.split(',').map(str::trim).collect(),
        row.split(',').map(str::trim).collect(),
    ))
}

fn select(
    input: &str,
    matches: impl Fn(&str) -> bool,
    labeled: impl Fn(&str) -> String,
) -> Result<Vec<String>, ReshapeError> {
    let (header, row) = first_round(input)?;
    let mut out = Vec::new();
    for (idx, name) in header.iter().enumerate() {
        if !matches(name) {
            continue;
        }
        let value = row.get(idx).ok_or(ReshapeError::ShortRow {
            row: 1,
            need: idx + 1,
            found: row.len(),
        })?;
        out.push(format!("{},{value}", labeled(name)));
    }
    Ok(out)
}

/// Per-block wall-clock averages, labeled by the block count embedded in
/// the column name (`<prefix>_<blocks>_..._wall_avg`).
pub fn block_averages(input: &str) -> Result<Vec<String>, ReshapeError> {
    select(
        input,
        |name| name.contains("Block") && name.contains("wall_avg"),
        |name| name.split('_').nth(1).unwrap_or(name).to_owned(),
    )
}

/// Decrypt and write-proof wall-clock totals, labeled with the full
/// column name.
pub fn operation_sums(input: &str) -> Result<Vec<String>, ReshapeError> {
    select(
        input,
        |name| name.contains("Decrypt_wall_sum") || name.contains("WriteProof_wall_sum"),
        |name| name.to_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_averages_label_by_block_count() {
        let input = "round,Blocks_8_verify_wall_avg,Blocks_16_verify_wall_avg,other\n1,0.25,0.75,9";
        let out = block_averages(input).unwrap();
        assert_eq!(out, vec!["8,0.25".to_owned(), "16,0.75".to_owned()]);
    }

    #[test]
    fn operation_sums_keep_full_column_names() {
        let input = "Decrypt_wall_sum,WriteProof_wall_sum,Decrypt_user_sum\n3.5,1.25,0.5";
        let out = operation_sums(input).unwrap();
        assert_eq!(
            out,
            vec![
                "Decrypt_wall_sum,3.5".to_owned(),
                "WriteProof_wall_sum,1.25".to_owned(),
            ]
        );
    }

    #[test]
    fn missing_data_row_is_rejected() {
        let err = block_averages("Blocks_8_verify_wall_avg\n").unwrap_err();
        assert!(matches!(err, ReshapeError::MissingData));
    }
}
