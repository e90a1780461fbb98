//! Tolerant output validation: captured stdout vs the expected-value grid.

use runcheck_types::{
    is_narrative_line, split_value_line, ChapterConfig, ValidationCode, ValidationError, ValueCell,
};

/// Compare captured process output against a chapter's expected-value grid.
///
/// Pure over its inputs and usable independently of the pipeline. Returns
/// `None` on success, or the first mismatch found:
///
/// - more data rows than expected → `ERR_TOO_MANY_VALUES`
/// - a row with the wrong field count → `ERR_INCORRECT_VALUE_COUNT_LINE`
/// - a cell outside the tolerance → `ERR_INCORRECT_RESULT`
/// - fewer data rows than expected → `ERR_TOO_FEW_VALUES`
///
/// Blank lines and `[#]`-prefixed narrative lines never count as data.
pub fn validate(chapter: &ChapterConfig, actual: &str) -> Option<ValidationError> {
    let expected = &chapter.expected_values;
    let mut row_index = 0usize;

    for line in actual.lines() {
        let cleaned = line.trim();
        if cleaned.is_empty() || is_narrative_line(cleaned) {
            continue;
        }

        // Bail out before indexing past the expected grid.
        if row_index >= expected.len() {
            tracing::warn!(line = cleaned, "too much output");
            return Some(ValidationError::new(
                ValidationCode::TooManyValues,
                "There were too many outputted values",
                format!("{} rows", expected.len()),
                format!("Additional value: {cleaned}"),
            ));
        }

        let expected_row = &expected[row_index];
        let fields = split_value_line(line);
        if fields.len() != expected_row.len() {
            tracing::warn!(
                line = cleaned,
                expected = expected_row.len(),
                actual = fields.len(),
                "wrong number of values in line"
            );
            return Some(ValidationError::new(
                ValidationCode::IncorrectValueCountLine,
                "Line does not have the expected number of values",
                format!("{} values", expected_row.len()),
                format!("{} values in line: {cleaned}", fields.len()),
            ));
        }

        for (field, expected_cell) in fields.iter().zip(&expected_row.cells) {
            let actual_cell = ValueCell::from_raw(field);
            if !expected_cell.approx_eq(&actual_cell, chapter.delta) {
                tracing::warn!(
                    expected = %expected_cell,
                    actual = %actual_cell,
                    delta = chapter.delta,
                    "output value does not match"
                );
                return Some(ValidationError::new(
                    ValidationCode::IncorrectResult,
                    "Output value does not match expected value",
                    expected_cell.to_string(),
                    // Report the field as printed, not the parsed number.
                    field.clone(),
                ));
            }
        }

        row_index += 1;
    }

    if row_index < expected.len() {
        tracing::warn!(
            expected = expected.len(),
            actual = row_index,
            "not enough output"
        );
        return Some(ValidationError::new(
            ValidationCode::TooFewValues,
            "There were not enough values outputted",
            expected.len().to_string(),
            row_index.to_string(),
        ));
    }

    None
}

/// The descriptor used when a chapter has no expected-value spec and the
/// configuration says that is a hard failure.
pub fn missing_expected_values(file: &str) -> ValidationError {
    ValidationError::new(
        ValidationCode::MissingExpectedValues,
        "No expected-value specification found for this chapter",
        "a chapter config".to_string(),
        file.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(delta: f64, rows: &[&str]) -> ChapterConfig {
        let mut config = ChapterConfig {
            description: String::new(),
            delta,
            output_values: rows.iter().map(|r| r.to_string()).collect(),
            expected_values: Vec::new(),
        };
        config.derive_expected_values();
        config
    }

    #[test]
    fn identical_output_passes() {
        let c = chapter(0.0, &["3.14\tok", "1\t2\t3"]);
        assert_eq!(validate(&c, "3.14\tok\n1\t2\t3\n"), None);
    }

    #[test]
    fn numeric_values_within_delta_pass() {
        let c = chapter(0.01, &["3.14\tok"]);
        assert_eq!(validate(&c, "3.15\tok\n"), None);
    }

    #[test]
    fn numeric_value_outside_delta_is_incorrect_result() {
        let c = chapter(0.01, &["3.14\tok"]);
        let err = validate(&c, "3.20\tok\n").unwrap();
        assert_eq!(err.code, ValidationCode::IncorrectResult);
        assert_eq!(err.expected, "3.14");
        assert_eq!(err.actual, "3.20");
    }

    #[test]
    fn text_cell_never_matches_numeric_output() {
        let c = chapter(1000.0, &["banana"]);
        let err = validate(&c, "42\n").unwrap();
        assert_eq!(err.code, ValidationCode::IncorrectResult);
    }

    #[test]
    fn extra_data_rows_are_too_many_values() {
        let c = chapter(0.0, &["1"]);
        let err = validate(&c, "1\n2\n").unwrap();
        assert_eq!(err.code, ValidationCode::TooManyValues);
        assert!(err.actual.contains('2'));
    }

    #[test]
    fn fewer_data_rows_are_too_few_values() {
        let c = chapter(0.0, &["1\t2", "3\t4"]);
        let err = validate(&c, "1\t2\n").unwrap();
        assert_eq!(err.code, ValidationCode::TooFewValues);
        assert_eq!(err.expected, "2");
        assert_eq!(err.actual, "1");
    }

    #[test]
    fn missing_single_expected_row_is_detected() {
        // A shortfall of exactly one row must still be reported.
        let c = chapter(0.0, &["1", "2"]);
        let err = validate(&c, "1\n").unwrap();
        assert_eq!(err.code, ValidationCode::TooFewValues);
    }

    #[test]
    fn wrong_field_count_is_line_level_error_not_cell_error() {
        let c = chapter(0.0, &["1\t2\t3"]);
        let err = validate(&c, "1\t2\n").unwrap();
        assert_eq!(err.code, ValidationCode::IncorrectValueCountLine);
        assert_eq!(err.expected, "3 values");
    }

    #[test]
    fn narrative_and_blank_lines_never_advance_rows() {
        let c = chapter(0.0, &["1\t2"]);
        let output = "[#] simulating things\n\n   \n1\t2\n[#] done\n\n";
        assert_eq!(validate(&c, output), None);
    }

    #[test]
    fn trailing_blank_lines_are_not_extra_rows() {
        let c = chapter(0.0, &["7"]);
        assert_eq!(validate(&c, "7\n\n\n"), None);
    }

    #[test]
    fn empty_expected_grid_accepts_empty_output_only() {
        let c = chapter(0.0, &[]);
        assert_eq!(validate(&c, "\n[#] chatter\n"), None);
        let err = validate(&c, "1\n").unwrap();
        assert_eq!(err.code, ValidationCode::TooManyValues);
    }

    #[test]
    fn first_mismatching_cell_short_circuits() {
        let c = chapter(0.0, &["1\t2\t3"]);
        let err = validate(&c, "1\t9\t9\n").unwrap();
        assert_eq!(err.code, ValidationCode::IncorrectResult);
        assert_eq!(err.expected, "2");
        assert_eq!(err.actual, "9");
    }
}
