// src/core/verdict.rs

use crate::models::Verdict;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A bare `check-sat` answer on its own line.
    static ref ANSWER_LINE: Regex =
        Regex::new(r"^\s*(unsat|sat|unknown)\s*$").expect("answer regex is valid");
}

impl Verdict {
    /// Reads the solver's answer from the first non-empty line of its stdout.
    ///
    /// Anything else on that line, including an `(error "...")` diagnostic, makes the
    /// output `Unrecognized`, even if an answer follows further down.
    pub fn classify(solver_stdout: &str) -> Self {
        solver_stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .and_then(|line| ANSWER_LINE.captures(line))
            .and_then(|caps| caps.get(1))
            .map(|answer| match answer.as_str() {
                "unsat" => Self::Unsat,
                "sat" => Self::Sat,
                _ => Self::Unknown,
            })
            .unwrap_or(Self::Unrecognized)
    }

    /// A short human explanation, used in failure messages.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Unsat => "the solver answered unsat",
            Self::Sat => "the solver found a counterexample (sat)",
            Self::Unknown => "the solver could not decide (unknown)",
            Self::Unrecognized => "the solver output contained no answer",
        }
    }
}

/// The pass/fail gate: a trial passes iff the marker occurs anywhere in the solver output.
pub fn passes(solver_stdout: &str, marker: &str) -> bool {
    solver_stdout.contains(marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_answers() {
        assert_eq!(Verdict::classify("unsat\n"), Verdict::Unsat);
        assert_eq!(Verdict::classify("sat\n(model)\n"), Verdict::Sat);
        assert_eq!(Verdict::classify("unknown"), Verdict::Unknown);
    }

    #[test]
    fn test_classify_reads_first_non_empty_line() {
        assert_eq!(Verdict::classify("\n  \nunsat\n"), Verdict::Unsat);
        let output = "(error \"line 1: unknown constant\")\nsat\n";
        assert_eq!(Verdict::classify(output), Verdict::Unrecognized);
        let output = "(error \"line 3 column 10: unknown constant x\")\nunsat\n";
        assert_eq!(Verdict::classify(output), Verdict::Unrecognized);
    }

    #[test]
    fn test_classify_garbage_and_empty() {
        assert_eq!(Verdict::classify(""), Verdict::Unrecognized);
        assert_eq!(Verdict::classify("segmentation fault"), Verdict::Unrecognized);
        // Only whole-line answers count.
        assert_eq!(Verdict::classify("unsatisfiable core"), Verdict::Unrecognized);
    }

    #[test]
    fn test_marker_is_a_plain_substring() {
        assert!(passes("unsat\n", "unsat"));
        assert!(passes("(error \"x\")\nunsat", "unsat"));
        assert!(!passes("sat\n", "unsat"));
        assert!(!passes("", "unsat"));
    }
}
