//! Reviewer Verdicts
//!
//! The reviewer ends its answer with a `VERDICT:` line. Parsing is
//! deliberately forgiving: review must never block a result, so a
//! missing or unrecognized verdict defaults to `Pass`.

use orchestra_core::parse::extract_thinking;

/// Reviewer judgment on a specialist's output
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The result is acceptable as-is
    Pass,
    /// The result needs another attempt; carries the issue list
    Feedback(String),
}

const NO_DETAILS: &str = "(no details provided)";

/// Parse a reviewer answer into a verdict.
///
/// Case-insensitive. If both PASS and FEEDBACK somehow appear, PASS
/// wins. FEEDBACK captures everything after its verdict line as the
/// issue text.
pub fn parse_verdict(text: &str) -> Verdict {
    let (_, visible) = extract_thinking(text);

    let mut feedback_at: Option<usize> = None;

    let mut offset = 0;
    for line in visible.split_inclusive('\n') {
        let trimmed = line.trim();
        let upper = trimmed.to_uppercase();
        if let Some(rest) = upper.strip_prefix("VERDICT:") {
            let rest = rest.trim();
            if rest.starts_with("PASS") {
                return Verdict::Pass;
            }
            if rest.starts_with("FEEDBACK") && feedback_at.is_none() {
                feedback_at = Some(offset + line.len());
            }
        }
        offset += line.len();
    }

    match feedback_at {
        Some(start) => {
            let detail = visible[start..].trim();
            if detail.is_empty() {
                Verdict::Feedback(NO_DETAILS.into())
            } else {
                Verdict::Feedback(detail.to_string())
            }
        }
        // No verdict at all: default to Pass so review never blocks
        None => Verdict::Pass,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_pass() {
        let text = "Thought: The code looks correct and runs without errors.\n\
                    Answer: The result is complete and accurate.\n\n\
                    VERDICT: PASS";
        assert_eq!(parse_verdict(text), Verdict::Pass);
    }

    #[test]
    fn feedback_with_issues() {
        let text = "Thought: I found some problems.\n\
                    Answer: There are issues with the code.\n\n\
                    VERDICT: FEEDBACK\n\
                    - Issue 1: The function does not handle empty input\n\
                    - Issue 2: Missing error handling for file not found";
        let Verdict::Feedback(detail) = parse_verdict(text) else {
            panic!("expected feedback");
        };
        assert!(detail.contains("empty input"));
        assert!(detail.contains("error handling"));
    }

    #[test]
    fn feedback_single_issue() {
        let text = "VERDICT: FEEDBACK\n- Issue 1: The result does not answer the original question";
        let Verdict::Feedback(detail) = parse_verdict(text) else {
            panic!("expected feedback");
        };
        assert!(detail.contains("original question"));
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(parse_verdict("verdict: pass"), Verdict::Pass);
    }

    #[test]
    fn think_preamble_is_ignored() {
        let text = "<think>Let me check this result carefully...</think>\n\
                    The code is well-written.\n\
                    VERDICT: PASS";
        assert_eq!(parse_verdict(text), Verdict::Pass);
    }

    #[test]
    fn missing_verdict_defaults_to_pass() {
        assert_eq!(
            parse_verdict("The result looks fine to me. Everything checks out."),
            Verdict::Pass
        );
    }

    #[test]
    fn feedback_without_details_gets_placeholder() {
        let Verdict::Feedback(detail) = parse_verdict("VERDICT: FEEDBACK") else {
            panic!("expected feedback");
        };
        assert!(detail.to_lowercase().contains("no details"));
    }

    #[test]
    fn pass_wins_when_both_appear() {
        let text = "VERDICT: PASS\nVERDICT: FEEDBACK\n- something wrong";
        assert_eq!(parse_verdict(text), Verdict::Pass);
    }

    #[test]
    fn feedback_then_pass_still_passes() {
        let text = "VERDICT: FEEDBACK\n- minor nit\nVERDICT: PASS";
        assert_eq!(parse_verdict(text), Verdict::Pass);
    }
}
