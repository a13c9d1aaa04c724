//! Delegation directive parsing
//!
//! A delegating agent asks a coworker for help by replying with a line
//! `DELEGATE TO <role>: <question>`. Text after that line belongs to the
//! question.

const DIRECTIVE: &str = "DELEGATE TO";

/// A parsed delegation directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationRequest {
    pub coworker: String,
    pub question: String,
}

/// Find the first delegation directive in a reply
pub fn parse_delegation(reply: &str) -> Option<DelegationRequest> {
    let mut lines = reply.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim().trim_start_matches(['*', '`', '>']).trim_start();
        let Some(head) = trimmed.get(..DIRECTIVE.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(DIRECTIVE) {
            continue;
        }

        let (coworker, first) = trimmed[DIRECTIVE.len()..].split_once(':')?;
        let coworker = coworker.trim().trim_matches(['*', '`']).trim();

        let mut question = first.trim().to_string();
        for rest in lines.by_ref() {
            if !question.is_empty() {
                question.push('\n');
            }
            question.push_str(rest);
        }
        let question = question.trim().to_string();

        if coworker.is_empty() || question.is_empty() {
            return None;
        }

        return Some(DelegationRequest {
            coworker: coworker.to_string(),
            question,
        });
    }

    None
}
