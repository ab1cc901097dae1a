/// Response classifier — emphasis tagging for old and invalid player responses.
///
/// Runs after link evaluation and never changes response order or membership.

use crate::core::evaluator::{DialogueEvaluator, SimStatus};
use crate::core::state::Response;
use crate::schema::settings::{EmTag, ResponseDisplaySettings};

pub struct ResponseClassifier<'a> {
    settings: &'a ResponseDisplaySettings,
}

impl<'a> ResponseClassifier<'a> {
    pub fn new(settings: &'a ResponseDisplaySettings) -> Self {
        Self { settings }
    }

    /// Format player responses.
    ///
    /// A response the player has already chosen gets the old-response tag;
    /// an invalid response kept visible gets the invalid-response tag, which
    /// wins when both apply.
    pub fn format_pc_responses<E>(&self, responses: Vec<Response>, evaluator: &E) -> Vec<Response>
    where
        E: DialogueEvaluator + ?Sized,
    {
        responses
            .into_iter()
            .map(|mut response| {
                let is_old = evaluator.sim_status(response.destination) == SimStatus::WasDisplayed;
                if is_old {
                    response.formatted_text =
                        apply_em_tag(&response.formatted_text, self.settings.em_tag_for_old_responses);
                }
                if !response.is_valid {
                    response.formatted_text = apply_em_tag(
                        &response.formatted_text,
                        self.settings.em_tag_for_invalid_responses,
                    );
                }
                response
            })
            .collect()
    }
}

/// Wrap text in `[emN]...[/emN]`, replacing any emphasis already present.
pub fn apply_em_tag(text: &str, tag: EmTag) -> String {
    match tag.index() {
        None => text.to_string(),
        Some(n) => format!("[em{n}]{}[/em{n}]", strip_em_tags(text)),
    }
}

/// Remove every `[emN]` and `[/emN]` tag.
pub fn strip_em_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('[') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match em_tag_len(candidate) {
            Some(len) => rest = &candidate[len..],
            None => {
                out.push('[');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn em_tag_len(s: &str) -> Option<usize> {
    let body = s.strip_prefix('[')?;
    let (body, slash) = match body.strip_prefix('/') {
        Some(b) => (b, 1),
        None => (body, 0),
    };
    let digit = body.strip_prefix("em")?.chars().next()?;
    if !digit.is_ascii_digit() {
        return None;
    }
    let tail = &body[3..];
    tail.starts_with(']').then_some(1 + slash + 2 + 1 + 1)
}
