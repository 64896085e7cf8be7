use crate::models::{Criterion, CriterionResult, WidgetDescriptor};

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .filter(|token| !token.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// The key's tokens appear as a contiguous run of whole path or query
/// tokens, so "pods" does not match ".../podsecurity".
fn url_mentions(url: &str, key: &[String]) -> bool {
    tokens(url).windows(key.len()).any(|window| window == key)
}

/// c: at least one stream request was observed for the widget's data source.
///
/// Absence is a `warn`, never a `fail`: REST-only widgets are legitimate.
pub fn stream_connection(widget: &WidgetDescriptor, stream_log: &[String]) -> CriterionResult {
    let criterion = Criterion::StreamConnection;
    let key = tokens(widget.stream_key());

    let matches = if key.is_empty() {
        0
    } else {
        stream_log.iter().filter(|url| url_mentions(url, &key)).count()
    };

    if matches > 0 {
        CriterionResult::pass(
            criterion,
            format!("{matches} stream request(s) observed for '{}'", widget.stream_key()),
        )
    } else {
        CriterionResult::warn(
            criterion,
            format!(
                "no stream request observed for '{}'; widget may be REST-only",
                widget.stream_key()
            ),
        )
    }
}
