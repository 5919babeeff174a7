/// Metric extraction from the CLI's `--verbose` diagnostic stream.
///
/// The CLI prints a block like:
///
/// ```text
/// total duration:       5.7129s
/// load duration:        1m2.5s
/// prompt eval count:    26 token(s)
/// prompt eval duration: 812.4ms
/// prompt eval rate:     32.00 tokens/s
/// eval count:           298 token(s)
/// eval duration:        4.9s
/// eval rate:            60.82 tokens/s
/// ```
///
/// Each field has its own line pattern in a declarative table and is
/// searched independently; the first match wins.
use crate::duration::duration_to_seconds;
use regex::Regex;
use std::sync::LazyLock;

/// The eight metrics recorded per run, in CSV column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricField {
    TotalDuration,
    LoadDuration,
    PromptEvalCount,
    PromptEvalDuration,
    PromptEvalRate,
    EvalCount,
    EvalDuration,
    EvalRate,
}

/// How a matched value is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Integer token count.
    Count,
    /// Tokens per second.
    Rate,
    /// Duration token converted to seconds.
    Duration,
}

/// A decoded metric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Count(u64),
    Float(f64),
}

impl MetricField {
    pub const ALL: [MetricField; 8] = [
        MetricField::TotalDuration,
        MetricField::LoadDuration,
        MetricField::PromptEvalCount,
        MetricField::PromptEvalDuration,
        MetricField::PromptEvalRate,
        MetricField::EvalCount,
        MetricField::EvalDuration,
        MetricField::EvalRate,
    ];

    /// CSV column name.
    pub fn column(self) -> &'static str {
        match self {
            MetricField::TotalDuration => "total_duration_s",
            MetricField::LoadDuration => "load_duration_s",
            MetricField::PromptEvalCount => "prompt_eval_count",
            MetricField::PromptEvalDuration => "prompt_eval_duration_s",
            MetricField::PromptEvalRate => "prompt_eval_rate_tps",
            MetricField::EvalCount => "eval_count",
            MetricField::EvalDuration => "eval_duration_s",
            MetricField::EvalRate => "eval_rate_tps",
        }
    }

    /// Line label as printed by the CLI (without the colon).
    pub fn label(self) -> &'static str {
        match self {
            MetricField::TotalDuration => "total duration",
            MetricField::LoadDuration => "load duration",
            MetricField::PromptEvalCount => "prompt eval count",
            MetricField::PromptEvalDuration => "prompt eval duration",
            MetricField::PromptEvalRate => "prompt eval rate",
            MetricField::EvalCount => "eval count",
            MetricField::EvalDuration => "eval duration",
            MetricField::EvalRate => "eval rate",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            MetricField::PromptEvalCount | MetricField::EvalCount => ValueKind::Count,
            MetricField::PromptEvalRate | MetricField::EvalRate => ValueKind::Rate,
            _ => ValueKind::Duration,
        }
    }

    /// Regex source for this field's line.
    ///
    /// Lines are anchored at the start, allowing only non-word decoration
    /// (spinner glyphs, indentation) before the label, so `eval count:`
    /// never matches inside `prompt eval count:`.
    fn pattern(self) -> String {
        let value = match self.kind() {
            ValueKind::Count => r"(\d+)[ \t]*token",
            ValueKind::Rate => r"([\d.]+)[ \t]*tokens/s",
            ValueKind::Duration => r"(\S+)",
        };
        format!(r"(?m)^[^\w\n]*{}:[ \t]*{}", regex::escape(self.label()), value)
    }
}

/// Compiled extraction table: field → line pattern.
static EXTRACTION_TABLE: LazyLock<Vec<(MetricField, Regex)>> = LazyLock::new(|| {
    MetricField::ALL
        .iter()
        .map(|field| (*field, Regex::new(&field.pattern()).unwrap()))
        .collect()
});

/// Terminal control sequences (spinner, cursor hide/show, line erase).
static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap());

/// Metrics parsed from one run. Every field is independently optional.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricRecord {
    pub total_duration_s: Option<f64>,
    pub load_duration_s: Option<f64>,
    pub prompt_eval_count: Option<u64>,
    pub prompt_eval_duration_s: Option<f64>,
    pub prompt_eval_rate_tps: Option<f64>,
    pub eval_count: Option<u64>,
    pub eval_duration_s: Option<f64>,
    pub eval_rate_tps: Option<f64>,
}

impl MetricRecord {
    /// Store a decoded value. A value of the wrong kind for the field is ignored.
    pub fn set(&mut self, field: MetricField, value: MetricValue) {
        match (field, value) {
            (MetricField::PromptEvalCount, MetricValue::Count(n)) => {
                self.prompt_eval_count = Some(n)
            }
            (MetricField::EvalCount, MetricValue::Count(n)) => self.eval_count = Some(n),
            (MetricField::TotalDuration, MetricValue::Float(v)) => {
                self.total_duration_s = Some(v)
            }
            (MetricField::LoadDuration, MetricValue::Float(v)) => self.load_duration_s = Some(v),
            (MetricField::PromptEvalDuration, MetricValue::Float(v)) => {
                self.prompt_eval_duration_s = Some(v)
            }
            (MetricField::PromptEvalRate, MetricValue::Float(v)) => {
                self.prompt_eval_rate_tps = Some(v)
            }
            (MetricField::EvalDuration, MetricValue::Float(v)) => self.eval_duration_s = Some(v),
            (MetricField::EvalRate, MetricValue::Float(v)) => self.eval_rate_tps = Some(v),
            (field, value) => {
                tracing::debug!(field = field.column(), ?value, "value kind mismatch, ignored")
            }
        }
    }

    pub fn get(&self, field: MetricField) -> Option<MetricValue> {
        match field {
            MetricField::TotalDuration => self.total_duration_s.map(MetricValue::Float),
            MetricField::LoadDuration => self.load_duration_s.map(MetricValue::Float),
            MetricField::PromptEvalCount => self.prompt_eval_count.map(MetricValue::Count),
            MetricField::PromptEvalDuration => {
                self.prompt_eval_duration_s.map(MetricValue::Float)
            }
            MetricField::PromptEvalRate => self.prompt_eval_rate_tps.map(MetricValue::Float),
            MetricField::EvalCount => self.eval_count.map(MetricValue::Count),
            MetricField::EvalDuration => self.eval_duration_s.map(MetricValue::Float),
            MetricField::EvalRate => self.eval_rate_tps.map(MetricValue::Float),
        }
    }

    /// Number of fields that have a value.
    pub fn populated(&self) -> usize {
        MetricField::ALL
            .iter()
            .filter(|f| self.get(**f).is_some())
            .count()
    }
}

/// Strip terminal escapes and turn carriage returns into line breaks.
///
/// The CLI redraws a spinner on stderr while the model loads, so raw
/// diagnostics interleave control sequences with the text lines.
pub fn clean_diagnostics(text: &str) -> String {
    let stripped = ANSI_ESCAPE.replace_all(text, "");
    stripped.replace("\r\n", "\n").replace('\r', "\n")
}

/// Decode a captured value according to its kind.
///
/// Decode failures are logged and yield `None`; they never affect other fields.
fn decode(field: MetricField, raw: &str) -> Option<MetricValue> {
    match field.kind() {
        ValueKind::Count => match raw.parse::<u64>() {
            Ok(n) => Some(MetricValue::Count(n)),
            Err(e) => {
                tracing::warn!(field = field.column(), raw, error = %e, "unparseable count");
                None
            }
        },
        ValueKind::Rate => match raw.parse::<f64>() {
            Ok(v) => Some(MetricValue::Float(v)),
            Err(e) => {
                tracing::warn!(field = field.column(), raw, error = %e, "unparseable rate");
                None
            }
        },
        ValueKind::Duration => duration_to_seconds(Some(raw)).map(MetricValue::Float),
    }
}

/// Extract all known metrics from a diagnostic stream.
pub fn extract(diagnostics: &str) -> MetricRecord {
    let text = clean_diagnostics(diagnostics);
    let mut record = MetricRecord::default();

    for (field, pattern) in EXTRACTION_TABLE.iter() {
        let Some(raw) = pattern
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
        else {
            continue;
        };
        if let Some(value) = decode(*field, raw) {
            record.set(*field, value);
        }
    }

    tracing::debug!(populated = record.populated(), "metrics extracted");
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_OUTPUT: &str = "\
total duration:       5.7129s
load duration:        1m2.5s
prompt eval count:    26 token(s)
prompt eval duration: 812.4ms
prompt eval rate:     32.00 tokens/s
eval count:           298 token(s)
eval duration:        4.9s
eval rate:            60.82 tokens/s
";

    fn approx(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("field should be populated");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_extract_all_fields() {
        let m = extract(FULL_OUTPUT);
        approx(m.total_duration_s, 5.7129);
        approx(m.load_duration_s, 62.5);
        assert_eq!(m.prompt_eval_count, Some(26));
        approx(m.prompt_eval_duration_s, 0.8124);
        approx(m.prompt_eval_rate_tps, 32.0);
        assert_eq!(m.eval_count, Some(298));
        approx(m.eval_duration_s, 4.9);
        approx(m.eval_rate_tps, 60.82);
        assert_eq!(m.populated(), 8);
    }

    #[test]
    fn test_extract_order_independent() {
        let mut lines: Vec<&str> = FULL_OUTPUT.lines().collect();
        lines.reverse();
        let reversed = extract(&lines.join("\n"));
        assert_eq!(reversed, extract(FULL_OUTPUT));

        // Put the bare eval lines ahead of the prompt eval lines
        let shuffled = "\
eval rate:            60.82 tokens/s
eval count:           298 token(s)
prompt eval rate:     32.00 tokens/s
total duration:       5.7129s
eval duration:        4.9s
prompt eval count:    26 token(s)
load duration:        1m2.5s
prompt eval duration: 812.4ms
";
        assert_eq!(extract(shuffled), extract(FULL_OUTPUT));
    }

    #[test]
    fn test_extract_subset_leaves_rest_empty() {
        let m = extract("eval count: 100 tokens\neval rate: 12.5 tokens/s\n");
        assert_eq!(m.eval_count, Some(100));
        approx(m.eval_rate_tps, 12.5);
        assert_eq!(m.total_duration_s, None);
        assert_eq!(m.load_duration_s, None);
        assert_eq!(m.prompt_eval_count, None);
        assert_eq!(m.prompt_eval_duration_s, None);
        assert_eq!(m.prompt_eval_rate_tps, None);
        assert_eq!(m.eval_duration_s, None);
        assert_eq!(m.populated(), 2);
    }

    #[test]
    fn test_prompt_eval_lines_do_not_fill_eval_fields() {
        let m = extract(
            "prompt eval count: 26 tokens\nprompt eval duration: 10ms\nprompt eval rate: 5.0 tokens/s\n",
        );
        assert_eq!(m.prompt_eval_count, Some(26));
        assert_eq!(m.eval_count, None);
        assert_eq!(m.eval_duration_s, None);
        assert_eq!(m.eval_rate_tps, None);
    }

    #[test]
    fn test_extract_empty_text() {
        assert_eq!(extract(""), MetricRecord::default());
    }

    #[test]
    fn test_first_match_wins_on_duplicates() {
        let m = extract("eval count: 10 tokens\neval count: 20 tokens\n");
        assert_eq!(m.eval_count, Some(10));
    }

    #[test]
    fn test_malformed_duration_only_nulls_that_field() {
        let m = extract("total duration: 1.2.3s\nload duration: 250µs\neval count: 7 tokens\n");
        assert_eq!(m.total_duration_s, None);
        assert_eq!(m.load_duration_s, Some(0.00025));
        assert_eq!(m.eval_count, Some(7));
    }

    #[test]
    fn test_malformed_rate_only_nulls_that_field() {
        let m = extract("eval rate: 1.2.3 tokens/s\neval duration: 2.5s\n");
        assert_eq!(m.eval_rate_tps, None);
        assert_eq!(m.eval_duration_s, Some(2.5));
    }

    #[test]
    fn test_plain_tokens_suffix_accepted() {
        let m = extract("prompt eval count: 12 tokens\n");
        assert_eq!(m.prompt_eval_count, Some(12));
    }

    #[test]
    fn test_spinner_and_ansi_noise_stripped() {
        let noisy = "\x1b[?25l⠙ \x1b[?25h\x1b[2K\x1b[1G\rtotal duration:       1m30s\r\n\
                     \x1b[?25lload duration:        500ms\n";
        let m = extract(noisy);
        assert_eq!(m.total_duration_s, Some(90.0));
        assert_eq!(m.load_duration_s, Some(0.5));
    }

    #[test]
    fn test_indented_lines_match() {
        let m = extract("   eval duration:   2.5s\n");
        assert_eq!(m.eval_duration_s, Some(2.5));
    }

    #[test]
    fn test_label_mid_sentence_does_not_match() {
        let m = extract("the total duration: 5s was long\n");
        assert_eq!(m.total_duration_s, None);
    }

    #[test]
    fn test_set_ignores_kind_mismatch() {
        let mut m = MetricRecord::default();
        m.set(MetricField::EvalCount, MetricValue::Float(1.5));
        assert_eq!(m.eval_count, None);
        m.set(MetricField::EvalCount, MetricValue::Count(3));
        assert_eq!(m.get(MetricField::EvalCount), Some(MetricValue::Count(3)));
    }

    #[test]
    fn test_field_table_shape() {
        assert_eq!(MetricField::ALL.len(), EXTRACTION_TABLE.len());
        for field in MetricField::ALL {
            let expected = match field.kind() {
                ValueKind::Count => "_count",
                ValueKind::Rate => "_rate_tps",
                ValueKind::Duration => "_duration_s",
            };
            assert!(field.column().ends_with(expected), "{}", field.column());
        }
    }
}
