use crate::scoring::{Rank, ScoreInput, ScoreResult, XpShare};

const MANUAL_COLOR: &str = "#d35400";
const COMPUTED_COLOR: &str = "#27ae60";

pub fn split_summary(split: &[XpShare]) -> String {
    split
        .iter()
        .map(|share| format!("{}: {} XP", share.stat, share.amount))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn rank_summary(result: &ScoreResult) -> String {
    format!(
        "{}-Rank (Score: {:.1})",
        result.computed_rank, result.total_score
    )
}

pub fn render_index(input: &ScoreInput, result: &ScoreResult, stats: &[String]) -> String {
    let color = if input.manual_rank.is_some() {
        MANUAL_COLOR
    } else {
        COMPUTED_COLOR
    };

    INDEX_HTML
        .replace("{{DURATION}}", &input.duration_minutes.to_string())
        .replace("{{EFFORT}}", &input.effort_level.to_string())
        .replace("{{IMPACT}}", &input.impact_level.to_string())
        .replace("{{FEAR}}", &format!("{:.1}", input.fear_factor))
        .replace(
            "{{PRIMARY_OPTIONS}}",
            &stat_options(stats, Some(&input.primary_stat), false),
        )
        .replace(
            "{{SECONDARY_OPTIONS}}",
            &stat_options(stats, input.secondary_stat.as_deref(), true),
        )
        .replace("{{RANK_OPTIONS}}", &rank_options(input.manual_rank))
        .replace("{{COMPUTED}}", &escape(&rank_summary(result)))
        .replace("{{SPLIT}}", &escape(&split_summary(&result.xp_split)))
        .replace("{{COLOR}}", color)
}

fn stat_options(stats: &[String], selected: Option<&str>, allow_blank: bool) -> String {
    let mut options = String::new();
    if allow_blank {
        options.push_str(r#"<option value="">---------</option>"#);
    }
    for stat in stats {
        let marker = if selected == Some(stat.as_str()) {
            " selected"
        } else {
            ""
        };
        let stat = escape(stat);
        options.push_str(&format!(r#"<option value="{stat}"{marker}>{stat}</option>"#));
    }
    options
}

fn rank_options(selected: Option<Rank>) -> String {
    let mut options = String::from(r#"<option value="">Computed</option>"#);
    for rank in Rank::ALL {
        let marker = if selected == Some(rank) { " selected" } else { "" };
        options.push_str(&format!(
            r#"<option value="{}"{marker}>{} ({} XP)</option>"#,
            rank.code(),
            rank.label(),
            rank.xp()
        ));
    }
    options
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Gate - XP Preview</title>
  <style>
    :root {
      --bg: #14161c;
      --card: #1e222b;
      --ink: #e8e6e3;
      --muted: #8b93a1;
      --accent: #5b8def;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 32px 18px;
    }

    form {
      width: min(560px, 100%);
      background: var(--card);
      border-radius: 18px;
      padding: 28px;
      display: grid;
      gap: 14px;
    }

    label {
      display: grid;
      gap: 4px;
      color: var(--muted);
      font-size: 0.9rem;
    }

    input, select {
      padding: 8px 10px;
      border-radius: 8px;
      border: 1px solid #333a47;
      background: #161920;
      color: var(--ink);
    }

    button {
      padding: 10px;
      border: none;
      border-radius: 10px;
      background: var(--accent);
      color: white;
      font-weight: 600;
      cursor: pointer;
    }

    .preview {
      border-top: 1px solid #333a47;
      padding-top: 14px;
      display: grid;
      gap: 6px;
    }
  </style>
</head>
<body>
  <form method="get" action="/">
    <h1>XP Preview</h1>
    <label>Primary stat
      <select id="id_primary_stat" name="primary_stat">{{PRIMARY_OPTIONS}}</select>
    </label>
    <label>Secondary stat
      <select id="id_secondary_stat" name="secondary_stat">{{SECONDARY_OPTIONS}}</select>
    </label>
    <label>Manual rank
      <select id="id_manual_rank" name="manual_rank">{{RANK_OPTIONS}}</select>
    </label>
    <label>Duration (minutes)
      <input id="id_duration_minutes" name="duration_minutes" type="number" min="0" value="{{DURATION}}" />
    </label>
    <label>Effort (1-10)
      <input id="id_effort_level" name="effort_level" type="range" min="1" max="10" value="{{EFFORT}}" />
    </label>
    <label>Impact (1-5)
      <input id="id_impact_level" name="impact_level" type="range" min="1" max="5" value="{{IMPACT}}" />
    </label>
    <label>Fear factor
      <input id="id_fear_factor" name="fear_factor" type="range" min="1" max="2" step="0.1" value="{{FEAR}}" />
    </label>
    <button type="submit">Preview</button>
    <div class="preview">
      <span id="computed-rank-preview">{{COMPUTED}}</span>
      <strong id="xp-distribution-preview" style="color: {{COLOR}}">{{SPLIT}}</strong>
    </div>
  </form>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::compute_score;

    #[test]
    fn split_summary_lists_each_stat() {
        let split = vec![
            XpShare {
                stat: "STR".into(),
                amount: 900,
            },
            XpShare {
                stat: "INT".into(),
                amount: 600,
            },
        ];
        assert_eq!(split_summary(&split), "STR: 900 XP, INT: 600 XP");
    }

    #[test]
    fn page_marks_manual_override() {
        let stats = vec!["STR".to_string(), "INT".to_string()];
        let input = ScoreInput {
            manual_rank: Some(Rank::B),
            ..ScoreInput::default()
        };
        let html = render_index(&input, &compute_score(&input), &stats);
        assert!(html.contains("E-Rank (Score: 6.2)") || html.contains("E-Rank (Score: 6.3)"));
        assert!(html.contains("STR: 150 XP"));
        assert!(html.contains(MANUAL_COLOR));
        assert!(html.contains(r#"<option value="B" selected>"#));
    }

    #[test]
    fn stat_names_are_escaped() {
        let stats = vec!["<b>".to_string()];
        let options = stat_options(&stats, None, false);
        assert!(options.contains("&lt;b&gt;"));
        assert!(!options.contains("<b>"));
    }
}
