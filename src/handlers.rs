use crate::errors::AppError;
use crate::models::{PreviewQuery, PreviewRequest, PreviewResponse, RankRow};
use crate::scoring::{Rank, ScoreInput, compute_score};
use crate::state::AppState;
use crate::ui::{render_index, split_summary};
use axum::{
    Json,
    extract::{Query, State},
    response::Html,
};
use tracing::debug;

pub async fn index(State(state): State<AppState>, Query(query): Query<PreviewQuery>) -> Html<String> {
    let input = query.to_input();
    let result = compute_score(&input);
    Html(render_index(&input, &result, &state.stats))
}

pub async fn preview(Json(payload): Json<PreviewRequest>) -> Result<Json<PreviewResponse>, AppError> {
    let input = payload.into_input()?;
    Ok(Json(to_response(&input)))
}

pub async fn ranks() -> Json<Vec<RankRow>> {
    let rows = Rank::ALL
        .into_iter()
        .map(|rank| RankRow {
            rank,
            label: rank.label().to_string(),
            xp: rank.xp(),
            min_score_exclusive: rank.min_score_exclusive(),
        })
        .collect();
    Json(rows)
}

fn to_response(input: &ScoreInput) -> PreviewResponse {
    let result = compute_score(input);
    debug!(
        "preview score {:.2} -> {} (final {})",
        result.total_score, result.computed_rank, result.final_rank
    );

    PreviewResponse {
        computed_rank: result.computed_rank,
        total_score: result.total_score,
        final_rank: result.final_rank,
        is_manual: input.manual_rank.is_some(),
        xp_total: result.xp_total(),
        summary: split_summary(&result.xp_split),
        xp_split: result.xp_split,
    }
}
