//! Builds the text we send to the embedding model for each golf ball.
//! Only the visually identifying attributes go in; the rest stay filterable fields.

use crate::record::GolfBall;

/// Canonical embedding input for a record. Deterministic, so re-embedding the
/// same record always sends the same text.
pub fn embedding_text(ball: &GolfBall) -> String {
    format!(
        "Manufacturer: {}, Pole Marking: {}, Color: {}, Seam Marking: {}",
        ball.manufacturer, ball.pole_marking, ball.colour, ball.seam_marking
    )
}

/// Embedding inputs for a batch, in the same order as `balls`.
pub fn embedding_texts(balls: &[GolfBall]) -> Vec<String> {
    balls.iter().map(embedding_text).collect()
}
