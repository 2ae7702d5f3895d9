use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::quizzes::QuizApiError;
use crate::{
    extractors::ClientContext,
    models::timer::{TimeExpired, TimerEvent, TimerTick},
    services::AppState,
    utils::time::now_millis,
};

/// SSE countdown for the current quiz
/// GET /api/v1/quizzes/current/stream
pub async fn quiz_timer_stream(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
) -> Result<impl IntoResponse, QuizApiError> {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    let session = manager
        .current_quiz()
        .await
        .ok_or_else(|| QuizApiError::not_found("No current quiz"))?;

    if session.is_completed() {
        return Err(QuizApiError::conflict("Quiz is already completed"));
    }
    let remaining = session
        .remaining_seconds(now_millis())
        .ok_or_else(|| QuizApiError::conflict("Quiz has not been started"))?;

    let total = session.time_limit;
    let elapsed = total.saturating_sub(remaining);
    let stop_at = elapsed.saturating_add(max_stream_duration_seconds());
    let tick_interval = tick_interval_ms();
    tracing::info!(
        "Starting timer stream: quiz={}, elapsed={}s, total={}s, tick_interval={}ms",
        session.id,
        elapsed,
        total,
        tick_interval
    );

    let stream = create_timer_stream(session.id, elapsed, total, stop_at, tick_interval);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn max_stream_duration_seconds() -> u32 {
    std::env::var("SSE_MAX_STREAM_SECONDS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(3600)
}

fn tick_interval_ms() -> u64 {
    std::env::var("SSE_TICK_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(1000)
}

fn create_timer_stream(
    quiz_id: String,
    elapsed: u32,
    total: u32,
    stop_at: u32,
    tick_interval_ms: u64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    timer_events(quiz_id, elapsed, total, stop_at, tick_interval_ms).map(|timer_event| {
        Ok(Event::default()
            .event(timer_event.event_name())
            .data(timer_event.to_sse_data()))
    })
}

/// Ticks once per interval from `elapsed` towards `total`.
///
/// Reaching `total` emits a single expiry event. Reaching `stop_at` first closes the
/// stream quietly; the client reconnects for the rest of the countdown.
fn timer_events(
    quiz_id: String,
    elapsed: u32,
    total: u32,
    stop_at: u32,
    tick_interval_ms: u64,
) -> impl Stream<Item = TimerEvent> {
    stream::unfold(
        (quiz_id, elapsed, false),
        move |(quiz_id, elapsed, finished)| async move {
            if finished {
                return None;
            }

            if elapsed >= total {
                tracing::info!("Timer expired: quiz={}", quiz_id);
                let expired_event = TimerEvent::TimeExpired(TimeExpired {
                    quiz_id: quiz_id.clone(),
                    timestamp: Utc::now(),
                    message: "Time limit exceeded".to_string(),
                });
                return Some((expired_event, (quiz_id, elapsed, true)));
            }

            if elapsed >= stop_at {
                tracing::info!(
                    "Timer stream reached its duration cap: quiz={}, remaining={}s",
                    quiz_id,
                    total - elapsed
                );
                return None;
            }

            let tick_event = TimerEvent::TimerTick(TimerTick {
                quiz_id: quiz_id.clone(),
                remaining_seconds: total - elapsed,
                elapsed_seconds: elapsed,
                total_seconds: total,
                timestamp: Utc::now(),
            });

            sleep(Duration::from_millis(tick_interval_ms)).await;

            Some((tick_event, (quiz_id, elapsed + 1, false)))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timer_stream_ends_with_expiry() {
        let events: Vec<_> = create_timer_stream("quiz-1".to_string(), 1, 3, u32::MAX, 1)
            .collect()
            .await;
        // ticks at elapsed 1 and 2, then expiry
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_timer_stream_already_expired() {
        let events: Vec<_> = timer_events("quiz-1".to_string(), 5, 5, 5, 1)
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], TimerEvent::TimeExpired(_)));
    }

    #[tokio::test]
    async fn test_duration_cap_closes_without_expiry() {
        let events: Vec<_> = timer_events("quiz-1".to_string(), 0, 7200, 3, 1)
            .collect()
            .await;

        let ticks: Vec<&TimerTick> = events
            .iter()
            .filter_map(|event| match event {
                TimerEvent::TimerTick(tick) => Some(tick),
                TimerEvent::TimeExpired(_) => None,
            })
            .collect();
        assert_eq!(events.len(), 3);
        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[0].remaining_seconds, 7200);
        assert!(ticks.iter().all(|tick| tick.total_seconds == 7200));
        assert_eq!(ticks[2].remaining_seconds, 7198);
    }
}
