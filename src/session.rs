//! One round driven by a line-based input stream

use tokio::io::AsyncBufRead;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::game::{GameMatch, MatchEvent, RoundResult};
use crate::input::InputSource;

/// Feed `reader` into the match and wait for the round to end.
///
/// The reader runs on its own task. Reaching the end of input does not end
/// the round: queued commands, flights and timers keep going until a
/// combatant runs out of health.
pub async fn play<R>(game: &GameMatch, input: InputSource, reader: R) -> Option<RoundResult>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let mut events = game.subscribe_events();
    let reading = tokio::spawn(async move {
        match input.run(reader).await {
            Ok(()) => info!("Input closed, waiting for the round to finish"),
            Err(err) => warn!(error = %err, "Input stream failed"),
        }
    });

    let result = round_over(&mut events).await;
    reading.abort();
    result
}

/// Wait for the round result, logging strikes along the way
async fn round_over(events: &mut broadcast::Receiver<MatchEvent>) -> Option<RoundResult> {
    loop {
        match events.recv().await {
            Ok(MatchEvent::RoundOver(result)) => return Some(result),
            Ok(MatchEvent::Struck { target, health }) => {
                debug!(%target, health, "strike observed");
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Match event receiver lagged");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::command::tests::RecordingAudio;
    use crate::game::grid::tests::RecordingRenderer;
    use crate::game::PlayerSlot;
    use crate::input::KeyBindings;
    use crate::util::rate_limit::IntentThrottle;
    use std::sync::Arc;
    use std::time::Duration;

    /// Combatants spawn touching, so every kick lands
    fn toe_to_toe() -> Arc<GameMatch> {
        let config = Config {
            arena_width: 4,
            arena_height: 6,
            character_width: 2,
            character_height: 3,
            spawn_offset: 0,
            jump_height: 2,
            ..Config::default()
        };
        GameMatch::new(
            &config,
            Arc::new(RecordingRenderer::default()),
            Arc::new(RecordingAudio::default()),
        )
        .unwrap()
    }

    fn source(game: &GameMatch) -> InputSource {
        InputSource::new(KeyBindings::standard(), IntentThrottle::new(20), game.bus())
    }

    #[tokio::test(start_paused = true)]
    async fn piped_kicks_play_out_to_a_result() {
        let game = toe_to_toe();
        let input: &'static [u8] = "Space\n".repeat(10).leak().as_bytes();

        let session = play(&game, source(&game), input);
        let result = tokio::time::timeout(Duration::from_secs(30), session)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.winner, "Zhenia");
        assert_eq!(result.loser, "Dino");
        assert!(game.is_over());
    }

    #[tokio::test(start_paused = true)]
    async fn commands_keep_running_after_input_ends() {
        let game = toe_to_toe();
        let input: &'static [u8] = b"ArrowUp\n";

        // no result is coming, so the round keeps waiting
        let session = play(&game, source(&game), input);
        let waited = tokio::time::timeout(Duration::from_secs(5), session).await;
        assert!(waited.is_err());

        let history = game.executor(PlayerSlot::One).history();
        assert!(history.iter().any(|record| record.name == "jump"));
        assert_eq!(
            game.combatant(PlayerSlot::One).bounds().map(|b| b.min_y),
            Some(0)
        );
    }
}
