//! Player composition against the in-memory backend

use std::sync::Arc;

use futures::future::join_all;
use kinetic_core::playback::{MediaEvent, TransportNotification};
use kinetic_core::readiness::{ReadinessController, ReadinessState};
use kinetic_core::testing::RecordingMediaElement;
use kinetic_core::{ApiEndpoints, KineticConfig, MediaReference, Transport, VideoPlayer};
use kinetic_sim::SimulatedTranscodeBackend;

fn player_on(backend: Arc<SimulatedTranscodeBackend>) -> (VideoPlayer, RecordingMediaElement) {
    let config = KineticConfig::for_testing();
    let controller = ReadinessController::new(
        backend,
        ApiEndpoints::new(&config.api.base_url),
        config.readiness,
    );

    let element = RecordingMediaElement::new();
    let mut transport = Transport::new();
    transport.mount(Box::new(element.clone()));
    (VideoPlayer::new(controller, transport), element)
}

#[tokio::test]
async fn test_transcoded_exercise_plays_to_completion() {
    let backend = Arc::new(SimulatedTranscodeBackend::with_demo_library());
    let (player, element) = player_on(backend);
    let mut player = player.with_autoplay(true);

    let mut notifications = player.transport_mut().notifications();
    player
        .transport_mut()
        .bind_exercise(Some("squat".to_string()));
    player.load(Some(&MediaReference::from_path("exercises/squat.mkv")));
    assert_eq!(element.state().loads, 0);

    let (status, attached) = player.wait_until_playable().await;
    assert_eq!(status.state, ReadinessState::Ready);
    assert!(attached);
    assert!(player.transport().session().playing);
    assert_eq!(
        element.state().source.as_deref(),
        Some("http://localhost:8000/api/videos/stream/exercises/squat.mkv")
    );

    element.emit(MediaEvent::LoadedMetadata { duration: 30.0 });
    element.emit(MediaEvent::TimeUpdate { current_time: 30.0 });
    element.emit(MediaEvent::Ended);
    assert_eq!(player.transport_mut().pump_events(), 3);

    assert_eq!(
        notifications.recv().await,
        Some(TransportNotification::Progress {
            current_time: 30.0,
            duration: 30.0
        })
    );
    assert_eq!(
        notifications.recv().await,
        Some(TransportNotification::Completed)
    );
    assert_eq!(
        notifications.recv().await,
        Some(TransportNotification::ExerciseCompleted {
            exercise_id: "squat".to_string()
        })
    );
    assert!(!player.transport().session().playing);
}

#[tokio::test]
async fn test_switching_reference_mid_transcode_ignores_old_asset() {
    let backend = Arc::new(SimulatedTranscodeBackend::new());
    backend.register_transcode("slow.mkv", 1_000);
    backend.register_direct("quick.mp4");
    let (mut player, element) = player_on(backend.clone());

    player.load(Some(&MediaReference::from_path("slow.mkv")));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(player.readiness().state, ReadinessState::Transcoding);

    player.load(Some(&MediaReference::from_path("quick.mp4")));
    let (status, attached) = player.wait_until_playable().await;
    assert_eq!(status.state, ReadinessState::Ready);
    assert!(attached);
    assert_eq!(
        player.attached_source(),
        Some("http://localhost:8000/api/videos/stream/quick.mp4")
    );

    let checks_after_switch = backend.job("slow.mkv").unwrap().status_checks;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(
        backend.job("slow.mkv").unwrap().status_checks,
        checks_after_switch
    );
    assert_eq!(element.state().loads, 1);
}

#[tokio::test]
async fn test_players_are_independent() {
    let backend = Arc::new(SimulatedTranscodeBackend::new());
    backend.register_transcode("a.mkv", 1);
    backend.register_transcode("b.mkv", 3);
    backend.register("c.mov", kinetic_sim::AssetProfile::Failing { status: 502 });

    let mut players: Vec<_> = ["a.mkv", "b.mkv", "c.mov"]
        .into_iter()
        .map(|asset| {
            let (mut player, element) = player_on(backend.clone());
            player.load(Some(&MediaReference::from_path(asset)));
            (player, element)
        })
        .collect();

    let results = join_all(
        players
            .iter_mut()
            .map(|(player, _)| player.wait_until_playable()),
    )
    .await;

    let states: Vec<_> = results.iter().map(|(status, _)| status.state).collect();
    assert_eq!(
        states,
        vec![
            ReadinessState::Ready,
            ReadinessState::Ready,
            ReadinessState::Unknown
        ]
    );
    assert_eq!(results[0].0.attempts, 1);
    assert_eq!(results[1].0.attempts, 3);
    assert!(results.iter().all(|(_, attached)| *attached));
    assert!(players.iter().all(|(_, element)| element.state().loads == 1));
}
