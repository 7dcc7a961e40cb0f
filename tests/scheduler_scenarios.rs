// Integration tests for the music scheduler
// These drive the public API with silent channels and recording controllers

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use zone_music::{
    ChannelProbe, Clip, EventBus, Handoff, MusicController, MusicCue, MusicEvent, MusicPlayer,
    OutputChannel, PlayerConfig, SilentChannel,
};

type HookLog = Arc<Mutex<Vec<String>>>;

/// Controller that records activations and plays one clip
struct Zone {
    name: String,
    importance: u8,
    clip: Clip,
    log: HookLog,
}

impl MusicController for Zone {
    fn name(&self) -> &str {
        &self.name
    }

    fn importance(&self) -> u8 {
        self.importance
    }

    fn activate(&self, player: &mut MusicPlayer) {
        self.log.lock().push(format!("+{}", self.name));
        player.play(Some(self.clip.clone()));
    }

    fn deactivate(&self, _player: &mut MusicPlayer) -> Handoff {
        self.log.lock().push(format!("-{}", self.name));
        Handoff::Cut
    }
}

fn zone(name: &str, importance: u8, log: &HookLog) -> Arc<dyn MusicController> {
    Arc::new(Zone {
        name: name.to_string(),
        importance,
        clip: Clip::new(format!("{name}.ogg")),
        log: Arc::clone(log),
    })
}

fn player_with_probes() -> (MusicPlayer, [ChannelProbe; 2]) {
    let (channels, probes) = SilentChannel::pair();
    (MusicPlayer::new(channels, &PlayerConfig::default()), probes)
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[test]
fn test_scenario_a_priority_takeover_order() {
    let log = HookLog::default();
    let (mut player, _probes) = player_with_probes();
    let c1 = zone("c1", 5, &log);
    let c2 = zone("c2", 10, &log);

    player.register(&c1);
    assert_eq!(*log.lock(), vec!["+c1"]);

    player.register(&c2);
    assert_eq!(*log.lock(), vec!["+c1", "-c1", "+c2"]);
}

#[test]
fn test_scenario_b_crossfade_ramp() {
    let (mut player, _probes) = player_with_probes();
    player.play(Some(Clip::new("A")));
    player.advance(0.5);
    assert!(approx(player.engine().active_volume(), 0.5));

    player.play_with_transition(Some(Clip::new("B")), 2.0);
    // First tick's worth is applied when the crossfade starts
    assert!(approx(player.engine().active_volume(), 0.125));
    assert!(approx(player.engine().outgoing_volume(), 0.375));
    assert_eq!(player.engine().outgoing_clip(), Some(&Clip::new("A")));

    for _ in 0..3 {
        player.advance(0.5);
    }
    assert!(approx(player.engine().active_volume(), 0.5));
    assert_eq!(player.engine().outgoing_clip(), None);
    assert!(!player.engine().is_transitioning());
}

#[test]
fn test_scenario_c_sole_candidate_removed_stops() {
    let log = HookLog::default();
    let (mut player, probes) = player_with_probes();
    let only = zone("only", 3, &log);

    player.register(&only);
    assert!(player.is_playing());

    player.unregister(&only);
    assert_eq!(player.engine().active_clip(), None);
    assert_eq!(player.engine().outgoing_clip(), None);
    assert!(probes.iter().all(|p| !p.is_playing()));
}

#[test]
fn test_scenario_d_double_registration() {
    let log = HookLog::default();
    let (mut player, _probes) = player_with_probes();
    let head = zone("head", 7, &log);
    let tail = zone("tail", 1, &log);

    player.register(&head);
    player.register(&tail);
    player.register(&head);
    player.register(&tail);

    assert_eq!(player.queue_len(), 2);
    assert_eq!(*log.lock(), vec!["+head"]);
}

#[test]
fn test_queue_order_and_hook_alternation_hold_under_random_traffic() {
    let log = HookLog::default();
    let (mut player, _probes) = player_with_probes();
    let zones: Vec<Arc<dyn MusicController>> = (0..8)
        .map(|i| zone(&format!("z{i}"), (i % 4) as u8, &log))
        .collect();
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..500 {
        let pick = &zones[rng.gen_range(0..zones.len())];
        if rng.gen_bool(0.6) {
            player.register(pick);
        } else {
            player.unregister(pick);
        }

        let importances = player.queue_importances();
        assert!(importances.windows(2).all(|w| w[0] >= w[1]));

        let head = player.queue_names().first().map(|n| n.to_string());
        assert_eq!(player.active_name(), head);
    }

    // Per controller, hooks strictly alternate starting with an activation
    for z in &zones {
        let calls: Vec<char> = log
            .lock()
            .iter()
            .filter(|entry| &entry[1..] == z.name())
            .filter_map(|entry| entry.chars().next())
            .collect();
        for (i, call) in calls.iter().enumerate() {
            let expected = if i % 2 == 0 { '+' } else { '-' };
            assert_eq!(*call, expected, "{} hook order broken: {:?}", z.name(), calls);
        }
    }
}

#[test]
fn test_play_immediate_twice_changes_state_once() {
    let bus = EventBus::new();
    let (rx, _id) = bus.subscribe();
    let (channels, probes) = SilentChannel::pair();
    let mut player = MusicPlayer::new(channels, &PlayerConfig::default()).with_events(bus);

    player.play(Some(Clip::new("theme")));
    player.play(Some(Clip::new("theme")));

    let started = rx
        .try_iter()
        .filter(|e| matches!(e, MusicEvent::ClipStarted { .. }))
        .count();
    assert_eq!(started, 1);
    let starts: usize = probes.iter().map(|p| p.state().starts).sum();
    assert_eq!(starts, 1);
}

#[test]
fn test_mute_round_trip_resumes_loaded_clip() {
    let (mut player, _probes) = player_with_probes();
    player.play(Some(Clip::new("theme")));

    player.set_volume(0.0);
    assert!(!player.is_playing());

    player.set_volume(0.8);
    assert!(player.is_playing());
    assert!(approx(player.engine().active_volume(), 0.8));
    assert_eq!(player.engine().active_clip(), Some(&Clip::new("theme")));
}

#[test]
fn test_crossfade_sum_never_exceeds_twice_target() {
    let log = HookLog::default();
    let (mut player, _probes) = player_with_probes();
    let town: Arc<dyn MusicController> = Arc::new(MusicCue::loop_fade("town", 1, Clip::new("t"), 0.7));
    let cave: Arc<dyn MusicController> = Arc::new(MusicCue::loop_fade("cave", 5, Clip::new("c"), 1.1));
    let boss = zone("boss", 9, &log);

    player.register(&town);
    for step in 0..400 {
        match step {
            30 => player.register(&cave),
            45 => player.register(&boss),
            50 => player.unregister(&boss),
            120 => player.unregister(&cave),
            _ => {}
        }
        player.advance(1.0 / 60.0);
        let engine = player.engine();
        assert!(engine.active_volume() <= engine.target_volume() + 1e-5);
        assert!(engine.active_volume() + engine.outgoing_volume() <= 2.0 * engine.target_volume() + 1e-5);
    }
    assert_eq!(player.active_name().as_deref(), Some("town"));
}

/// Registers a sidekick controller from inside its own activation
struct Summoner {
    sidekick: Arc<dyn MusicController>,
    log: HookLog,
}

impl MusicController for Summoner {
    fn name(&self) -> &str {
        "summoner"
    }

    fn importance(&self) -> u8 {
        5
    }

    fn activate(&self, player: &mut MusicPlayer) {
        self.log.lock().push("+summoner".to_string());
        player.register(&self.sidekick);
        // Lost priority to the sidekick: none of these may reach the output
        player.play(Some(Clip::new("summoner.ogg")));
        player.play_with_transition(Some(Clip::new("summoner.ogg")), 1.0);
        player.request_fade_out(1.0);
        player.stop();
    }

    fn deactivate(&self, _player: &mut MusicPlayer) -> Handoff {
        self.log.lock().push("-summoner".to_string());
        Handoff::Cut
    }
}

#[test]
fn test_reentrant_registration_from_hook() {
    let log = HookLog::default();
    let (mut player, _probes) = player_with_probes();
    let sidekick = zone("sidekick", 8, &log);
    let summoner: Arc<dyn MusicController> = Arc::new(Summoner {
        sidekick: Arc::clone(&sidekick),
        log: Arc::clone(&log),
    });

    player.register(&summoner);
    assert_eq!(*log.lock(), vec!["+summoner", "-summoner", "+sidekick"]);
    assert_eq!(player.queue_names(), vec!["sidekick", "summoner"]);
    assert_eq!(player.active_name().as_deref(), Some("sidekick"));
    assert_eq!(player.engine().active_clip(), Some(&Clip::new("sidekick.ogg")));
    assert!(!player.engine().is_transitioning());
    assert!(player.is_playing());
}

#[test]
fn test_stale_head_skipped_on_removal() {
    let log = HookLog::default();
    let (mut player, _probes) = player_with_probes();
    let boss = zone("boss", 9, &log);
    let ghost = zone("ghost", 6, &log);
    let town = zone("town", 2, &log);

    player.register(&boss);
    player.register(&ghost);
    player.register(&town);
    drop(ghost);

    player.unregister(&boss);
    assert_eq!(player.active_name().as_deref(), Some("town"));
    assert_eq!(player.engine().active_clip(), Some(&Clip::new("town.ogg")));
}

#[test]
fn test_misconfigured_output_still_schedules() {
    let log = HookLog::default();
    let (channel, _probe) = SilentChannel::new();
    let channels: Vec<Box<dyn OutputChannel>> = vec![Box::new(channel)];
    let mut player = MusicPlayer::new(channels, &PlayerConfig::default());
    let town = zone("town", 1, &log);

    player.register(&town);
    assert!(!player.engine().is_enabled());
    assert_eq!(*log.lock(), vec!["+town"]);
    assert!(!player.is_playing());
}

#[test]
fn test_shared_player_across_threads() {
    let (channels, _probes) = SilentChannel::pair();
    let shared = MusicPlayer::new(channels, &PlayerConfig::default()).into_shared();
    let town: Arc<dyn MusicController> = Arc::new(MusicCue::looped("town", 1, Clip::new("town")));

    let handle = {
        let shared = Arc::clone(&shared);
        std::thread::spawn(move || {
            for _ in 0..10 {
                shared.lock().advance(1.0 / 60.0);
            }
        })
    };
    shared.lock().register(&town);
    handle.join().unwrap();

    assert_eq!(shared.lock().active_name().as_deref(), Some("town"));
}
