//! Randomized transport sequences

mod common;

use cadence_playback::RepeatMode;
use common::*;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Command {
    Next,
    Prev,
    CycleRepeat,
    Shuffle,
}

fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::Next),
        Just(Command::Prev),
        Just(Command::CycleRepeat),
        Just(Command::Shuffle),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn explicit_skip_never_leaves_repeat_one(
        commands in prop::collection::vec(command(), 1..12),
        start in 0usize..4,
    ) {
        let h = Harness::new();
        h.controller
            .play_playlist(playlist("p", &["a", "b", "c", "d"]), start)
            .unwrap();

        for command in commands {
            match command {
                Command::Next | Command::Prev => {
                    match command {
                        Command::Next => h.controller.next().unwrap(),
                        _ => h.controller.prev().unwrap(),
                    }
                    let state = h.controller.snapshot();
                    prop_assert_ne!(state.repeat_mode, RepeatMode::RepeatOne);
                    let playlist = state.current_playlist.clone().unwrap();
                    prop_assert!(state.current_index < playlist.len());
                    prop_assert_eq!(
                        &state.current_track.unwrap().id,
                        &playlist.tracks[state.current_index].id
                    );
                }
                Command::CycleRepeat => {
                    h.controller.cycle_repeat_mode();
                }
                Command::Shuffle => {
                    h.controller.shuffle().unwrap();
                }
            }
        }

        prop_assert!(!h.controller.snapshot().having_ad);
    }
}
