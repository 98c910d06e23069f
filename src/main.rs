use std::time::Duration;

use bevy::{
    app::ScheduleRunnerPlugin,
    color::Color,
    log::{Level, LogPlugin},
    prelude::{default, App, ClearColor, DefaultPlugins, PluginGroup, Window},
    window::{ExitCondition, WindowPlugin},
    winit::WinitPlugin,
};

use bowling_chase::{
    autoplay::AutoplayPlugin,
    ball::BallPlugin,
    camera::{CameraPlugin, ChaseGizmosPlugin},
    setup::SetupPlugin,
    shutdown::ShutdownPlugin,
    tuning::TuningPlugin,
};

fn main() {
    let headless = std::env::var("HEADLESS").ok().is_some();
    let physics_debug = std::env::var("PHYSICS_DEBUG").ok().is_some();

    let mut app = App::new();
    app.insert_resource(ClearColor(Color::srgba(0.08, 0.09, 0.11, 1.0)));

    let log = LogPlugin {
        level: Level::INFO,
        filter: "wgpu=error,naga=warn,bevy_render=warn".into(),
        ..default()
    };

    if headless {
        // No window and no event loop; the schedule runner drives frames at 60 Hz.
        app.add_plugins(
            DefaultPlugins
                .set(log)
                .set(WindowPlugin {
                    primary_window: None,
                    exit_condition: ExitCondition::DontExit,
                    ..default()
                })
                .disable::<WinitPlugin>(),
        );
        app.add_plugins(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(1.0 / 60.0)));
        app.add_plugins(AutoplayPlugin::from_env());
    } else {
        app.add_plugins(DefaultPlugins.set(log).set(WindowPlugin {
            primary_window: Some(Window { title: "bowling-chase".into(), ..default() }),
            ..default()
        }));
        app.add_plugins(ChaseGizmosPlugin);
    }

    app.add_plugins((
        SetupPlugin { physics_debug },
        BallPlugin,
        CameraPlugin,
        TuningPlugin::from_env(),
        ShutdownPlugin { watch_stdin: headless },
    ));

    app.run();
}
