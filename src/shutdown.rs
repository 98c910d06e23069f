use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bevy::prelude::{info, warn, App, AppExit, EventWriter, Plugin, Res, Resource, Update};

/// Set from outside the app (signal handler, stdin watcher) to request a clean exit.
#[derive(Clone, Default, Resource)]
pub struct ShutdownFlag(pub Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn exit_on_shutdown_request(flag: Res<ShutdownFlag>, mut exit: EventWriter<AppExit>) {
    if flag.is_requested() {
        exit.write(AppExit::Success);
    }
}

fn watch_stdin(flag: ShutdownFlag) {
    std::thread::spawn(move || {
        use std::io::Read;
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 1];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => {
                    info!("stdin closed, requesting shutdown");
                    flag.request();
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });
}

pub struct ShutdownPlugin {
    /// Only sensible when something upstream owns our stdin, as in headless runs.
    pub watch_stdin: bool,
}

impl Plugin for ShutdownPlugin {
    fn build(&self, app: &mut App) {
        let flag = ShutdownFlag::default();
        {
            let f = flag.clone();
            if let Err(e) = ctrlc::set_handler(move || f.request()) {
                warn!("could not install Ctrl+C handler: {e}");
            }
        }
        if self.watch_stdin {
            watch_stdin(flag.clone());
        }
        app.insert_resource(flag).add_systems(Update, exit_on_shutdown_request);
    }
}
