//! gesture_player: interactive entry point.

use clap::Parser;
use log::error;

use gesture_player::app::run;
use gesture_player::config::AppConfig;
use gesture_player::Cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Gesture Player: Hand-Gesture Music Control          ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let cfg = match AppConfig::load(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    println!("  Source: {}   Songs: {}", cfg.source.kind.name(), cfg.playlist.dir.display());
    #[cfg(not(feature = "leap"))]
    println!("  (build with --features leap for LeapMotion hardware)");
    println!();
    println!("  Wave left (right hand)        → Next song");
    println!("  Wave right (left hand)        → Previous song");
    println!("  Pinch (right hand)            → Volume");
    println!("  OK sign (thumb + index touch) → Play / Pause");
    println!("  Q                             → Quit");
    println!();

    if let Err(e) = run(cfg) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
