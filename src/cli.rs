use anyhow::{Context, Result, anyhow};
use pico_args::Arguments;
use std::{
    env, fs,
    io::{self, Write},
    path::PathBuf,
};

use touchzoom::config::{ConfigStore, Profile};
use touchzoom::geometry::Rect;
use touchzoom::pipeline::{self, DEFAULT_FRAME_MS};
use touchzoom::transform::fit_center_rect;

use crate::logging;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // already applied by logging::init
    let debug = pargs.contains("--debug");

    match pargs.subcommand()?.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.opt_free_from_str()?;
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("replay") => {
            let config: Option<PathBuf> = pargs.opt_value_from_str("--config")?;
            let profile_name: Option<String> = pargs.opt_value_from_str("--profile")?;
            let frame_ms: u64 = pargs
                .opt_value_from_str("--frame-ms")?
                .unwrap_or(DEFAULT_FRAME_MS);
            let trace_path: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: touchzoom replay <trace.jsonl> [options]"))?;
            finish(pargs)?;

            if frame_ms == 0 {
                return Err(anyhow!("--frame-ms must be positive"));
            }
            let profile = match (config, profile_name) {
                (Some(path), _) => Profile::load_path(&path)?,
                (None, Some(name)) => ConfigStore::load_or_install_default()?.load_profile(&name)?,
                (None, None) => ConfigStore::load_or_install_default()?.profile,
            };
            if debug || profile.responder.debug {
                logging::enable_debug();
            }

            let text = fs::read_to_string(&trace_path)
                .with_context(|| format!("failed to read {}", trace_path.display()))?;
            let trace = pipeline::parse_trace(&text)
                .with_context(|| format!("bad trace {}", trace_path.display()))?;
            log::info!(
                "replaying {} samples from {} ({} ms frames)",
                trace.len(),
                trace_path.display(),
                frame_ms
            );
            let events = pipeline::replay(&profile, &trace, frame_ms)?;

            let stdout = io::stdout();
            let mut out = stdout.lock();
            for ev in &events {
                writeln!(out, "{}", serde_json::to_string(ev)?)?;
            }
            Ok(())
        }

        Some("list") => {
            finish(pargs)?;
            let store = ConfigStore::load_or_install_default()?;
            for name in store.list_profiles() {
                let mark = if name == store.active_name { "*" } else { " " };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: touchzoom use <profile_name>"))?;
            finish(pargs)?;
            let mut store = ConfigStore::load_or_install_default()?;
            store.set_active(&name)?;
            println!("active profile: {name}");
            Ok(())
        }

        Some("show") => {
            finish(pargs)?;
            let store = ConfigStore::load_or_install_default()?;
            print_response(&serde_json::json!({
                "active": store.active_name,
                "profiles_dir": store.profiles_dir,
                "profile": store.profile,
            }));
            Ok(())
        }

        Some("fit") => {
            let usage = || anyhow!("usage: touchzoom fit <aspect> <width> <height>");
            let aspect: f64 = pargs.free_from_str().map_err(|_| usage())?;
            let width: f64 = pargs.free_from_str().map_err(|_| usage())?;
            let height: f64 = pargs.free_from_str().map_err(|_| usage())?;
            finish(pargs)?;
            if !(aspect > 0.0 && width > 0.0 && height > 0.0) {
                return Err(anyhow!("aspect, width and height must be positive"));
            }
            let rect = fit_center_rect(aspect, &Rect::from_size(width, height));
            print_response(&serde_json::to_value(rect)?);
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn finish(pargs: Arguments) -> Result<()> {
    let rest = pargs.finish();
    if rest.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("unexpected arguments: {rest:?}"))
    }
}

fn print_help() {
    println!(
        r#"touchzoom - gesture recognition and zoom/pan view transforms

USAGE:
  touchzoom <command> [args]

COMMANDS:
  replay <trace.jsonl> [options]    Run a touch trace through the recognizer and print
                                    gesture and view events as JSON lines
      --config <file>               Use this profile file instead of the active profile
      --profile <name>              Use a named profile from the profiles directory
      --frame-ms <n>                Animation frame interval (default 16)
      --debug                       Log every responder transition
  list                              List profiles; '*' marks the active one
  use <name>                        Switch the active profile
  show                              Print the active profile as JSON
  fit <aspect> <width> <height>     Largest centered rect of <aspect> inside the box
  help [command]                    Show help

TIPS:
  - Profiles: ~/.config/touchzoom/profiles
  - Active profile pointer: ~/.config/touchzoom/active
  - RUST_LOG overrides the log level
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "replay" => println!(
            "usage: touchzoom replay <trace.jsonl> [--config <file>] [--profile <name>] \
             [--frame-ms <n>] [--debug]\n\
             Replays a JSON-lines touch trace and prints one event per line."
        ),
        "list" => {
            println!("usage: touchzoom list\nLists available profiles; marks active with '*'.")
        }
        "use" => println!("usage: touchzoom use <name>\nSwitches the active profile to <name>."),
        "show" => println!("usage: touchzoom show\nPrints the active profile as JSON."),
        "fit" => println!(
            "usage: touchzoom fit <aspect> <width> <height>\n\
             Prints the largest rect of the given aspect ratio centered in the box."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
