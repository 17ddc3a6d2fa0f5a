use anyhow::{bail, Result};
use clap::Parser;
use murmur::config::{MAX_SPEED, MIN_SPEED};
use murmur::{EngineConfig, SpeechEngine};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Speak text aloud with a Kokoro neural voice
///
/// Without TEXT, lines are read from stdin. Commands:
/// :pause  :resume  :stop  :voice NAME  :speed X  :voices  :quit
#[derive(Parser, Debug)]
#[command(name = "murmur", version)]
struct Args {
    /// JSON engine configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Kokoro model directory
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Voice display name or code (e.g. af_heart)
    #[arg(long)]
    voice: Option<String>,

    /// Speed multiplier
    #[arg(long, value_parser = parse_speed)]
    speed: Option<f32>,

    /// Write speech to a WAV file instead of playing it
    #[arg(long)]
    export: Option<PathBuf>,

    /// Do not open an audio device
    #[arg(long)]
    silent: bool,

    /// Print the available voices and exit
    #[arg(long)]
    list_voices: bool,

    /// Text to speak
    text: Vec<String>,
}

fn parse_speed(raw: &str) -> std::result::Result<f32, String> {
    let speed: f32 = raw.parse().map_err(|_| format!("not a number: {}", raw))?;
    if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(format!("must be between {} and {}", MIN_SPEED, MAX_SPEED));
    }
    Ok(speed)
}

fn select_voice(engine: &SpeechEngine, wanted: &str) -> bool {
    engine.set_voice(wanted) || engine.set_voice_by_code(wanted)
}

fn print_voices(engine: &SpeechEngine) {
    let current = engine.current_voice().map(|v| v.code);
    for voice in engine.available_voices() {
        let marker = if current.as_deref() == Some(voice.code.as_str()) { "*" } else { " " };
        println!("{} {:<12} {}", marker, voice.code, voice);
    }
}

fn interactive(engine: &SpeechEngine, mut speed: f32) -> Result<()> {
    let stdin = io::stdin();
    print!("> ");
    io::stdout().flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "" => {}
            ":quit" | ":q" => break,
            ":pause" | ":p" => {
                if !engine.pause() {
                    println!("nothing is playing");
                }
            }
            ":resume" | ":r" => {
                if !engine.resume() {
                    println!("not paused");
                }
            }
            ":stop" | ":s" => engine.stop(),
            ":voices" => print_voices(engine),
            ":voice" => {
                if !select_voice(engine, rest.trim()) {
                    println!("unknown voice: {}", rest.trim());
                }
            }
            ":speed" => match rest.trim().parse::<f32>() {
                Ok(s) => speed = murmur::config::clamp_speed(s),
                Err(_) => println!("bad speed: {}", rest.trim()),
            },
            _ => {
                if let Err(e) = engine.speak(line, speed) {
                    println!("{}", e.user_message());
                }
            }
        }

        print!("> ");
        io::stdout().flush()?;
    }

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    }
    .apply_env()?;

    if let Some(dir) = &args.model_dir {
        config = config.with_model_dir(dir);
    }
    if let Some(voice) = &args.voice {
        config = config.with_voice(voice.clone());
    }
    if let Some(speed) = args.speed {
        config = config.with_speed(speed);
    }
    if args.silent || args.export.is_some() || args.list_voices {
        config = config.without_audio_output();
    }

    if args.list_voices {
        for voice in murmur::VoiceCatalog::builtin().voices() {
            println!("{:<12} {}", voice.code, voice);
        }
        return Ok(());
    }

    info!("Starting murmur");
    let speed = config.default_speed;
    let engine = SpeechEngine::new(config);
    if !engine.is_initialized() {
        bail!("speech engine failed to initialize; check the model directory");
    }

    if let Some(voice) = &args.voice {
        if !select_voice(&engine, voice) {
            warn!("Unknown voice '{}', using {:?}", voice, engine.current_voice().map(|v| v.name));
        }
    }

    let text = args.text.join(" ");

    if let Some(path) = args.export {
        if text.trim().is_empty() {
            bail!("--export needs TEXT");
        }
        let written = engine.export_wav(&text, speed, path)?;
        println!("wrote {}", written.display());
        return Ok(());
    }

    if text.trim().is_empty() {
        interactive(&engine, speed)?;
    } else {
        engine.speak(&text, speed)?;
        // Generous bound: synthesis plus playback of long passages
        engine.wait_until_idle(Duration::from_secs(600));
    }

    engine.shutdown();
    Ok(())
}
