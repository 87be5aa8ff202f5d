//! beatpad - Terminal drum pad
//!
//! Hold a key to repeat its pad, press Space for the demo beat and Tab
//! for the piano.

use anyhow::Result;
use clap::{Parser, Subcommand};
use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::io::{self, stdout};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use beatpad_core::{PadSurface, Sequence, SoundEngine, SystemClock};
use beatpad_keys::{
    config::Config,
    midi::{is_jack_running, list_jack_midi_ports, open_output},
    os_keyboard::OsKeyboardListener,
    ui, App, MidiOutput, MidiSoundEngine, Piano,
};

#[derive(Parser)]
#[command(name = "beatpad")]
#[command(author, version, about = "Terminal drum pad with repeat-on-hold", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path (default: ~/.config/beatpad/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// MIDI channel (0-15)
    #[arg(long)]
    channel: Option<u8>,

    /// Velocity (1-127)
    #[arg(long)]
    velocity: Option<u8>,

    /// Tempo for note lengths such as "8n"
    #[arg(long)]
    bpm: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default configuration file
    Init,
    /// Show the configuration file path
    ConfigPath,
    /// List available JACK MIDI ports
    ListPorts,
    /// Play the demo sequence without the TUI
    Demo,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            return Ok(());
        }
        Some(Commands::ConfigPath) => {
            let path = Config::config_path()?;
            println!("{}", path.display());
            return Ok(());
        }
        Some(Commands::ListPorts) => {
            if !is_jack_running() {
                println!("JACK is not running");
                return Ok(());
            }
            let ports = list_jack_midi_ports();
            if ports.is_empty() {
                println!("No JACK MIDI input ports found");
            } else {
                println!("Available JACK MIDI input ports:");
                for port in ports {
                    println!("  {}", port);
                }
            }
            return Ok(());
        }
        Some(Commands::Demo) | None => {}
    }

    // Load config
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_default(),
    };

    // Apply CLI overrides
    if let Some(channel) = cli.channel {
        config.midi.channel = channel;
    }
    if let Some(velocity) = cli.velocity {
        config.midi.velocity = velocity;
    }
    if let Some(bpm) = cli.bpm {
        config.midi.bpm = bpm;
    }
    config.validate()?;

    let output: Rc<dyn MidiOutput> = Rc::from(open_output(&config.midi)?);
    let engine = Box::new(MidiSoundEngine::new(Rc::clone(&output), &config.midi));

    match cli.command {
        Some(Commands::Demo) => run_demo(&config, engine),
        _ => run_tui(&config, engine, Piano::new(output, &config.midi)),
    }
}

/// Play the demo on the wall clock, printing progress as it changes
fn run_demo(config: &Config, engine: Box<dyn SoundEngine>) -> Result<()> {
    let mut surface = PadSurface::new(config.surface.clone(), engine)?;
    surface.warm_up()?;

    let demo = Sequence::demo();
    let clock = SystemClock::new();
    println!(
        "Playing '{}': {} events over {:.1}s",
        demo.name,
        demo.events.len(),
        demo.total_duration_ms as f64 / 1000.0
    );
    surface.play_sequence(&demo);

    let mut last = None;
    while let Some(deadline) = surface.next_deadline() {
        std::thread::sleep(clock.until(deadline));
        surface.advance_to(clock.now_ms());

        let progress = surface.current_progress();
        if last != Some(progress) {
            println!("{:>3}%", progress);
            last = Some(progress);
        }
    }

    let (dispatched, dropped) = surface.dispatch_counts();
    println!("Done: {} triggers, {} dropped", dispatched, dropped);
    surface.shutdown();
    Ok(())
}

fn run_tui(config: &Config, engine: Box<dyn SoundEngine>, piano: Piano) -> Result<()> {
    let mut app = App::new(config, engine, piano)?;

    let os_keyboard = if config.input.os_keyboard {
        OsKeyboardListener::new()
    } else {
        None
    };
    app.set_os_keyboard(os_keyboard.is_some());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(&mut terminal, &mut app, os_keyboard.as_ref());
    app.shutdown();

    // Cleanup
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableFocusChange,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    os_keyboard: Option<&OsKeyboardListener>,
) -> Result<()> {
    loop {
        app.tick(Instant::now());

        terminal.draw(|frame| {
            app.set_area(frame.area());
            ui::render(frame, &app.view());
        })?;

        if let Some(listener) = os_keyboard {
            while let Some(event) = listener.try_recv() {
                app.handle_os_event(event, Instant::now());
            }
        }
        if app.should_quit() {
            return Ok(());
        }

        if event::poll(app.poll_timeout(Instant::now()))? {
            let event = event::read()?;
            app.handle_event(&event, Instant::now());
        }
        if app.should_quit() {
            return Ok(());
        }
    }
}
