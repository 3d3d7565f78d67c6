//! Terminal front end: opens audio, reads input and drives the quizzes.

use anyhow::{bail, Result};
use crossbeam_channel::{RecvTimeoutError, Sender};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{InputSettings, Settings};
use crate::core::audio::{AudioContext, ContextState, Dispatch, PianoPlayer};
use crate::core::midi::MidiInputHandler;
use crate::core::sequencer::Sequencer;
use crate::core::synth::{render_to_wav, PianoSynth, PlaybackRequest};
use crate::input::{KeyEvent, KeyMapper};
use crate::messaging::{AppMessage, MessageBus};
use crate::note::{resolve_frequency, Hand, Note};
use crate::quiz::keyboard::is_on_keyboard;
use crate::quiz::{
    InputOutcome, KeyMode, KeyboardView, NoteRange, PlayCue, Rejection, ScaleQuiz, SheetQuiz,
    Verdict,
};
use crate::utils::helpers::{
    amplitude_to_db, format_frequency, format_time, normalize_frames, peak_amplitude,
};

const TICK: Duration = Duration::from_millis(50);
/// Reverb tail plus release after the last note of a one-shot playback.
const RING_OUT: Duration = Duration::from_millis(3500);

/// Audio output plus the player and sequencer built on it.
pub struct Engine {
    context: AudioContext,
    player: Arc<PianoPlayer>,
    sequencer: Sequencer,
}

impl Engine {
    /// Open the default device and resume it. Without a usable device the
    /// engine still works; every note becomes a no-op.
    pub fn start(settings: &Settings) -> Self {
        let context = match AudioContext::new(&settings.audio) {
            Ok(mut context) => {
                if let Err(err) = context.resume() {
                    log::error!("Failed to start audio output: {}", err);
                }
                context
            }
            Err(err) => {
                log::error!("Audio unavailable, continuing without sound: {}", err);
                let (context, _mixer) = AudioContext::detached(&settings.audio, 44100.0);
                context
            }
        };

        let dispatch = if settings.audio.render_worker {
            Dispatch::Worker
        } else {
            Dispatch::Inline
        };
        let player = Arc::new(PianoPlayer::new(Arc::new(context.handle()), dispatch));
        let sequencer = Sequencer::new(Arc::clone(&player), settings.sequencer.clone());

        Self {
            context,
            player,
            sequencer,
        }
    }

    pub fn is_audible(&self) -> bool {
        self.context.state() == ContextState::Running
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn play_cue(&self, cue: &PlayCue) {
        self.player
            .play_note(&cue.note.to_string(), cue.duration, cue.velocity);
    }

    /// Play notes one after another and block until they have rung out.
    pub fn play_and_wait(&self, notes: &[String], chord: bool) {
        let handle = if chord {
            self.sequencer.play_chord(notes)
        } else {
            self.sequencer.play_sequence(notes)
        };
        let interval = Duration::from_millis(self.sequencer.settings().interval_ms);
        handle.wait(interval * notes.len() as u32 + Duration::from_secs(1));
        if self.is_audible() {
            thread::sleep(RING_OUT);
        }
    }

    pub fn shutdown(mut self) {
        self.sequencer.cancel_all();
        self.context.close();
    }
}

/// Render one note offline and write it as WAV. With `normalize` the peak
/// is raised to full scale first.
pub fn render_note(
    request: &PlaybackRequest,
    sample_rate: u32,
    normalize: bool,
    path: &Path,
) -> Result<()> {
    let synth = PianoSynth::new(sample_rate as f32);
    let Some(mut tone) = synth.render(request) else {
        bail!("Note {} not found", request.note);
    };

    let frequency = resolve_frequency(&request.note).unwrap_or_default();
    println!(
        "{} ({}): {}, peak {:.1} dB",
        tone.note,
        format_frequency(frequency),
        format_time(tone.duration_secs()),
        amplitude_to_db(peak_amplitude(&tone.frames))
    );
    if normalize {
        let gain = normalize_frames(&mut tone.frames, 1.0);
        log::debug!("normalized with gain {:.2}", gain);
    }
    render_to_wav(&tone, path)
}

pub fn list_midi_ports() -> Result<Vec<String>> {
    Ok(MidiInputHandler::list_ports()?)
}

fn connect_midi(input: &InputSettings, sender: Sender<AppMessage>) -> Option<MidiInputHandler> {
    let port = input.midi_port.as_deref()?;
    let mut handler = MidiInputHandler::new(sender);
    match handler.connect_to_port(port) {
        Ok(()) => {
            if let Some(name) = handler.connected_port() {
                println!("Listening on MIDI port {}", name);
            }
            Some(handler)
        }
        Err(err) => {
            log::error!("{}", err);
            None
        }
    }
}

fn spawn_stdin_reader(sender: Sender<AppMessage>) -> Result<()> {
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(AppMessage::Line(line)).is_err() {
                    return;
                }
            }
            sender.send(AppMessage::InputClosed).ok();
        })?;
    Ok(())
}

/// A `:`-prefixed line typed during a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    New,
    Replay,
    Show,
    Reset,
    Hand(Hand),
    Range(NoteRange),
    MinNotes(u8),
    MaxNotes(u8),
    Mode(KeyMode),
    Score,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim().trim_start_matches(':');
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let arg = words.next();

        let require = |what: &str| arg.ok_or_else(|| format!("{} needs {}", name, what));
        let number = |what: &str| -> Result<u8, String> {
            require(what)?
                .parse()
                .map_err(|_| format!("{} needs a number", name))
        };

        match name {
            "n" | "new" => Ok(Command::New),
            "r" | "replay" => Ok(Command::Replay),
            "show" => Ok(Command::Show),
            "reset" => Ok(Command::Reset),
            "hand" => require("left or right")?.parse().map(Command::Hand),
            "range" => require("a note range")?.parse().map(Command::Range),
            "min" => number("a count").map(Command::MinNotes),
            "max" => number("a count").map(Command::MaxNotes),
            "mode" => require("all, white or black")?.parse().map(Command::Mode),
            "score" => Ok(Command::Score),
            "h" | "help" => Ok(Command::Help),
            "q" | "quit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

/// Notes typed on one line. Note names are taken as-is; any other token is
/// read key by key through the key map.
pub fn notes_from_line(line: &str, mapper: &mut KeyMapper) -> Vec<Note> {
    let mut notes = Vec::new();
    for token in line.split_whitespace() {
        if let Ok(note) = token.parse::<Note>() {
            notes.push(note);
            continue;
        }
        for key in token.chars() {
            if let Some(note) = mapper.handle(KeyEvent::down(key)) {
                notes.push(note);
            }
            mapper.handle(KeyEvent::up(key));
        }
    }
    notes
}

/// Spaces out inputs that arrive together so each clears the debounce
/// window.
#[derive(Debug)]
pub struct InputClock {
    spacing: Duration,
    last: Option<Instant>,
}

impl InputClock {
    pub fn new(debounce: Duration) -> Self {
        Self {
            spacing: debounce + Duration::from_millis(1),
            last: None,
        }
    }

    pub fn stamp(&mut self, now: Instant) -> Instant {
        let at = match self.last {
            Some(last) if now < last + self.spacing => last + self.spacing,
            _ => now,
        };
        self.last = Some(at);
        at
    }
}

/// Notes carried by one message with the instant each should count at.
/// Notes typed together on a line are spread by `clock`; a device note
/// keeps its arrival time so the quiz debounce still sees double triggers.
/// Device notes beyond the on-screen keyboard are ignored.
pub fn timed_notes(
    message: &AppMessage,
    now: Instant,
    mapper: &mut KeyMapper,
    clock: &mut InputClock,
) -> Vec<(Note, Instant)> {
    match message {
        AppMessage::Line(line) => notes_from_line(line, mapper)
            .into_iter()
            .map(|note| (note, clock.stamp(now)))
            .collect(),
        AppMessage::NoteOn(note, _) if is_on_keyboard(*note) => vec![(*note, now)],
        AppMessage::NoteOn(note, _) => {
            log::debug!("ignoring {}, off the keyboard", note);
            Vec::new()
        }
        AppMessage::NoteOff(_) | AppMessage::InputClosed => Vec::new(),
    }
}

fn describe_view(view: &KeyboardView) -> String {
    let names = |notes: &[Note]| {
        notes
            .iter()
            .map(Note::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let mut text = format!("answer: [{}]", names(&view.answer));
    if !view.disabled.is_empty() && view.disabled.len() < 10 {
        text.push_str(&format!("  disabled: [{}]", names(&view.disabled)));
    }
    text
}

fn describe_rejection(rejection: Rejection) -> Option<&'static str> {
    match rejection {
        Rejection::Debounced => None,
        Rejection::NoQuestion => Some("no question yet, type :new"),
        Rejection::ResultPending => Some("answer complete, type :new or :reset"),
        Rejection::Playing => Some("wait for the notes to finish"),
        Rejection::OutOfRange => Some("that note is not in the current range"),
        Rejection::Disabled => Some("already tried that one"),
    }
}

const SCALE_HELP: &str = "\
Type the notes you hear, as note names (C4 E4) or keys (a d).
Commands: :new  :replay  :show  :reset  :hand left|right
          :range basic4|high4|diatonic8|white12|all18  :min N  :max N
          :score  :help  :quit";

const SHEET_HELP: &str = "\
Name the note shown, as a note name (F#4) or a key (f).
Commands: :new  :replay  :hand left|right  :mode all|white|black
          :score  :help  :quit";

/// Interactive scale dictation until `:quit` or end of input.
pub fn run_scale_quiz(settings: &Settings) -> Result<()> {
    let engine = Engine::start(settings);
    let bus = MessageBus::new();
    spawn_stdin_reader(bus.sender())?;
    let _midi = connect_midi(&settings.input, bus.sender());

    let mut quiz = ScaleQuiz::from_config(&settings.quiz, StdRng::from_os_rng());
    let mut mapper = KeyMapper::new(quiz.settings().hand)
        .with_ignore_modifiers(settings.input.ignore_modifiers);
    let mut clock = InputClock::new(Duration::from_millis(settings.quiz.debounce_ms));

    println!("{}", SCALE_HELP);
    start_scale_question(&engine, &mut quiz, Instant::now());

    loop {
        let message = match bus.receive_timeout(TICK) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let now = Instant::now();

        match message {
            Some(AppMessage::Line(line)) if line.trim_start().starts_with(':') => {
                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => scale_command(&engine, &mut quiz, &mut mapper, command, now),
                    Err(err) => println!("{}", err),
                }
            }
            Some(AppMessage::InputClosed) => break,
            Some(message) => {
                for (note, at) in timed_notes(&message, now, &mut mapper, &mut clock) {
                    answer_scale(&engine, &mut quiz, note, at);
                }
            }
            None => {}
        }

        if quiz.is_playing() && !engine.sequencer().is_playing() {
            quiz.set_playing(false);
            println!("Your turn.");
        }
        if let Some(target) = quiz.tick(now) {
            play_target(&engine, &mut quiz, &target);
        }
    }

    println!("Final score: {}", quiz.score());
    engine.shutdown();
    Ok(())
}

fn start_scale_question(engine: &Engine, quiz: &mut ScaleQuiz, now: Instant) {
    match quiz.generate(now).map(<[Note]>::to_vec) {
        Some(target) => play_target(engine, quiz, &target),
        None => log::debug!("no new question"),
    }
}

fn play_target(engine: &Engine, quiz: &mut ScaleQuiz, target: &[Note]) {
    println!("Listen: {} note(s)", target.len());
    let names: Vec<String> = target.iter().map(Note::to_string).collect();
    engine.sequencer().play_sequence(&names);
    quiz.set_playing(true);
}

fn answer_scale(engine: &Engine, quiz: &mut ScaleQuiz, note: Note, at: Instant) {
    match quiz.handle_input(note, at) {
        InputOutcome::Rejected(rejection) => {
            if let Some(text) = describe_rejection(rejection) {
                println!("{}: {}", note, text);
            }
        }
        InputOutcome::Accepted { echo, verdict } => {
            engine.play_cue(&echo);
            println!("{}", describe_view(&quiz.keyboard_view()));
            if let Some(verdict) = verdict {
                println!("{}! score {}", verdict, quiz.score());
                if verdict == Verdict::Incorrect {
                    println!("Type :reset to try again or :show to see the answer.");
                }
            }
        }
    }
}

fn scale_command(
    engine: &Engine,
    quiz: &mut ScaleQuiz,
    mapper: &mut KeyMapper,
    command: Command,
    now: Instant,
) {
    match command {
        Command::New => start_scale_question(engine, quiz, now),
        Command::Replay => match quiz.target().map(<[Note]>::to_vec) {
            Some(target) => play_target(engine, quiz, &target),
            None => println!("no question yet"),
        },
        Command::Show => {
            if quiz.toggle_show_answer() {
                let answer: Vec<String> = quiz
                    .target()
                    .unwrap_or_default()
                    .iter()
                    .map(Note::to_string)
                    .collect();
                println!("Answer: {}", answer.join(" "));
            }
        }
        Command::Reset => {
            quiz.reset_answer();
            println!("Answer cleared.");
        }
        Command::Hand(hand) => {
            mapper.set_hand(hand);
            quiz.set_hand(hand, now);
            println!("Now playing with the {} hand.", hand);
            if let Some(target) = quiz.target().map(<[Note]>::to_vec) {
                play_target(engine, quiz, &target);
            }
        }
        Command::Range(range) => {
            quiz.set_note_range(range);
            let names: Vec<String> = quiz.available_notes().iter().map(Note::to_string).collect();
            println!("Range {}: {}", range, names.join(" "));
        }
        Command::MinNotes(count) => report_setting(quiz.set_min_notes(count), quiz),
        Command::MaxNotes(count) => report_setting(quiz.set_max_notes(count), quiz),
        Command::Score => println!("Score {}", quiz.score()),
        Command::Help => println!("{}", SCALE_HELP),
        Command::Mode(_) => println!(":mode only applies to the sheet quiz"),
        Command::Quit => {}
    }
}

fn report_setting<E: std::fmt::Display>(result: Result<(), E>, quiz: &ScaleQuiz) {
    match result {
        Ok(()) => println!(
            "Questions now have {} to {} notes.",
            quiz.settings().min_notes(),
            quiz.settings().max_notes()
        ),
        Err(err) => println!("{}", err),
    }
}

/// Interactive sheet-note identification, starting with `hand`, until
/// `:quit` or end of input.
pub fn run_sheet_quiz(settings: &Settings, hand: Hand) -> Result<()> {
    let engine = Engine::start(settings);
    let bus = MessageBus::new();
    spawn_stdin_reader(bus.sender())?;
    let _midi = connect_midi(&settings.input, bus.sender());

    let mut quiz = SheetQuiz::from_config(&settings.quiz, StdRng::from_os_rng());
    quiz.set_active_hand(hand);
    let mut mapper = KeyMapper::new(quiz.active_hand())
        .with_ignore_modifiers(settings.input.ignore_modifiers);
    let mut clock = InputClock::new(Duration::from_millis(settings.quiz.debounce_ms));

    println!("{}", SHEET_HELP);
    let cues = quiz.start();
    play_sheet_cues(&engine, &quiz, &cues);

    loop {
        let message = match bus.receive_timeout(TICK) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let now = Instant::now();

        match message {
            Some(AppMessage::Line(line)) if line.trim_start().starts_with(':') => {
                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => sheet_command(&engine, &mut quiz, &mut mapper, command),
                    Err(err) => println!("{}", err),
                }
            }
            Some(AppMessage::InputClosed) => break,
            Some(message) => {
                for (note, at) in timed_notes(&message, now, &mut mapper, &mut clock) {
                    answer_sheet(&engine, &mut quiz, note, at);
                }
            }
            None => {}
        }

        let cues = quiz.tick(now);
        play_sheet_cues(&engine, &quiz, &cues);
    }

    println!("Final score: {}", quiz.score());
    engine.shutdown();
    Ok(())
}

fn play_sheet_cues(engine: &Engine, quiz: &SheetQuiz, cues: &[PlayCue]) {
    for cue in cues {
        engine.play_cue(cue);
    }
    let active_target = quiz.hand(quiz.active_hand()).target;
    if cues.iter().any(|cue| Some(cue.note) == active_target) {
        print_prompt(quiz);
    }
}

fn print_prompt(quiz: &SheetQuiz) {
    match quiz.prompt() {
        Some(prompt) => println!("{} hand: {}", quiz.active_hand(), prompt),
        None => println!("no question yet"),
    }
}

fn answer_sheet(engine: &Engine, quiz: &mut SheetQuiz, note: Note, at: Instant) {
    match quiz.handle_input(note, at) {
        InputOutcome::Rejected(rejection) => {
            if let Some(text) = describe_rejection(rejection) {
                println!("{}: {}", note, text);
            }
        }
        InputOutcome::Accepted { echo, verdict } => {
            engine.play_cue(&echo);
            if let Some(verdict) = verdict {
                println!("{}: {}! score {}", note, verdict, quiz.score());
                if verdict == Verdict::Incorrect {
                    println!("{}", describe_view(&quiz.keyboard_view()));
                }
            }
        }
    }
}

fn sheet_command(engine: &Engine, quiz: &mut SheetQuiz, mapper: &mut KeyMapper, command: Command) {
    match command {
        Command::New => {
            let hand = quiz.active_hand();
            let cues: Vec<PlayCue> = quiz.new_question(hand).into_iter().collect();
            play_sheet_cues(engine, quiz, &cues);
        }
        Command::Replay => match quiz.replay() {
            Some(cue) => {
                engine.play_cue(&cue);
                print_prompt(quiz);
            }
            None => println!("no question yet"),
        },
        Command::Hand(hand) => {
            quiz.set_active_hand(hand);
            mapper.set_hand(hand);
            print_prompt(quiz);
        }
        Command::Mode(mode) => {
            let cues = quiz.set_mode(mode);
            println!("Key mode: {}", mode);
            play_sheet_cues(engine, quiz, &cues);
        }
        Command::Score => println!("Score {}", quiz.score()),
        Command::Help => println!("{}", SHEET_HELP),
        Command::Show
        | Command::Reset
        | Command::Range(_)
        | Command::MinNotes(_)
        | Command::MaxNotes(_) => println!("that command only applies to the scale quiz"),
        Command::Quit => {}
    }
}
