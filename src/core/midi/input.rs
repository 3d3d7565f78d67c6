use crossbeam_channel::Sender;
use midir::{MidiInput, MidiInputConnection};
use thiserror::Error;

use crate::messaging::AppMessage;
use crate::note::Note;

const CLIENT_NAME: &str = "pianoquiz MIDI input";

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("failed to create MIDI input: {0}")]
    Init(#[from] midir::InitError),
    #[error("MIDI port '{0}' not found")]
    PortNotFound(String),
    #[error("failed to connect to MIDI port: {0}")]
    Connect(String),
}

/// Handles MIDI input from connected devices
pub struct MidiInputHandler {
    connection: Option<MidiInputConnection<()>>,
    connected_port: Option<String>,
    message_sender: Sender<AppMessage>,
}

impl MidiInputHandler {
    pub fn new(message_sender: Sender<AppMessage>) -> Self {
        Self {
            connection: None,
            connected_port: None,
            message_sender,
        }
    }

    /// List all available MIDI input ports
    pub fn list_ports() -> Result<Vec<String>, MidiError> {
        let midi_in = MidiInput::new(CLIENT_NAME)?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    /// Connect to a specific MIDI input port by name
    pub fn connect_to_port(&mut self, port_name: &str) -> Result<(), MidiError> {
        self.disconnect();

        let midi_in = MidiInput::new(CLIENT_NAME)?;
        let port = midi_in
            .ports()
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name == port_name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiError::PortNotFound(port_name.to_string()))?;

        let sender = self.message_sender.clone();
        let conn = midi_in
            .connect(
                &port,
                "pianoquiz-read-input",
                move |_stamp, message, _| {
                    if let Some(msg) = Self::handle_midi_message(message) {
                        sender.send(msg).ok();
                    }
                },
                (),
            )
            .map_err(|err| MidiError::Connect(err.to_string()))?;

        log::info!("Connected to MIDI port '{}'", port_name);
        self.connection = Some(conn);
        self.connected_port = Some(port_name.to_string());
        Ok(())
    }

    pub fn connected_port(&self) -> Option<&str> {
        self.connected_port.as_deref()
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            if let Some(name) = self.connected_port.take() {
                log::info!("Disconnected from MIDI port '{}'", name);
            }
        }
    }

    /// Translate a raw MIDI message into an app message. Only note on/off
    /// matter to the quizzes; everything else is dropped.
    fn handle_midi_message(message: &[u8]) -> Option<AppMessage> {
        if message.len() < 3 {
            return None;
        }

        let status = message[0] & 0xF0;
        let note = Note::from_midi(message[1] & 0x7F);
        let velocity = message[2];

        match status {
            0x80 => Some(AppMessage::NoteOff(note)),
            // Note On with velocity 0 is equivalent to Note Off
            0x90 if velocity == 0 => Some(AppMessage::NoteOff(note)),
            0x90 => Some(AppMessage::NoteOn(note, velocity)),
            _ => None,
        }
    }
}

impl Drop for MidiInputHandler {
    fn drop(&mut self) {
        self.disconnect();
    }
}
