// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! JACK client registration, MIDI port discovery, and the real-time process
//! callback (spec section 6). The callback itself must never block or
//! allocate: every device's captured input is handed to the [`MidiRouter`],
//! the sync timer is advanced, and the results are written straight to the
//! JACK port buffers.

pub mod hotplug;

use std::sync::Arc;

use jack::{AsyncClient, Client, ClientOptions, Control, MidiIn, MidiOut, Port, PortId, ProcessScope};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::engine::Engine;
use crate::event::MidiEvent;
use hotplug::HotplugDebouncer;

/// The fixed internal ports this engine always registers, independent of any
/// hot-plugged hardware (spec section 6, "External Interfaces").
pub const SEQUENCER_IN_PORT: &str = "sequencer_in";
pub const SEQUENCER_OUT_PORT: &str = "sequencer_out";
pub const EXTERNAL_OUT_PORT: &str = "external_out";

/// Prefix used by `ttymidi` to name hardware serial-MIDI ports; devices
/// lacking a JACK port alias fall back to this prefix plus their port name
/// for a stable hardware id (spec section 6).
pub const TTYMIDI_PREFIX: &str = "ttymidi:MIDI_";

/// Derives a stable hardware id for a JACK port: its first alias if one is
/// set, otherwise its full name (which already carries the `ttymidi:MIDI_`
/// prefix for serial devices).
pub fn hardware_id_for_port(port_name: &str, aliases: &[String]) -> String {
    aliases
        .first()
        .cloned()
        .unwrap_or_else(|| port_name.to_string())
}

pub struct JackPorts {
    pub inputs: Vec<Port<MidiIn>>,
    pub outputs: Vec<Port<MidiOut>>,
}

/// Registers one input and one output MIDI port per configured device, plus
/// the fixed internal ports.
pub fn register_ports(client: &Client, device_names: &[String]) -> Result<JackPorts, jack::Error> {
    let mut inputs = Vec::with_capacity(device_names.len());
    let mut outputs = Vec::with_capacity(device_names.len());

    for name in device_names {
        inputs.push(client.register_port(&format!("{name}_in"), MidiIn::default())?);
        outputs.push(client.register_port(&format!("{name}_out"), MidiOut::default())?);
    }

    Ok(JackPorts { inputs, outputs })
}

/// Builds the real-time process closure. Captures each input port's events
/// into `MidiEvent`s tagged with their source device index, hands the batch
/// to the engine, and writes whatever the engine produced back out.
pub fn process_closure(
    engine: Arc<parking_lot::Mutex<Engine>>,
    mut ports: JackPorts,
) -> impl FnMut(&Client, &ProcessScope) -> Control {
    move |_client: &Client, process_scope: &ProcessScope| -> Control {
        let mut per_device_input: Vec<Vec<MidiEvent>> = Vec::with_capacity(ports.inputs.len());
        for port in &ports.inputs {
            let mut events = Vec::new();
            for raw in port.iter(process_scope) {
                match MidiEvent::from_slice(raw.bytes, raw.time) {
                    Some(event) => events.push(event),
                    None => warn!(len = raw.bytes.len(), "dropping oversized MIDI event"),
                }
            }
            per_device_input.push(events);
        }

        let nframes = process_scope.n_frames();
        let mut engine = engine.lock();
        let per_device_output = engine.process_cycle(per_device_input, nframes);

        for (index, events) in per_device_output.into_iter().enumerate() {
            let Some(port) = ports.outputs.get_mut(index) else {
                continue;
            };
            let mut writer = port.writer(process_scope);
            for event in events {
                let raw = jack::RawMidi {
                    time: event.frame_offset,
                    bytes: &event.bytes[..event.len as usize],
                };
                if let Err(err) = writer.write(&raw) {
                    error!(?err, "failed writing MIDI event to output port");
                }
            }
        }

        Control::Continue
    }
}

/// Notification handler that debounces JACK's per-port hot-plug
/// notifications down to a single reconcile call (spec section 6).
/// `on_reconcile` is cloned onto a background thread each time the debounce
/// window elapses; it should re-enumerate hardware ports and diff them
/// against the currently registered devices.
pub struct HotplugNotifications<F> {
    debouncer: Mutex<HotplugDebouncer>,
    on_reconcile: F,
}

impl<F> HotplugNotifications<F>
where
    F: Fn() + Clone + Send + 'static,
{
    pub fn new(on_reconcile: F) -> HotplugNotifications<F> {
        HotplugNotifications {
            debouncer: Mutex::new(HotplugDebouncer::new()),
            on_reconcile,
        }
    }

    fn notify(&self) {
        let callback = self.on_reconcile.clone();
        self.debouncer.lock().notify(move || callback());
    }
}

impl<F> jack::NotificationHandler for HotplugNotifications<F>
where
    F: Fn() + Clone + Send + 'static,
{
    fn port_registration(&mut self, _client: &Client, _port_id: PortId, _is_registered: bool) {
        self.notify();
    }

    fn client_registration(&mut self, _client: &Client, _name: &str, _is_registered: bool) {
        self.notify();
    }
}

/// Activates the JACK client with the given process handler and hot-plug
/// notification handler, returning the live `AsyncClient` the caller must
/// keep alive for the engine to run.
pub fn activate<N, P>(client_name: &str, notifications: N, handler: P) -> Result<AsyncClient<N, P>, jack::Error>
where
    N: jack::NotificationHandler,
    P: jack::ProcessHandler,
{
    let (client, status) = Client::new(client_name, ClientOptions::NO_START_SERVER)?;
    info!(?status, name = client_name, "registered JACK client");
    client.activate_async(notifications, handler)
}
