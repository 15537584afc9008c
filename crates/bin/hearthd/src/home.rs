//! The house program — model, messages, fold and device layout.
//!
//! A deliberately small household: one playroom whose light follows the
//! motion sensor, dimmed during the night hours. The hour of day is fed by
//! a cron subscription so the brightness tracks wall-clock time without the
//! fold ever reading a clock.

use std::time::Duration;

use chrono::Timelike;
use hearth_adapter_devices::{LightSpec, MotionSensor, MotionSpec, MqttLight};
use hearth_app::ports::DeviceRegistry;
use hearth_domain::command::Cmd;
use hearth_domain::program::Program;
use hearth_domain::sub::Sub;
use hearth_domain::time::Timestamp;
use hearth_domain::tree::{Container, DeviceSpec, Node};
use serde::{Deserialize, Serialize};

const MOTION_TOPIC: &str = "zigbee2mqtt/playroom/motion";
const LIGHT_TOPIC: &str = "zigbee2mqtt/playroom/light/set";

/// How long the playroom stays occupied after the last motion report.
const OFF_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    /// Current hour of day, 0..=23.
    pub hour: u32,
    pub playroom: Playroom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Playroom {
    pub occupied: bool,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            hour: 12,
            playroom: Playroom { occupied: false },
        }
    }
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Msg {
    SetHour(u32),
    SetOccupancy(bool),
}

/// Union of every device kind the house uses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HomeDevice {
    Light(LightSpec),
    Motion(MotionSpec<Msg>),
}

impl DeviceSpec for HomeDevice {
    fn kind(&self) -> &'static str {
        match self {
            Self::Light(_) => "light",
            Self::Motion(_) => "motion",
        }
    }
}

fn light(device: &HomeDevice) -> Option<&LightSpec> {
    match device {
        HomeDevice::Light(spec) => Some(spec),
        HomeDevice::Motion(_) => None,
    }
}

fn motion(device: &HomeDevice) -> Option<&MotionSpec<Msg>> {
    match device {
        HomeDevice::Motion(spec) => Some(spec),
        HomeDevice::Light(_) => None,
    }
}

/// Handlers for every kind named by [`Program::house`].
#[must_use]
pub fn registry() -> DeviceRegistry<Home> {
    DeviceRegistry::new()
        .with("light", MqttLight::new(light))
        .with("motion", MotionSensor::new(motion))
}

pub struct Home;

impl Program for Home {
    type Model = Model;
    type Msg = Msg;
    type Device = HomeDevice;

    fn update(model: &Model, msg: Msg) -> (Model, Cmd<Msg>) {
        let mut next = model.clone();
        match msg {
            Msg::SetHour(hour) => next.hour = hour,
            Msg::SetOccupancy(occupied) => next.playroom.occupied = occupied,
        }
        (next, Cmd::None)
    }

    fn subscriptions(_model: &Model) -> Sub<Msg> {
        // Top of every hour.
        Sub::cron("0 0 * * * *", on_hour)
    }

    fn house(model: &Model) -> Container<HomeDevice> {
        Container::new("home").child(playroom(model))
    }
}

fn on_hour(now: Timestamp) -> Msg {
    Msg::SetHour(now.hour())
}

fn playroom(model: &Model) -> Container<HomeDevice> {
    Container::new("playroom")
        .child(Node::device(
            "motion",
            HomeDevice::Motion(MotionSpec {
                topic: MOTION_TOPIC.to_owned(),
                off_delay: OFF_DELAY,
                on_change: Msg::SetOccupancy,
            }),
        ))
        .child(Node::device(
            "light",
            HomeDevice::Light(LightSpec {
                topic: LIGHT_TOPIC.to_owned(),
                payload: light_payload(model),
            }),
        ))
}

fn light_payload(model: &Model) -> serde_json::Value {
    if model.playroom.occupied {
        serde_json::json!({ "state": "ON", "brightness": brightness(model.hour) })
    } else {
        serde_json::json!({ "state": "OFF" })
    }
}

/// Full brightness by day, dimmed between 21:00 and 07:00.
fn brightness(hour: u32) -> u8 {
    if (7..21).contains(&hour) { 254 } else { 64 }
}
