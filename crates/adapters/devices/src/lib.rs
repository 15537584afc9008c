//! # hearth-adapter-devices
//!
//! Stock device handlers. Each handler implements the
//! [`DeviceHandler`](hearth_app::ports::DeviceHandler) lifecycle for one
//! device kind and is wired into a program's registry with a projection
//! from the program's device union to its spec type.
//!
//! ## Responsibilities
//! - `light` — publish a desired JSON state, re-publish on change
//! - `scene` — recall a scene on every generation
//! - `motion` — occupancy with a debounced off-delay
//! - `sensor` — tag arbitrary JSON payloads into program messages
//!
//! ## Dependency rule
//! Depends on `hearth-app` (ports and context) and `hearth-domain`. Talks
//! to the outside world only through the context's broker and registries.

pub mod light;
pub mod motion;
pub mod scene;
pub mod sensor;

pub use light::{LightSpec, MqttLight};
pub use motion::{MotionSensor, MotionSpec};
pub use scene::{MqttScene, SceneSpec};
pub use sensor::{JsonSensor, JsonSensorSpec};
