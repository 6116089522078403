//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements           | Connects to                |
//! |------------|----------------------|----------------------------|
//! | `hardware` | InputPort, ClockPort | ESP32 GPIO, system timer   |
//! | `log_sink` | EventSink            | Serial log output          |
//! | `nvs`      | ConfigPort           | NVS / in-memory store      |
//! | `system`   | SystemPort           | `esp_restart`              |
//! | `time`     | ClockPort            | ESP32 system timer         |
//! | `zigbee`   | NetworkPort          | esp-zigbee-lib stack       |
//! |            | OnOffTarget          | Bound On/Off lights        |
//! |            | LightStatePort       | Local On/Off attribute     |
//! |            | RadioPort            | IEEE 802.15.4 radio RSSI   |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod system;
pub mod time;
pub mod zigbee;
