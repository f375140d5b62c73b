//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements                   | Connects to               |
//! |--------------|------------------------------|---------------------------|
//! | `sim_can`    | CanTransport                 | In-process CAN bus model  |
//! |              | MotorController + handles    |                           |
//! | `log_sink`   | EventSink                    | `log` output              |
//! | `telemetry`  | TelemetrySink                | Latest-value table, `log` |
//! | `time`       | TimePort                     | `std::time::Instant`      |
//! | `scripted`   | ModeSource, InputPort        | Canned match script       |

pub mod log_sink;
pub mod scripted;
pub mod sim_can;
pub mod telemetry;
pub mod time;
